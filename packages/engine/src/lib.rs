#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Prediction engine.
//!
//! Turns a stream of `(model, parameters, ward history)` requests into an
//! up-to-date prediction set:
//!
//! - Requests are debounced: local models wait 50ms after the last change,
//!   the remote model 300ms. A new request replaces the pending one, so
//!   only the last request in a quiet window is dispatched.
//! - Local models run on one long-lived worker thread ([`worker`]).
//! - The remote model is called over HTTP ([`remote`]). A new request
//!   aborts the in-flight call.
//! - Every request gets a generation number. A result is published only
//!   if no newer request exists, so late answers never overwrite newer
//!   ones.
//!
//! State is published on a [`tokio::sync::watch`] channel as
//! [`EngineState`]: the busy flag, the latest output, and the last error.
//! A failed computation leaves the previous output in place.

pub mod remote;
pub mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use swing_map_election_models::WardElections;
use swing_map_engine_models::{
    EngineConfig, MrpPredictRequest, PredictionOutput, WorkerParams, WorkerRequest,
};
use swing_map_model::{Execution, ModelError, ModelRegistry};
use swing_map_model_models::{ModelParameters, WardAdjustments};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use remote::{HttpRemoteModel, RemoteModel, poll_fit};
pub use worker::WorkerClient;

/// Errors from the prediction engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Model lookup failed.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A remote-only model was sent to the local worker.
    #[error("Model {id} cannot run locally")]
    NotLocal {
        /// The model id.
        id: String,
    },

    /// HTTP request to the remote model failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote model answered with a non-success status.
    #[error("Remote model error {status}: {body}")]
    RemoteStatus {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// The remote model's response could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The worker thread could not be started.
    #[error("Failed to start prediction worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The worker thread has exited.
    #[error("Prediction worker is not running")]
    WorkerClosed,

    /// A background fit was still running after the last status check.
    #[error("MRP fit {task_id} did not finish after {polls} status checks")]
    FitTimeout {
        /// The fit task.
        task_id: String,
        /// Status checks made.
        polls: usize,
    },

    /// The engine was created outside a Tokio runtime.
    #[error("Prediction engine requires a Tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Everything one computation needs.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    /// Registry id of the model.
    pub model_id: String,
    /// Current parameter values.
    pub parameters: ModelParameters,
    /// Region and classification tables.
    pub adjustments: WardAdjustments,
    /// Shared ward payload.
    pub ward_data: Arc<[WardElections]>,
    /// Whether to compute uncertainty bands.
    pub compute_uncertainty: bool,
}

/// Published engine state.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    /// Generation of the newest request.
    pub requested: u64,
    /// Generation of the newest request that finished, failed or was
    /// cancelled.
    pub completed: u64,
    /// Whether a request is pending or in flight.
    pub busy: bool,
    /// Latest successful output.
    pub latest: Option<Arc<PredictionOutput>>,
    /// Message of the latest failure, cleared by the next success.
    pub last_error: Option<String>,
}

enum Dispatch {
    Local(WorkerRequest),
    Remote(MrpPredictRequest),
}

/// Shared by the engine and its dispatch tasks.
struct Shared {
    generation: AtomicU64,
    dispatched: AtomicU64,
    state: watch::Sender<EngineState>,
    worker: WorkerClient,
    remote: Arc<dyn RemoteModel>,
}

impl Shared {
    async fn run(&self, generation: u64, model_id: String, dispatch: Dispatch) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        log::debug!("Dispatching prediction {generation} with {model_id}");

        let result = match dispatch {
            Dispatch::Local(request) => {
                self.worker
                    .compute(request)
                    .await
                    .map(|response| PredictionOutput {
                        generation,
                        model_id,
                        predictions: response.predictions,
                        uncertainty: response.uncertainty,
                        remote_metadata: None,
                    })
            }
            Dispatch::Remote(request) => {
                self.remote
                    .predict(&request)
                    .await
                    .map(|response| PredictionOutput {
                        generation,
                        model_id,
                        predictions: response.to_predictions(),
                        uncertainty: Some(response.to_uncertainty()),
                        remote_metadata: Some(response.metadata),
                    })
            }
        };

        self.publish(generation, result);
    }

    fn publish(&self, generation: u64, result: Result<PredictionOutput, EngineError>) {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                log::debug!("Discarding stale prediction {generation}");
                return false;
            }

            match result {
                Ok(output) => {
                    state.latest = Some(Arc::new(output));
                    state.last_error = None;
                }
                Err(e) => {
                    log::error!("Prediction {generation} failed: {e}");
                    state.last_error = Some(e.to_string());
                }
            }
            state.busy = false;
            state.completed = generation;
            true
        });
    }
}

/// Debounced, cancellable prediction dispatcher.
pub struct PredictionEngine {
    registry: ModelRegistry,
    config: EngineConfig,
    runtime: Handle,
    shared: Arc<Shared>,
    pending: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PredictionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionEngine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PredictionEngine {
    /// Starts the engine and its worker thread on the current Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoRuntime`] outside a Tokio runtime, or
    /// [`EngineError::Spawn`] if the worker thread cannot be started.
    pub fn new(
        registry: ModelRegistry,
        config: EngineConfig,
        remote: Arc<dyn RemoteModel>,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current()?;
        let worker = WorkerClient::spawn(&config.worker_thread_name, registry.clone())?;
        let (state, _) = watch::channel(EngineState::default());

        Ok(Self {
            registry,
            config,
            runtime,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                dispatched: AtomicU64::new(0),
                state,
                worker,
                remote,
            }),
            pending: None,
        })
    }

    /// [`Self::new`] with the HTTP remote model at `config.api_base_url`.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_http_remote(
        registry: ModelRegistry,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let remote = Arc::new(HttpRemoteModel::new(&config.api_base_url));
        Self::new(registry, config, remote)
    }

    /// Schedules a computation, replacing any pending or in-flight one.
    /// Returns the request's generation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Model`] if the model is not registered; the
    /// current request, if any, is left alone.
    pub fn request(&mut self, request: PredictionRequest) -> Result<u64, EngineError> {
        let model = self.registry.require(&request.model_id)?;

        let (dispatch, delay) = match model.execution() {
            Execution::Local => (
                Dispatch::Local(WorkerRequest {
                    ward_data: request.ward_data,
                    params: WorkerParams::from_parameters(&request.parameters),
                    model_type: request.model_id.clone(),
                    adjustments: request.adjustments,
                    compute_uncertainty: request.compute_uncertainty,
                }),
                self.config.local_debounce(),
            ),
            Execution::Remote => (
                Dispatch::Remote(MrpPredictRequest::new(&request.parameters)),
                self.config.remote_debounce(),
            ),
        };

        let generation = self.supersede();
        self.shared.state.send_modify(|state| {
            state.requested = generation;
            state.busy = true;
        });

        let shared = Arc::clone(&self.shared);
        let model_id = request.model_id;
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.run(generation, model_id, dispatch).await;
        }));

        Ok(generation)
    }

    /// Drops the pending or in-flight request, if any, and clears the busy
    /// flag. The latest output is kept.
    pub fn cancel(&mut self) {
        let generation = self.supersede();
        self.shared.state.send_modify(|state| {
            state.requested = generation;
            state.completed = generation;
            state.busy = false;
        });
    }

    /// Bumps the generation and aborts the pending task.
    fn supersede(&mut self) -> u64 {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Registry requests are resolved against.
    #[must_use]
    pub const fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Client for the remote model, also used for fitting.
    #[must_use]
    pub fn remote(&self) -> &dyn RemoteModel {
        self.shared.remote.as_ref()
    }

    /// Receiver for state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.shared.state.subscribe()
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.shared.state.borrow().clone()
    }

    /// Whether a request is pending or in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.shared.state.borrow().busy
    }

    /// Number of requests that survived their debounce window and were
    /// sent to the worker or the remote model.
    #[must_use]
    pub fn dispatched_count(&self) -> u64 {
        self.shared.dispatched.load(Ordering::SeqCst)
    }

    /// Waits until `generation` or a newer request has completed and
    /// returns the state at that point. `None` if the engine is dropped
    /// first.
    pub async fn wait_for_generation(&self, generation: u64) -> Option<EngineState> {
        let mut receiver = self.subscribe();
        let state = receiver
            .wait_for(|state| state.completed >= generation)
            .await
            .ok()?;
        Some(state.clone())
    }

    /// Debounce applied before dispatching requests for `model_id`.
    #[must_use]
    pub fn debounce_for(&self, model_id: &str) -> Option<Duration> {
        self.registry.get(model_id).map(|model| match model.execution() {
            Execution::Local => self.config.local_debounce(),
            Execution::Remote => self.config.remote_debounce(),
        })
    }
}

impl Drop for PredictionEngine {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use swing_map_election_models::{ElectionRecord, RaceType};
    use swing_map_engine_models::{
        FitStatus, FitTaskStatus, FittedModel, MrpFitRequest, MrpFitTask, MrpPredictionResponse,
    };
    use swing_map_engine_models::mrp::MrpWardPrediction;
    use swing_map_model_models::keys;

    use super::*;

    /// Remote model that answers after a delay, or fails.
    #[derive(Default)]
    struct FakeRemote {
        delay: Duration,
        fail: bool,
        started: AtomicUsize,
        finished: AtomicUsize,
        fits: AtomicUsize,
    }

    #[async_trait]
    impl RemoteModel for FakeRemote {
        async fn predict(
            &self,
            request: &MrpPredictRequest,
        ) -> Result<MrpPredictionResponse, EngineError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);

            if self.fail {
                return Err(EngineError::RemoteStatus {
                    status: 503,
                    body: "model not fitted".into(),
                });
            }

            let shift = request.parameters.college_shift;
            Ok(MrpPredictionResponse {
                model_id: request.model_id.clone(),
                predictions: BTreeMap::from([(
                    "w".to_string(),
                    MrpWardPrediction {
                        dem_pct: 50.0 + shift,
                        rep_pct: 50.0 - shift,
                        margin: shift * 2.0,
                        dem_votes: 500.0,
                        rep_votes: 500.0,
                        total_votes: 1_000.0,
                        confidence: 0.8,
                        lower_margin: -10.0,
                        upper_margin: 10.0,
                    },
                )]),
                metadata: swing_map_engine_models::MrpMetadata::default(),
            })
        }

        async fn fitted_models(&self) -> Result<Vec<FittedModel>, EngineError> {
            Ok(Vec::new())
        }

        async fn trigger_fit(&self, request: &MrpFitRequest) -> Result<MrpFitTask, EngineError> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            Ok(MrpFitTask {
                task_id: format!("fit-{}-{}", request.race_type, request.year),
            })
        }

        async fn fit_status(&self, task_id: &str) -> Result<FitStatus, EngineError> {
            Ok(FitStatus {
                task_id: task_id.to_string(),
                status: FitTaskStatus::Success,
                result: None,
                error: None,
                progress: None,
            })
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            local_debounce_ms: 20,
            remote_debounce_ms: 30,
            ..EngineConfig::default()
        }
    }

    fn engine(remote: Arc<FakeRemote>) -> PredictionEngine {
        PredictionEngine::new(ModelRegistry::with_builtin_models(), config(), remote).unwrap()
    }

    fn wards() -> Arc<[WardElections]> {
        Arc::from(vec![WardElections {
            ward_id: "w".into(),
            elections: vec![ElectionRecord::from_votes(
                2024,
                RaceType::President,
                600.0,
                400.0,
                0.0,
            )],
        }])
    }

    fn request(model_id: &str, key: &str, value: f64) -> PredictionRequest {
        PredictionRequest {
            model_id: model_id.into(),
            parameters: ModelParameters::new()
                .with(keys::BASE_ELECTION_YEAR, "2024")
                .with(keys::BASE_RACE_TYPE, "president")
                .with(key, value),
            adjustments: WardAdjustments::default(),
            ward_data: wards(),
            compute_uncertainty: false,
        }
    }

    #[tokio::test]
    async fn burst_of_requests_dispatches_once() {
        let mut engine = engine(Arc::default());

        let mut last = 0;
        for swing in 1..=5 {
            last = engine
                .request(request("uniform-swing", keys::SWING_POINTS, f64::from(swing)))
                .unwrap();
        }
        assert!(engine.is_busy());

        let state = engine.wait_for_generation(last).await.unwrap();
        assert!(!state.busy);
        assert_eq!(engine.dispatched_count(), 1);

        let output = state.latest.unwrap();
        assert_eq!(output.generation, last);
        // Last request wins: 0.6 + 0.05
        assert_eq!(output.predictions[0].predicted_dem_votes, 650);
    }

    #[tokio::test]
    async fn local_output_carries_uncertainty_when_requested() {
        let mut engine = engine(Arc::default());
        let mut req = request("demographic-swing", keys::RURAL_SWING, -2.0);
        req.compute_uncertainty = true;

        let generation = engine.request(req).unwrap();
        let output = engine
            .wait_for_generation(generation)
            .await
            .unwrap()
            .latest
            .unwrap();

        assert_eq!(output.model_id, "demographic-swing");
        assert_eq!(output.predictions[0].predicted_dem_votes, 580);
        assert_eq!(output.uncertainty.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn newer_remote_request_aborts_in_flight_one() {
        let remote = Arc::new(FakeRemote {
            delay: Duration::from_millis(300),
            ..FakeRemote::default()
        });
        let mut engine = engine(Arc::clone(&remote));

        engine
            .request(request("mrp", keys::COLLEGE_SHIFT, 1.0))
            .unwrap();
        // Past the debounce window, so the first call is in flight.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(remote.started.load(Ordering::SeqCst), 1);

        let second = engine
            .request(request("mrp", keys::COLLEGE_SHIFT, 4.0))
            .unwrap();
        let state = engine.wait_for_generation(second).await.unwrap();

        assert_eq!(remote.started.load(Ordering::SeqCst), 2);
        assert_eq!(remote.finished.load(Ordering::SeqCst), 1);

        let output = state.latest.unwrap();
        assert_eq!(output.generation, second);
        assert!((output.predictions[0].predicted_dem_pct - 54.0).abs() < 1e-9);
        let band = &output.uncertainty.as_ref().unwrap()[0];
        assert!((band.lower_dem_pct - 45.0).abs() < 1e-9);
        assert!(output.remote_metadata.is_some());
    }

    #[tokio::test]
    async fn remote_failure_keeps_previous_output() {
        let remote = Arc::new(FakeRemote {
            fail: true,
            ..FakeRemote::default()
        });
        let mut engine = engine(remote);

        let first = engine
            .request(request("uniform-swing", keys::SWING_POINTS, 0.0))
            .unwrap();
        engine.wait_for_generation(first).await.unwrap();

        let second = engine
            .request(request("mrp", keys::COLLEGE_SHIFT, 2.0))
            .unwrap();
        let state = engine.wait_for_generation(second).await.unwrap();

        assert!(!state.busy);
        assert!(state.last_error.unwrap().contains("503"));
        let output = state.latest.unwrap();
        assert_eq!(output.generation, first);
        assert_eq!(output.model_id, "uniform-swing");
    }

    #[tokio::test]
    async fn cancel_clears_busy_without_output() {
        let mut engine = engine(Arc::default());
        engine
            .request(request("uniform-swing", keys::SWING_POINTS, 3.0))
            .unwrap();
        engine.cancel();

        assert!(!engine.is_busy());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(engine.dispatched_count(), 0);
        assert!(engine.state().latest.is_none());
    }

    #[tokio::test]
    async fn unknown_model_is_rejected_up_front() {
        let mut engine = engine(Arc::default());
        assert!(matches!(
            engine.request(request("nope", keys::SWING_POINTS, 0.0)),
            Err(EngineError::Model(ModelError::UnknownModel { .. }))
        ));
        assert!(!engine.is_busy());
        assert_eq!(engine.state().requested, 0);
    }

    #[tokio::test]
    async fn debounce_depends_on_execution() {
        let engine = engine(Arc::default());
        assert_eq!(
            engine.debounce_for("uniform-swing"),
            Some(Duration::from_millis(20))
        );
        assert_eq!(engine.debounce_for("mrp"), Some(Duration::from_millis(30)));
        assert_eq!(engine.debounce_for("nope"), None);
    }

    #[tokio::test]
    async fn fits_go_through_the_engine_remote() {
        let remote = Arc::new(FakeRemote::default());
        let engine = engine(Arc::clone(&remote));

        let task = engine
            .remote()
            .trigger_fit(&MrpFitRequest::new(2022, RaceType::Governor))
            .await
            .unwrap();
        assert_eq!(task.task_id, "fit-governor-2022");

        let status = poll_fit(engine.remote(), &task.task_id, Duration::from_millis(1), 5)
            .await
            .unwrap();
        assert_eq!(status.status, FitTaskStatus::Success);
        assert_eq!(remote.fits.load(Ordering::SeqCst), 1);
        // Fitting does not touch prediction state.
        assert_eq!(engine.state().requested, 0);
    }

    #[test]
    fn requires_a_runtime() {
        assert!(matches!(
            PredictionEngine::new(
                ModelRegistry::with_builtin_models(),
                EngineConfig::default(),
                Arc::new(FakeRemote::default()),
            ),
            Err(EngineError::NoRuntime(_))
        ));
    }
}
