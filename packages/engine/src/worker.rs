//! The long-lived local prediction worker.
//!
//! Local models run on one dedicated OS thread so a large ward set never
//! stalls the async runtime. Each job carries everything it needs; the
//! worker keeps no state between jobs.

use std::sync::mpsc;
use std::thread;

use swing_map_engine_models::{WorkerRequest, WorkerResponse};
use swing_map_model::{Execution, ModelRegistry};
use tokio::sync::oneshot;

use crate::EngineError;

struct Job {
    request: WorkerRequest,
    reply: oneshot::Sender<Result<WorkerResponse, EngineError>>,
}

/// Handle for submitting jobs to the worker thread. Cloning is cheap; the
/// thread exits once every handle is dropped.
#[derive(Clone)]
pub struct WorkerClient {
    sender: mpsc::Sender<Job>,
}

impl std::fmt::Debug for WorkerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerClient").finish_non_exhaustive()
    }
}

impl WorkerClient {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Spawn`] if the OS refuses the thread.
    pub fn spawn(name: &str, registry: ModelRegistry) -> Result<Self, EngineError> {
        let (sender, receiver) = mpsc::channel::<Job>();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    let response = compute(&registry, &job.request);
                    if job.reply.send(response).is_err() {
                        log::debug!("Prediction for {} finished after its request was dropped", job.request.model_type);
                    }
                }
                log::debug!("Prediction worker shutting down");
            })?;

        Ok(Self { sender })
    }

    /// Runs `request` on the worker and waits for the answer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkerClosed`] if the worker thread is gone,
    /// or whatever error the computation itself produced.
    pub async fn compute(&self, request: WorkerRequest) -> Result<WorkerResponse, EngineError> {
        let (reply, answer) = oneshot::channel();
        self.sender
            .send(Job { request, reply })
            .map_err(|_| EngineError::WorkerClosed)?;
        answer.await.map_err(|_| EngineError::WorkerClosed)?
    }
}

/// Runs one local computation.
///
/// # Errors
///
/// Returns [`EngineError::Model`] if the model is not registered, or
/// [`EngineError::NotLocal`] if it cannot run locally.
pub fn compute(
    registry: &ModelRegistry,
    request: &WorkerRequest,
) -> Result<WorkerResponse, EngineError> {
    let model = registry.require(&request.model_type)?;
    if model.execution() != Execution::Local {
        return Err(EngineError::NotLocal {
            id: request.model_type.clone(),
        });
    }

    let params = request.params.to_parameters();
    let predictions = model.predict(&request.ward_data, &params, &request.adjustments);
    let uncertainty = if request.compute_uncertainty {
        model.uncertainty(&request.ward_data, &params, &predictions)
    } else {
        None
    };

    log::debug!(
        "Computed {} predictions with {}",
        predictions.len(),
        request.model_type
    );

    Ok(WorkerResponse {
        predictions,
        uncertainty,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use swing_map_election_models::{ElectionRecord, RaceType, WardElections};
    use swing_map_engine_models::WorkerParams;
    use swing_map_model_models::WardAdjustments;

    use super::*;

    fn request(model_type: &str, compute_uncertainty: bool) -> WorkerRequest {
        WorkerRequest {
            ward_data: Arc::from(vec![WardElections {
                ward_id: "w".into(),
                elections: vec![ElectionRecord::from_votes(
                    2024,
                    RaceType::President,
                    600.0,
                    400.0,
                    0.0,
                )],
            }]),
            params: WorkerParams {
                base_election_year: "2024".into(),
                base_race_type: "president".into(),
                swing_points: 5.0,
                ..WorkerParams::default()
            },
            model_type: model_type.into(),
            adjustments: WardAdjustments::default(),
            compute_uncertainty,
        }
    }

    #[test]
    fn computes_with_the_requested_model() {
        let registry = ModelRegistry::with_builtin_models();

        let response = compute(&registry, &request("uniform-swing", false)).unwrap();
        assert_eq!(response.predictions[0].predicted_dem_votes, 650);
        assert!(response.uncertainty.is_none());

        let response = compute(&registry, &request("proportional-swing", true)).unwrap();
        assert_eq!(response.predictions[0].predicted_dem_votes, 630);
        assert_eq!(response.uncertainty.map(|u| u.len()), Some(1));
    }

    #[test]
    fn remote_and_unknown_models_are_rejected() {
        let registry = ModelRegistry::with_builtin_models();
        assert!(matches!(
            compute(&registry, &request("mrp", false)),
            Err(EngineError::NotLocal { .. })
        ));
        assert!(matches!(
            compute(&registry, &request("nope", false)),
            Err(EngineError::Model(_))
        ));
    }

    #[tokio::test]
    async fn worker_thread_answers_jobs() {
        let worker = WorkerClient::spawn("test-worker", ModelRegistry::with_builtin_models()).unwrap();
        let response = worker.compute(request("uniform-swing", false)).await.unwrap();
        assert_eq!(response.predictions.len(), 1);
    }
}
