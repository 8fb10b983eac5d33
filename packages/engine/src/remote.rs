//! Remote model client.
//!
//! Besides predictions, the remote MRP service fits models in the
//! background: a fit request returns a task id that is polled until the
//! task finishes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use swing_map_engine_models::{
    FitStatus, FittedModel, FittedModelsResponse, MrpFitRequest, MrpFitTask, MrpPredictRequest,
    MrpPredictionResponse,
};

use crate::EngineError;

/// Maximum length of the error body kept in [`EngineError::RemoteStatus`].
const BODY_PREVIEW_LEN: usize = 500;

/// A model evaluated by a remote service.
#[async_trait]
pub trait RemoteModel: Send + Sync {
    /// Runs one prediction.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the request fails or the response cannot
    /// be decoded.
    async fn predict(
        &self,
        request: &MrpPredictRequest,
    ) -> Result<MrpPredictionResponse, EngineError>;

    /// Models the service has already fitted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the request fails or the response cannot
    /// be decoded.
    async fn fitted_models(&self) -> Result<Vec<FittedModel>, EngineError>;

    /// Starts a background fit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the service rejects the fit.
    async fn trigger_fit(&self, request: &MrpFitRequest) -> Result<MrpFitTask, EngineError>;

    /// Current state of a background fit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the request fails or the response cannot
    /// be decoded.
    async fn fit_status(&self, task_id: &str) -> Result<FitStatus, EngineError>;
}

/// Polls `task_id` every `interval` until it finishes.
///
/// # Errors
///
/// Returns [`EngineError::FitTimeout`] if the task is still running after
/// `max_polls` checks, or the first error from [`RemoteModel::fit_status`].
pub async fn poll_fit(
    remote: &dyn RemoteModel,
    task_id: &str,
    interval: Duration,
    max_polls: usize,
) -> Result<FitStatus, EngineError> {
    for poll in 0..max_polls {
        if poll > 0 {
            tokio::time::sleep(interval).await;
        }

        let status = remote.fit_status(task_id).await?;
        if status.status.is_finished() {
            log::info!("Fit {task_id} finished with {}", status.status);
            return Ok(status);
        }
        if let Some(progress) = &status.progress {
            log::debug!("Fit {task_id}: {}", progress.step);
        }
    }

    Err(EngineError::FitTimeout {
        task_id: task_id.to_string(),
        polls: max_polls,
    })
}

/// [`RemoteModel`] backed by the backend's model routes.
#[derive(Debug, Clone)]
pub struct HttpRemoteModel {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteModel {
    /// Creates a client for the API rooted at `api_base_url`.
    #[must_use]
    pub fn new(api_base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Full URL predictions are posted to.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.url("models/predict")
    }

    /// Full URL of a fit task's status.
    #[must_use]
    pub fn fit_status_url(&self, task_id: &str) -> String {
        self.url(&format!("models/mrp/fit/{task_id}"))
    }

    async fn read<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let preview: String = body.chars().take(BODY_PREVIEW_LEN).collect();
            return Err(EngineError::RemoteStatus {
                status: status.as_u16(),
                body: preview,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, EngineError> {
        log::debug!("GET {url}");
        Self::read(self.client.get(url).send().await?).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, EngineError> {
        log::debug!("POST {url}");
        Self::read(self.client.post(url).json(body).send().await?).await
    }
}

#[async_trait]
impl RemoteModel for HttpRemoteModel {
    async fn predict(
        &self,
        request: &MrpPredictRequest,
    ) -> Result<MrpPredictionResponse, EngineError> {
        self.post(&self.endpoint(), request).await
    }

    async fn fitted_models(&self) -> Result<Vec<FittedModel>, EngineError> {
        let response: FittedModelsResponse = self.get(&self.url("models/mrp/fitted")).await?;
        Ok(response.models)
    }

    async fn trigger_fit(&self, request: &MrpFitRequest) -> Result<MrpFitTask, EngineError> {
        let task: MrpFitTask = self.post(&self.url("models/mrp/fit"), request).await?;
        log::info!(
            "Started MRP fit {} for {} {}",
            task.task_id,
            request.year,
            request.race_type
        );
        Ok(task)
    }

    async fn fit_status(&self, task_id: &str) -> Result<FitStatus, EngineError> {
        self.get(&self.fit_status_url(task_id)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use swing_map_election_models::RaceType;
    use swing_map_engine_models::FitTaskStatus;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Answers `count` requests with canned bodies, returning each
    /// request's first line and body.
    async fn serve(count: usize) -> (String, tokio::task::JoinHandle<Vec<(String, String)>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/api/v1", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..count {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0_u8; 16 * 1024];
                let mut len = 0;
                let (head_end, content_length) = loop {
                    let n = socket.read(&mut buf[len..]).await.unwrap();
                    len += n;
                    let text = String::from_utf8_lossy(&buf[..len]).to_string();
                    if let Some(end) = text.find("\r\n\r\n") {
                        let content_length = text[..end]
                            .lines()
                            .map(str::to_ascii_lowercase)
                            .find_map(|l| {
                                l.strip_prefix("content-length:")
                                    .map(|v| v.trim().parse::<usize>().unwrap())
                            })
                            .unwrap_or(0);
                        break (end + 4, content_length);
                    }
                };
                while len < head_end + content_length {
                    len += socket.read(&mut buf[len..]).await.unwrap();
                }

                let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
                let body = String::from_utf8_lossy(&buf[head_end..len]).to_string();
                let line = head.lines().next().unwrap_or_default().to_string();

                let (status, reply) = if line.starts_with("GET /api/v1/models/mrp/fitted ") {
                    ("200 OK", r#"{"models": [{"race_type": "governor", "year": 2022, "ward_vintage": 2022, "filename": "gov.nc"}]}"#)
                } else if line.starts_with("POST /api/v1/models/mrp/fit ") {
                    ("202 Accepted", r#"{"task_id": "t-1"}"#)
                } else if line.starts_with("GET /api/v1/models/mrp/fit/t-1 ") {
                    ("200 OK", r#"{"task_id": "t-1", "status": "SUCCESS"}"#)
                } else {
                    ("404 Not Found", r#"{"detail": "Not Found"}"#)
                };
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                    reply.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                seen.push((line, body));
            }
            seen
        });

        (base, handle)
    }

    #[test]
    fn endpoint_is_under_the_api_root() {
        let remote = HttpRemoteModel::new("http://localhost:8000/api/v1/");
        assert_eq!(remote.endpoint(), "http://localhost:8000/api/v1/models/predict");
        assert_eq!(
            remote.fit_status_url("t-9"),
            "http://localhost:8000/api/v1/models/mrp/fit/t-9"
        );
    }

    #[tokio::test]
    async fn fit_routes_use_the_mrp_paths() {
        let (base, server) = serve(3).await;
        let remote = HttpRemoteModel::new(&base);

        let models = remote.fitted_models().await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].race_type, RaceType::Governor);

        let task = remote
            .trigger_fit(&MrpFitRequest::new(2024, RaceType::President))
            .await
            .unwrap();
        assert_eq!(task.task_id, "t-1");

        let status = remote.fit_status(&task.task_id).await.unwrap();
        assert_eq!(status.status, FitTaskStatus::Success);

        let seen = server.await.unwrap();
        assert_eq!(seen[0].0, "GET /api/v1/models/mrp/fitted HTTP/1.1");
        assert_eq!(seen[1].0, "POST /api/v1/models/mrp/fit HTTP/1.1");
        let body: serde_json::Value = serde_json::from_str(&seen[1].1).unwrap();
        assert_eq!(body["draws"], 2000);
        assert_eq!(body["tune"], 1000);
        assert_eq!(seen[2].0, "GET /api/v1/models/mrp/fit/t-1 HTTP/1.1");
    }

    #[tokio::test]
    async fn missing_route_is_a_remote_status_error() {
        let (base, server) = serve(1).await;
        let remote = HttpRemoteModel::new(&base);

        let err = remote.fit_status("unknown").await.unwrap_err();
        assert!(matches!(err, EngineError::RemoteStatus { status: 404, .. }));
        server.await.unwrap();
    }

    /// Reports `PROGRESS` for the first `running` checks.
    struct CountingRemote {
        running: usize,
        checks: Mutex<usize>,
    }

    #[async_trait]
    impl RemoteModel for CountingRemote {
        async fn predict(
            &self,
            _request: &MrpPredictRequest,
        ) -> Result<MrpPredictionResponse, EngineError> {
            unreachable!("fit tests never predict")
        }

        async fn fitted_models(&self) -> Result<Vec<FittedModel>, EngineError> {
            Ok(Vec::new())
        }

        async fn trigger_fit(&self, _request: &MrpFitRequest) -> Result<MrpFitTask, EngineError> {
            Ok(MrpFitTask {
                task_id: "t-1".to_string(),
            })
        }

        async fn fit_status(&self, task_id: &str) -> Result<FitStatus, EngineError> {
            let mut checks = self.checks.lock().unwrap();
            *checks += 1;
            let status = if *checks > self.running {
                FitTaskStatus::Success
            } else {
                FitTaskStatus::Progress
            };
            Ok(FitStatus {
                task_id: task_id.to_string(),
                status,
                result: None,
                error: None,
                progress: None,
            })
        }
    }

    #[tokio::test]
    async fn polling_stops_at_the_first_finished_status() {
        let remote = CountingRemote {
            running: 2,
            checks: Mutex::new(0),
        };

        let status = poll_fit(&remote, "t-1", Duration::from_millis(1), 10)
            .await
            .unwrap();
        assert_eq!(status.status, FitTaskStatus::Success);
        assert_eq!(*remote.checks.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn polling_gives_up_after_max_polls() {
        let remote = CountingRemote {
            running: usize::MAX,
            checks: Mutex::new(0),
        };

        let err = poll_fit(&remote, "t-1", Duration::from_millis(1), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::FitTimeout { polls: 3, .. }));
        assert_eq!(*remote.checks.lock().unwrap(), 3);
    }
}
