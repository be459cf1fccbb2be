//! Task-capture sink, the endpoint that files a task into the task system.

use async_trait::async_trait;
use tracing::debug;

use crate::error::SinkError;
use crate::task::CaptureRequest;

/// Outcome reported by the capture endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkResponse {
    pub code: u16,
    pub message: String,
}

impl SinkResponse {
    pub fn ok() -> Self {
        Self {
            code: 200,
            message: "OK".into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

/// Accepts encoded capture requests.
#[async_trait]
pub trait TaskSink: Send + Sync {
    async fn capture(&self, request: &CaptureRequest) -> Result<SinkResponse, SinkError>;
}

/// Capture over HTTP: `GET {base}/capture/b/LINK/{title}/{body}`.
pub struct HttpSink {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSink {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn url_for(&self, request: &CaptureRequest) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), request.path())
    }
}

#[async_trait]
impl TaskSink for HttpSink {
    async fn capture(&self, request: &CaptureRequest) -> Result<SinkResponse, SinkError> {
        let url = self.url_for(request);
        debug!(url = %url, "Sending capture request");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SinkError::RequestFailed(e.to_string()))?;

        let status = response.status();
        Ok(SinkResponse {
            code: status.as_u16(),
            message: status.canonical_reason().unwrap_or("").to_string(),
        })
    }
}
