//! Transport seam between the evaluator and the scoring service.
//!
//! The evaluator only needs "POST this JSON, give me status and body".
//! [`HttpTransport`] does that over reqwest; [`crate::fakes::ScriptedTransport`]
//! does it from a queue of canned responses for tests.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::EvaluatorConfig;
use crate::error::Result;

/// Raw response of one POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        TransportResponse {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Something that can POST a JSON task to the scoring service.
///
/// Implementations return `Ok` for every response that carries a status,
/// whatever the status is. `Err` is reserved for requests that never got one.
#[async_trait]
pub trait ScoringTransport: Send + Sync {
    async fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &EvaluatorConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(HttpTransport {
            http_client: builder.build()?,
        })
    }
}

#[async_trait]
impl ScoringTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse> {
        debug!(url = %url, "POST evaluation task");
        let response = self.http_client.post(url).json(body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}
