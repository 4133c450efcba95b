//! In-memory fakes for the transport seam (testing only)
//!
//! [`ScriptedTransport`] answers each POST with the next queued response
//! and records every request it saw.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{EvalError, Result};
use crate::transport::{ScoringTransport, TransportResponse};

/// One recorded POST.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub body: Value,
}

/// Transport replaying a queue of canned outcomes.
///
/// When the queue runs dry every further request fails with `Connection`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<TransportResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response.
    pub fn push(&self, response: TransportResponse) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Queue a transport-level failure.
    pub fn push_error(&self, err: EvalError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    /// Queue a 200 in the nested wire layout.
    pub fn push_score(&self, score: f64, statements: Value) -> &Self {
        self.push(TransportResponse::new(200, scored_body(score, statements).to_string()))
    }

    /// Queue a non-success status.
    pub fn push_status(&self, status: u16, body: &str) -> &Self {
        self.push(TransportResponse::new(status, body))
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl ScoringTransport for ScriptedTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            body: body.clone(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EvalError::Connection("no scripted response left".to_string())))
    }
}

/// Nested-layout success body with `reasoning` encoded as a JSON string.
pub fn scored_body(score: f64, statements: Value) -> Value {
    json!({
        "scores": {"score": score},
        "reasoning": json!({"statements": statements}).to_string(),
        "call_outputs": []
    })
}

/// A single well-formed statement.
pub fn statement(severity: &str, summary: &str, reasoning: &str) -> Value {
    json!({"reasoning": reasoning, "summary": summary, "severity": severity})
}
