//! Error types for evalmy-core

use serde::Serialize;
use thiserror::Error;

use crate::structure::StructureError;

/// Errors produced by evaluator operations.
///
/// Every variant holds owned strings so errors can be cloned into the
/// per-element error slots of batch, dataset and test-case results.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EvalError {
    /// Caller-supplied data or configuration failed a structural check
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The scoring service answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The scoring service answered 200 but produced no usable score
    #[error("service error: {reasoning}")]
    Service { reasoning: String },

    /// The request never produced a response (connect, TLS, timeout)
    #[error("connection failed: {0}")]
    Connection(String),

    /// A 200 response whose body is not the expected JSON
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Anything that does not fit the categories above
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl EvalError {
    /// Wrap a structural failure with a description of what was checked.
    pub fn invalid(what: &str, err: StructureError) -> Self {
        EvalError::InvalidArgument(format!("{what} with msg: {err}"))
    }

    /// Status code for transport failures, `None` for everything else.
    pub fn status(&self) -> Option<u16> {
        match self {
            EvalError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt at the same remote call may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, EvalError::InvalidArgument(_) | EvalError::Unexpected(_))
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::MalformedResponse(err.to_string())
    }
}

/// Result type for evalmy-core operations
pub type Result<T> = std::result::Result<T, EvalError>;
