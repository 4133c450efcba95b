//! Client configuration for the scoring service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// Default service host.
pub const DEFAULT_HOST: &str = "https://evalmy.ai";

/// Response layout the scoring service speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireSchema {
    /// `{"scores": {"score": ...}, "reasoning": "..."}`
    #[default]
    Nested,
    /// `{"score": ..., "reasoning": "..."}`, the first protocol revision
    Flat,
}

/// Evaluator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Service host, without the `/api` suffix
    pub host: String,
    /// Response layout to expect
    pub wire_schema: WireSchema,
    /// Per-request timeout; `None` leaves the HTTP client default
    pub timeout: Option<Duration>,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            host: DEFAULT_HOST.to_string(),
            wire_schema: WireSchema::default(),
            timeout: None,
            user_agent: concat!("evalmy-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl EvaluatorConfig {
    /// Create a config from environment variables
    ///
    /// Only `EVALMYAI_HOST` is read; credentials are the caller's business.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("EVALMYAI_HOST") {
            config.host = host;
        }
        config
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn with_wire_schema(mut self, wire_schema: WireSchema) -> Self {
        self.wire_schema = wire_schema;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Evaluation endpoint for `symbol`, lower-cased.
    pub fn endpoint(&self, symbol: Symbol) -> String {
        format!(
            "{}/api/symbol/evaluate/{}/v{}",
            self.host.trim_end_matches('/'),
            symbol.as_str(),
            symbol.version()
        )
        .to_lowercase()
    }
}
