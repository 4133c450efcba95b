//! EvalMy Core Library
//!
//! Client for the evalmy.ai scoring service. An [`Evaluator`] sends
//! expected/actual pairs to the service for each requested [`Symbol`] and
//! returns ordered, validated results. Batch, dataset and test-case
//! evaluation isolate failures per element.

pub mod auth;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod fakes;
pub mod obs;
pub mod projection;
pub mod scoring;
pub mod structure;
pub mod symbol;
pub mod telemetry;
pub mod test_case;
pub mod transport;

pub use auth::Auth;
pub use config::{EvaluatorConfig, WireSchema, DEFAULT_HOST};
pub use error::{EvalError, Result};
pub use evaluator::{BatchResult, EvalOptions, EvaluationInput, EvaluationResult, Evaluator};

pub use dataset::{Dataset, ScoredDataset, SymbolColumns};
pub use test_case::{TestCase, TestCaseItem, NO_ACTUAL_VALUE};

pub use scoring::{ScoringConfig, ScoringDescriptor, ScoringOverride, ScoringParams};
pub use symbol::{Symbol, DEFAULT_SYMBOLS};

pub use projection::{project, KeyOrder};
pub use structure::{check, ScalarKind, StructureError, Template};

pub use transport::{HttpTransport, ScoringTransport, TransportResponse};

pub use obs::{emit_attempt_failed, emit_element_failed, emit_op_finished, emit_symbol_scored};
pub use telemetry::init_tracing;
