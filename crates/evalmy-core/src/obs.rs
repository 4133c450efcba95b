//! Structured observability hooks for evaluation calls.
//!
//! This module provides:
//! - Operation-scoped tracing spans via [`op_span`]
//! - Emission functions for attempts, scored symbols and per-element failures
//!
//! Events carry an `event` field so they can be filtered in JSON log output.
//! Credentials and tokens are never passed to these functions.

use tracing::{info, warn, Span};

use crate::symbol::Symbol;

/// Span for one multi-element operation.
///
/// Attach it with `tracing::Instrument` so it stays correct across awaits.
///
/// # Example
///
/// ```ignore
/// run_batch().instrument(op_span("batch", 12)).await
/// // Events emitted inside carry op = "batch", elements = 12
/// ```
pub fn op_span(op: &str, elements: usize) -> Span {
    tracing::info_span!("evalmy.op", op = %op, elements = elements)
}

/// Emit event: one attempt at a remote call failed and will be retried.
pub fn emit_attempt_failed(symbol: Symbol, attempt: u32, retry_cnt: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "attempt.failed",
        symbol = %symbol,
        attempt = attempt,
        retry_cnt = retry_cnt,
        error = %error,
    );
}

/// Emit event: a symbol was scored.
pub fn emit_symbol_scored(symbol: Symbol, attempts: u32, score: Option<f64>) {
    info!(
        event = "symbol.scored",
        symbol = %symbol,
        attempts = attempts,
        score = score.unwrap_or(f64::NAN),
    );
}

/// Emit event: one element of a batch, dataset or test case failed.
pub fn emit_element_failed(op: &str, index: usize, error: &dyn std::fmt::Display) {
    warn!(event = "element.failed", op = %op, index = index, error = %error);
}

/// Emit event: a multi-element operation finished.
pub fn emit_op_finished(op: &str, total: usize, failed: usize) {
    info!(event = "op.finished", op = %op, total = total, failed = failed);
}
