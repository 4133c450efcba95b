//! Scoring descriptors and per-symbol scoring configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EvalError, Result};
use crate::structure::{self, Template};
use crate::symbol::Symbol;

/// Severity labels every weight table must define.
pub const SEVERITY_LABELS: [&str; 4] = ["critical", "large", "small", "negligible"];

/// Scoring method sent to the service with each task.
///
/// Fields beyond `name` and `params` are kept and sent back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringDescriptor {
    /// Scoring method name (e.g. `linear`)
    pub name: String,
    /// Method parameters
    pub params: ScoringParams,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parameters of a scoring method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    /// Weight per severity label, in the order given
    pub weights: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScoringDescriptor {
    /// The linear descriptor every symbol starts with.
    pub fn linear_default() -> Self {
        Self::linear([1.0, 0.5, 0.1, 0.0])
    }

    /// Linear scoring with weights for critical, large, small and negligible.
    pub fn linear(weights: [f64; 4]) -> Self {
        ScoringDescriptor {
            name: "linear".to_string(),
            params: ScoringParams {
                weights: SEVERITY_LABELS
                    .iter()
                    .zip(weights)
                    .map(|(label, w)| (label.to_string(), Value::from(w)))
                    .collect(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    /// Weight of one severity label.
    pub fn weight(&self, label: &str) -> Option<f64> {
        self.params.weights.get(label)?.as_f64()
    }

    /// Validate a caller-supplied descriptor against the symbol's template.
    pub fn from_value(symbol: Symbol, value: &Value) -> Result<Self> {
        structure::check(symbol.scoring_template(), value)
            .map_err(|e| EvalError::invalid("wrong scoring format", e))?;
        let descriptor: ScoringDescriptor = serde_json::from_value(value.clone())
            .map_err(|e| EvalError::InvalidArgument(format!("wrong scoring format with msg: {e}")))?;
        descriptor.check_weights()?;
        Ok(descriptor)
    }

    /// Validate an already typed descriptor against the symbol's template.
    pub fn validate(&self, symbol: Symbol) -> Result<()> {
        let value = serde_json::to_value(self)
            .map_err(|e| EvalError::Unexpected(e.to_string()))?;
        structure::check(symbol.scoring_template(), &value)
            .map_err(|e| EvalError::invalid("wrong scoring format", e))?;
        self.check_weights()
    }

    // Labels beyond the required ones are allowed, but only as numbers.
    fn check_weights(&self) -> Result<()> {
        for (label, weight) in &self.params.weights {
            structure::check_at(
                &Template::number(),
                weight,
                &format!(".params.weights.{label}"),
            )
            .map_err(|e| EvalError::invalid("wrong scoring format", e))?;
        }
        Ok(())
    }
}

/// Current descriptor for every symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringConfig {
    descriptors: BTreeMap<Symbol, ScoringDescriptor>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            descriptors: Symbol::ALL
                .iter()
                .map(|s| (*s, s.default_scoring()))
                .collect(),
        }
    }
}

impl ScoringConfig {
    pub fn get(&self, symbol: Symbol) -> &ScoringDescriptor {
        // Default fills every symbol and `set` only replaces.
        &self.descriptors[&symbol]
    }

    /// Replace the descriptor for `symbol` after validating it.
    pub fn set(&mut self, symbol: Symbol, descriptor: ScoringDescriptor) -> Result<()> {
        descriptor.validate(symbol)?;
        self.descriptors.insert(symbol, descriptor);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &ScoringDescriptor)> {
        self.descriptors.iter().map(|(s, d)| (*s, d))
    }
}

/// Per-call scoring override.
///
/// An entry of `None` means "use the evaluator's current descriptor".
/// Entries keep the order they were given in, which also fixes the symbol
/// order for test-case evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringOverride {
    entries: Vec<(Symbol, Option<ScoringDescriptor>)>,
}

impl ScoringOverride {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for `symbol`.
    pub fn with(mut self, symbol: Symbol, descriptor: Option<ScoringDescriptor>) -> Self {
        match self.entries.iter_mut().find(|(s, _)| *s == symbol) {
            Some(entry) => entry.1 = descriptor,
            None => self.entries.push((symbol, descriptor)),
        }
        self
    }

    /// Parse an override object such as `{"missing_facts": null, "f1": {...}}`.
    ///
    /// Unknown symbols and non-null descriptors that fail the symbol's
    /// scoring template are rejected.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            EvalError::InvalidArgument("wrong scoring format: object expected".to_string())
        })?;
        let mut out = ScoringOverride::new();
        for (name, descriptor) in map {
            let symbol: Symbol = name.parse()?;
            let descriptor = match descriptor {
                Value::Null => None,
                other => Some(ScoringDescriptor::from_value(symbol, other)?),
            };
            out = out.with(symbol, descriptor);
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbols named by this override, in insertion order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.entries.iter().map(|(s, _)| *s).collect()
    }

    /// Effective descriptor for `symbol`, falling back to `defaults`.
    pub fn resolve<'a>(&'a self, symbol: Symbol, defaults: &'a ScoringConfig) -> &'a ScoringDescriptor {
        self.entries
            .iter()
            .find(|(s, _)| *s == symbol)
            .and_then(|(_, d)| d.as_ref())
            .unwrap_or_else(|| defaults.get(symbol))
    }
}
