//! Structured test-case evaluation.
//!
//! A test case is a JSON object with an `items` list of
//! `{expected, actual?, context?}` objects, an optional shared `context`
//! and an optional per-case `scoring` override whose keys select the
//! symbols. Items without `actual` take the next value from a positional
//! list supplied by the caller.
//!
//! # Example input
//!
//! ```json
//! {
//!   "context": "Geography quiz",
//!   "scoring": {"missing_facts": null},
//!   "items": [
//!     {"context": "Question: Which continent is the second smallest?", "expected": "Europe"}
//!   ]
//! }
//! ```

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::Instrument;

use crate::dataset::join_context;
use crate::error::{EvalError, Result};
use crate::evaluator::{EvalOptions, Evaluator};
use crate::obs;
use crate::scoring::ScoringOverride;
use crate::structure::{self, Template};

/// Error recorded for items without a usable actual value.
pub const NO_ACTUAL_VALUE: &str = "No actual value.";

static TEST_CASE_TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::mapping([(
        "items",
        Template::sequence(Template::mapping([("expected", Template::string())])),
    )])
});

/// Typed builder for test-case documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring: Option<Value>,
    pub items: Vec<TestCaseItem>,
    /// Any other top-level fields, copied to the result unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One item of a [`TestCase`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCaseItem {
    pub expected: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl TestCase {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl TestCaseItem {
    pub fn new(expected: &str) -> Self {
        TestCaseItem {
            expected: expected.to_string(),
            ..Default::default()
        }
    }

    pub fn with_actual(mut self, actual: &str) -> Self {
        self.actual = Some(actual.to_string());
        self
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }
}

/// Positional source of actual values shared across items.
struct ActualCursor<'a> {
    values: &'a [String],
    next: usize,
}

impl<'a> ActualCursor<'a> {
    fn new(values: Option<&'a [String]>) -> Self {
        ActualCursor {
            values: values.unwrap_or(&[]),
            next: 0,
        }
    }

    fn take(&mut self) -> Option<&'a str> {
        let value = self.values.get(self.next)?;
        self.next += 1;
        Some(value)
    }
}

fn has_actual_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// How a failure is recorded in an item's `error` field.
fn item_error(err: &EvalError) -> Value {
    match err {
        EvalError::Http { status, body } => json!({"code": status, "text": body}),
        other => Value::String(other.to_string()),
    }
}

impl Evaluator {
    /// Evaluate every item of a test case.
    ///
    /// The result copies every top-level field except `items` and adds the
    /// evaluated `items`. Each output item holds `context` (if any),
    /// `expected`, `actual` (if any), one entry per scored symbol, or an
    /// `error` entry when that item failed.
    pub async fn evaluate_test_case(
        &self,
        test_case: &Value,
        actual_values: Option<&[String]>,
        retry_cnt: u32,
    ) -> Result<Map<String, Value>> {
        structure::check(&TEST_CASE_TEMPLATE, test_case)
            .map_err(|e| EvalError::invalid("wrong input data format", e))?;
        let Value::Object(case) = test_case else {
            return Err(EvalError::InvalidArgument(
                "wrong input data format: object expected".to_string(),
            ));
        };

        let mut options = EvalOptions::default().with_retry(retry_cnt);
        if let Some(scoring) = case.get("scoring").filter(|s| !s.is_null()) {
            let over = ScoringOverride::from_value(scoring)?;
            if !over.is_empty() {
                options = options.with_symbols(&over.symbols()).with_scoring(over);
            }
        }
        options.validate()?;

        let shared_context = match case.get("context") {
            None | Some(Value::Null) => "",
            Some(Value::String(s)) => s.as_str(),
            Some(_) => {
                return Err(EvalError::InvalidArgument(
                    "wrong input data format: 'string' expected at '.context'.".to_string(),
                ))
            }
        };

        let mut result = Map::new();
        for (key, value) in case {
            if key != "items" {
                result.insert(key.clone(), value.clone());
            }
        }

        let items = case
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let (out_items, failed) = self
            .run_items(items, shared_context, actual_values, &options)
            .instrument(obs::op_span("test_case", items.len()))
            .await;

        obs::emit_op_finished("test_case", out_items.len(), failed);
        result.insert("items".to_string(), Value::Array(out_items));
        Ok(result)
    }

    async fn run_items(
        &self,
        items: &[Value],
        shared_context: &str,
        actual_values: Option<&[String]>,
        options: &EvalOptions,
    ) -> (Vec<Value>, usize) {
        let mut cursor = ActualCursor::new(actual_values);
        let mut out_items = Vec::with_capacity(items.len());
        let mut failed = 0;

        for (i, item) in items.iter().enumerate() {
            let Value::Object(item) = item else {
                continue;
            };
            let mut input = item.clone();

            let own_context = item.get("context").and_then(Value::as_str);
            let context = (!shared_context.is_empty() || own_context.is_some())
                .then(|| join_context(shared_context, own_context));
            if let Some(context) = &context {
                input.insert("context".to_string(), Value::String(context.clone()));
            }

            // The cursor only fills items that carry no `actual` key at all.
            let actual = match item.get("actual") {
                Some(value) => Some(value.clone()),
                None => cursor
                    .take()
                    .filter(|v| !v.is_empty())
                    .map(|v| Value::String(v.to_string())),
            };

            let mut out = Map::new();
            if let Some(context) = context {
                out.insert("context".to_string(), Value::String(context));
            }
            out.insert("expected".to_string(), item["expected"].clone());
            if let Some(actual) = &actual {
                out.insert("actual".to_string(), actual.clone());
            }

            match actual.filter(has_actual_value) {
                Some(actual) => {
                    input.insert("actual".to_string(), actual);
                    match self.evaluate(&Value::Object(input), options).await {
                        Ok(res) => out.extend(res.into_map()),
                        Err(err) => {
                            obs::emit_element_failed("test_case", i, &err);
                            failed += 1;
                            out.insert("error".to_string(), item_error(&err));
                        }
                    }
                }
                None => {
                    failed += 1;
                    out.insert(
                        "error".to_string(),
                        Value::String(NO_ACTUAL_VALUE.to_string()),
                    );
                }
            }

            out_items.push(Value::Object(out));
        }

        (out_items, failed)
    }
}
