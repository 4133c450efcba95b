//! The evaluator: builds tasks, calls the scoring service, shapes results.
//!
//! [`Evaluator::evaluate`] scores one expected/actual pair for a set of
//! symbols. [`Evaluator::evaluate_batch`] applies it to a list of inputs and
//! isolates failures per entry. Dataset and test-case evaluation live in
//! [`crate::dataset`] and [`crate::test_case`].

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, Instrument};

use crate::auth::Auth;
use crate::config::{EvaluatorConfig, WireSchema};
use crate::error::{EvalError, Result};
use crate::obs;
use crate::projection;
use crate::scoring::{ScoringConfig, ScoringDescriptor, ScoringOverride};
use crate::structure::{self, Template};
use crate::symbol::{Symbol, DEFAULT_SYMBOLS};
use crate::transport::{HttpTransport, ScoringTransport, TransportResponse};

static INPUT_TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::mapping([
        ("expected", Template::string()),
        ("actual", Template::string()),
        ("context", Template::string()),
    ])
});

/// One expected/actual pair with optional context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationInput {
    pub expected: String,
    pub actual: String,
    #[serde(default)]
    pub context: String,
}

impl EvaluationInput {
    pub fn new(expected: &str, actual: &str) -> Self {
        EvaluationInput {
            expected: expected.to_string(),
            actual: actual.to_string(),
            context: String::new(),
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }

    pub fn to_value(&self) -> Value {
        json!({
            "expected": self.expected,
            "actual": self.actual,
            "context": self.context,
        })
    }
}

/// Options shared by the evaluation operations.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOptions {
    /// Symbols to score, in order
    pub symbols: Vec<Symbol>,
    /// Per-call scoring; `None` uses the evaluator's current scoring
    pub scoring: Option<ScoringOverride>,
    /// Attempts per symbol, at least 1
    pub retry_cnt: u32,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            symbols: DEFAULT_SYMBOLS.to_vec(),
            scoring: None,
            retry_cnt: 1,
        }
    }
}

impl EvalOptions {
    pub fn with_symbols(mut self, symbols: &[Symbol]) -> Self {
        self.symbols = symbols.to_vec();
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringOverride) -> Self {
        self.scoring = Some(scoring);
        self
    }

    pub fn with_retry(mut self, retry_cnt: u32) -> Self {
        self.retry_cnt = retry_cnt;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            return Err(EvalError::InvalidArgument(
                "at least one symbol must be requested".to_string(),
            ));
        }
        if self.retry_cnt == 0 {
            return Err(EvalError::InvalidArgument(
                "retry_cnt must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Symbols with duplicates removed, first occurrence wins.
    fn distinct_symbols(&self) -> Vec<Symbol> {
        let mut out: Vec<Symbol> = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            if !out.contains(symbol) {
                out.push(*symbol);
            }
        }
        out
    }
}

/// Projected results of one evaluation, keyed by symbol name in request order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvaluationResult(Map<String, Value>);

impl EvaluationResult {
    pub fn get(&self, symbol: Symbol) -> Option<&Value> {
        self.0.get(symbol.as_str())
    }

    /// The headline score of `symbol`.
    pub fn score(&self, symbol: Symbol) -> Option<f64> {
        self.get(symbol)?.get("scores")?.get("score")?.as_f64()
    }

    /// The decoded reasoning object of `symbol`.
    pub fn reasoning(&self, symbol: Symbol) -> Option<&Value> {
        self.get(symbol)?.get("reasoning")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Index-aligned outcome of [`Evaluator::evaluate_batch`].
///
/// For every index exactly one of `results[i]` and `errors[i]` is `Some`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult {
    pub results: Vec<Option<EvaluationResult>>,
    pub errors: Vec<Option<EvalError>>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failed(&self) -> usize {
        self.errors.iter().filter(|e| e.is_some()).count()
    }
}

/// Client for the scoring service.
///
/// Holds the caller's LLM credentials, the service token and the current
/// per-symbol scoring. Operations run one remote call at a time.
pub struct Evaluator {
    auth: Auth,
    token: String,
    scoring: ScoringConfig,
    config: EvaluatorConfig,
    transport: Arc<dyn ScoringTransport>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("auth", &self.auth)
            .field("token", &"<redacted>")
            .field("scoring", &self.scoring)
            .field("config", &self.config)
            .finish()
    }
}

impl Evaluator {
    /// Create an evaluator talking to the default host over HTTP.
    pub fn new(auth: Auth, token: &str) -> Result<Self> {
        Self::with_config(auth, token, EvaluatorConfig::default())
    }

    pub fn with_config(auth: Auth, token: &str, config: EvaluatorConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(auth, token, config, Arc::new(transport)))
    }

    pub fn with_transport(
        auth: Auth,
        token: &str,
        config: EvaluatorConfig,
        transport: Arc<dyn ScoringTransport>,
    ) -> Self {
        Evaluator {
            auth,
            token: token.to_string(),
            scoring: ScoringConfig::default(),
            config,
            transport,
        }
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Replace the scoring descriptor for a symbol given by name.
    ///
    /// Fails with `InvalidArgument` for unknown symbols and for descriptors
    /// whose shape does not match the symbol's default.
    pub fn set_scoring(&mut self, symbol: &str, scoring: &Value) -> Result<()> {
        let symbol: Symbol = symbol.parse()?;
        let descriptor = ScoringDescriptor::from_value(symbol, scoring)?;
        self.scoring.set(symbol, descriptor)?;
        info!(symbol = %symbol, "scoring replaced");
        Ok(())
    }

    /// Replace the scoring descriptor for a symbol with a typed descriptor.
    pub fn set_scoring_descriptor(&mut self, symbol: Symbol, descriptor: ScoringDescriptor) -> Result<()> {
        self.scoring.set(symbol, descriptor)?;
        info!(symbol = %symbol, "scoring replaced");
        Ok(())
    }

    /// Evaluate a single `{expected, actual, context}` object.
    ///
    /// A missing `context` defaults to the empty string. Every requested
    /// symbol is scored with up to `retry_cnt` attempts; the first failure
    /// that survives its retries is returned.
    pub async fn evaluate(&self, data: &Value, options: &EvalOptions) -> Result<EvaluationResult> {
        options.validate()?;
        let symbols = options.distinct_symbols();

        let mut data = data.clone();
        if let Value::Object(map) = &mut data {
            map.entry("context")
                .or_insert_with(|| Value::String(String::new()));
        }
        structure::check(&INPUT_TEMPLATE, &data)
            .map_err(|e| EvalError::invalid("wrong input data format", e))?;

        let mut result = Map::new();
        for symbol in &symbols {
            let descriptor = match &options.scoring {
                Some(over) => over.resolve(*symbol, &self.scoring),
                None => self.scoring.get(*symbol),
            };
            let task = json!({
                "input_data": data,
                "scoring": descriptor,
                "aggregation": {"n_calls": 1, "agg_method": "mean"},
                "auth": self.auth,
                "api_token": self.token,
            });
            let scored = self.call_with_retry(*symbol, &task, options.retry_cnt).await?;
            result.insert(symbol.as_str().to_string(), Value::Object(scored));
        }

        for symbol in &symbols {
            let value = result.get(symbol.as_str()).unwrap_or(&Value::Null);
            structure::check_at(symbol.output_template(), value, &format!(".{symbol}"))
                .map_err(|e| EvalError::invalid("wrong output data format", e))?;
        }

        Ok(EvaluationResult(result))
    }

    /// Evaluate a typed input.
    pub async fn evaluate_input(
        &self,
        input: &EvaluationInput,
        options: &EvalOptions,
    ) -> Result<EvaluationResult> {
        self.evaluate(&input.to_value(), options).await
    }

    /// Evaluate every entry independently.
    ///
    /// A failing entry leaves `None` in `results` and its error in `errors`
    /// at the same index; the remaining entries are still evaluated.
    pub async fn evaluate_batch(&self, data: &[Value], options: &EvalOptions) -> BatchResult {
        self.run_batch(data, options)
            .instrument(obs::op_span("batch", data.len()))
            .await
    }

    async fn run_batch(&self, data: &[Value], options: &EvalOptions) -> BatchResult {
        let mut results = Vec::with_capacity(data.len());
        let mut errors = Vec::with_capacity(data.len());

        for (i, entry) in data.iter().enumerate() {
            match self.evaluate(entry, options).await {
                Ok(res) => {
                    results.push(Some(res));
                    errors.push(None);
                }
                Err(err) => {
                    obs::emit_element_failed("batch", i, &err);
                    results.push(None);
                    errors.push(Some(err));
                }
            }
        }

        let batch = BatchResult { results, errors };
        obs::emit_op_finished("batch", batch.len(), batch.failed());
        batch
    }

    async fn call_with_retry(
        &self,
        symbol: Symbol,
        task: &Value,
        retry_cnt: u32,
    ) -> Result<Map<String, Value>> {
        let url = self.config.endpoint(symbol);
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(symbol = %symbol, attempt = attempt, "submitting evaluation task");
            let outcome = match self.transport.post_json(&url, task).await {
                Ok(response) => self.interpret(symbol, response),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(projected) => {
                    let score = projected
                        .get("scores")
                        .and_then(|s| s.get("score"))
                        .and_then(Value::as_f64);
                    obs::emit_symbol_scored(symbol, attempt, score);
                    return Ok(projected);
                }
                Err(err) if attempt < retry_cnt && err.is_retryable() => {
                    obs::emit_attempt_failed(symbol, attempt, retry_cnt, &err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Turn one raw response into a projected result, or the error it represents.
    fn interpret(&self, symbol: Symbol, response: TransportResponse) -> Result<Map<String, Value>> {
        if !response.is_success() {
            return Err(EvalError::Http {
                status: response.status,
                body: response.body,
            });
        }

        let mut raw = match serde_json::from_str::<Value>(&response.body)? {
            Value::Object(map) => map,
            other => {
                return Err(EvalError::MalformedResponse(format!(
                    "object expected, got {other}"
                )))
            }
        };

        let score = match self.config.wire_schema {
            WireSchema::Nested => raw
                .get("scores")
                .and_then(|s| s.get("score"))
                .and_then(Value::as_f64),
            WireSchema::Flat => raw.get("score").and_then(Value::as_f64),
        };
        let Some(score) = score else {
            let reasoning = match raw.get("reasoning") {
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
                None => format!("no score for {symbol} in service response"),
            };
            return Err(EvalError::Service { reasoning });
        };

        if self.config.wire_schema == WireSchema::Flat {
            raw.remove("score");
            raw.insert("scores".to_string(), json!({ "score": score }));
        }

        if let Some(Value::String(encoded)) = raw.get("reasoning") {
            let decoded: Value = serde_json::from_str(encoded).map_err(|e| {
                EvalError::MalformedResponse(format!("reasoning is not valid JSON: {e}"))
            })?;
            raw.insert("reasoning".to_string(), decoded);
        }

        Ok(projection::project(&raw, symbol.key_order()))
    }
}
