//! Row-wise evaluation of tabular datasets.
//!
//! A [`Dataset`] is a set of named text columns sharing one row index.
//! `expected` and `actual` are required; `context` is optional. Evaluation
//! produces a [`ScoredDataset`] with the same index, one score and one
//! reason column per symbol, and an `error` column.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::Instrument;

use crate::error::{EvalError, Result};
use crate::evaluator::{EvalOptions, Evaluator};
use crate::obs;
use crate::symbol::Symbol;

/// Text columns sharing a row index. Missing cells are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    index: Vec<String>,
    columns: BTreeMap<String, Vec<Option<String>>>,
}

impl Dataset {
    /// Build a dataset from columns; every column must match the index length.
    pub fn from_columns<I, K>(index: Vec<String>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Vec<Option<String>>)>,
        K: Into<String>,
    {
        let mut out = BTreeMap::new();
        for (name, values) in columns {
            let name = name.into();
            if values.len() != index.len() {
                return Err(EvalError::InvalidArgument(format!(
                    "column '{name}' has {} rows, index has {}",
                    values.len(),
                    index.len()
                )));
            }
            out.insert(name, values);
        }
        Ok(Dataset {
            index,
            columns: out,
        })
    }

    /// Build a dataset from JSON records.
    ///
    /// Each record is an object; an `index` field, when present, becomes the
    /// row label, otherwise the row position is used. Non-string cells are
    /// stored in their JSON text form and `null` cells as missing.
    pub fn from_records(records: &[Value]) -> Result<Self> {
        let mut index = Vec::with_capacity(records.len());
        let mut columns: BTreeMap<String, Vec<Option<String>>> = BTreeMap::new();

        for (row, record) in records.iter().enumerate() {
            let map = record.as_object().ok_or_else(|| {
                EvalError::InvalidArgument(format!("record {row} is not an object"))
            })?;
            index.push(match map.get("index") {
                Some(Value::String(label)) => label.clone(),
                Some(other) if !other.is_null() => other.to_string(),
                _ => row.to_string(),
            });
            for (key, cell) in map {
                if key == "index" {
                    continue;
                }
                let column = columns
                    .entry(key.clone())
                    .or_insert_with(|| vec![None; row]);
                column.push(cell_text(cell));
            }
            for column in columns.values_mut() {
                column.resize(row + 1, None);
            }
        }

        Ok(Dataset { index, columns })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    fn require(&self, name: &str) -> Result<&[Option<String>]> {
        self.column(name).ok_or_else(|| {
            EvalError::InvalidArgument(format!("Column name '{name}' not found in the dataset."))
        })
    }
}

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Score and reason columns for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolColumns {
    pub symbol: Symbol,
    /// Headline score per row, `NaN` for failed rows
    pub scores: Vec<f64>,
    /// Decoded reasoning per row, `None` for failed rows
    pub reasons: Vec<Option<Value>>,
}

impl SymbolColumns {
    pub fn score_column(&self) -> String {
        format!("score_{}", self.symbol.column_suffix())
    }

    pub fn reason_column(&self) -> String {
        format!("reason_{}", self.symbol.column_suffix())
    }
}

/// Result of [`Evaluator::evaluate_dataset`], index-aligned with its input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDataset {
    pub index: Vec<String>,
    pub expected: Vec<Option<String>>,
    pub actual: Vec<Option<String>>,
    pub context: Vec<Option<String>>,
    pub symbols: Vec<SymbolColumns>,
    pub errors: Vec<Option<EvalError>>,
}

impl ScoredDataset {
    /// `(rows, columns)` counting expected, actual, context, the per-symbol
    /// score and reason columns, and error.
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), 4 + 2 * self.symbols.len())
    }

    /// Column names in output order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = vec![
            "expected".to_string(),
            "actual".to_string(),
            "context".to_string(),
        ];
        names.extend(self.symbols.iter().map(SymbolColumns::score_column));
        names.extend(self.symbols.iter().map(SymbolColumns::reason_column));
        names.push("error".to_string());
        names
    }

    /// Score of `symbol` at the row labelled `label`.
    pub fn score(&self, label: &str, symbol: Symbol) -> Option<f64> {
        let row = self.index.iter().position(|l| l == label)?;
        let columns = self.symbols.iter().find(|c| c.symbol == symbol)?;
        columns.scores.get(row).copied()
    }

    /// Error at the row labelled `label`.
    pub fn error(&self, label: &str) -> Option<&EvalError> {
        let row = self.index.iter().position(|l| l == label)?;
        self.errors.get(row)?.as_ref()
    }

    pub fn failed(&self) -> usize {
        self.errors.iter().filter(|e| e.is_some()).count()
    }

    /// One ordered JSON object per row. `NaN` scores become `null`.
    pub fn to_records(&self) -> Vec<Value> {
        (0..self.index.len())
            .map(|row| {
                let mut record = Map::new();
                record.insert("index".to_string(), json!(self.index[row]));
                record.insert("expected".to_string(), json!(self.expected[row]));
                record.insert("actual".to_string(), json!(self.actual[row]));
                record.insert("context".to_string(), json!(self.context[row]));
                for columns in &self.symbols {
                    record.insert(columns.score_column(), json!(columns.scores[row]));
                }
                for columns in &self.symbols {
                    record.insert(columns.reason_column(), json!(columns.reasons[row]));
                }
                record.insert(
                    "error".to_string(),
                    json!(self.errors[row].as_ref().map(ToString::to_string)),
                );
                Value::Object(record)
            })
            .collect()
    }
}

/// Join two context fragments with a newline, skipping empty ones.
pub(crate) fn join_context(outer: &str, inner: Option<&str>) -> String {
    match inner {
        Some(inner) if !inner.is_empty() && !outer.is_empty() => format!("{outer}\n{inner}"),
        Some(inner) if !inner.is_empty() => inner.to_string(),
        _ => outer.to_string(),
    }
}

impl Evaluator {
    /// Evaluate every row of `data`.
    ///
    /// `context` precedes each row's own context. Fails up front only when
    /// `expected` or `actual` columns are missing or the options are unusable;
    /// row failures are recorded in the `error` column with `NaN` scores.
    pub async fn evaluate_dataset(
        &self,
        data: &Dataset,
        symbols: &[Symbol],
        context: &str,
        retry_cnt: u32,
    ) -> Result<ScoredDataset> {
        let expected = data.require("expected")?;
        let actual = data.require("actual")?;
        let row_context = data.column("context");

        let options = EvalOptions::default()
            .with_symbols(symbols)
            .with_retry(retry_cnt);
        options.validate()?;

        let scored = self
            .run_dataset(data, expected, actual, row_context, context, &options)
            .instrument(obs::op_span("dataset", data.len()))
            .await;
        obs::emit_op_finished("dataset", scored.index.len(), scored.failed());
        Ok(scored)
    }

    async fn run_dataset(
        &self,
        data: &Dataset,
        expected: &[Option<String>],
        actual: &[Option<String>],
        row_context: Option<&[Option<String>]>,
        context: &str,
        options: &EvalOptions,
    ) -> ScoredDataset {
        let symbols = &options.symbols;
        let mut columns: Vec<SymbolColumns> = Vec::new();
        for symbol in symbols {
            if !columns.iter().any(|c| c.symbol == *symbol) {
                columns.push(SymbolColumns {
                    symbol: *symbol,
                    scores: Vec::with_capacity(data.len()),
                    reasons: Vec::with_capacity(data.len()),
                });
            }
        }
        let mut errors = Vec::with_capacity(data.len());

        for row in 0..data.len() {
            let inner = row_context.and_then(|c| c[row].as_deref());
            let input = json!({
                "expected": expected[row],
                "actual": actual[row],
                "context": join_context(context, inner),
            });

            match self.evaluate(&input, options).await {
                Ok(res) => {
                    for column in &mut columns {
                        column
                            .scores
                            .push(res.score(column.symbol).unwrap_or(f64::NAN));
                        column.reasons.push(res.reasoning(column.symbol).cloned());
                    }
                    errors.push(None);
                }
                Err(err) => {
                    obs::emit_element_failed("dataset", row, &err);
                    for column in &mut columns {
                        column.scores.push(f64::NAN);
                        column.reasons.push(None);
                    }
                    errors.push(Some(err));
                }
            }
        }

        let context_column = match row_context {
            Some(c) => c.to_vec(),
            None => vec![Some(context.to_string()); data.len()],
        };

        ScoredDataset {
            index: data.index.clone(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
            context: context_column,
            symbols: columns,
            errors,
        }
    }
}
