//! Evaluation symbols and their per-symbol contracts.
//!
//! Each symbol carries a protocol version, a default scoring descriptor,
//! an output template used to validate projected results, and the key
//! order used to project raw responses.

use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::projection::KeyOrder;
use crate::scoring::ScoringDescriptor;
use crate::structure::Template;

/// A named evaluation dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbol {
    Contradictions,
    MissingFacts,
    F1,
}

/// Symbols evaluated when the caller does not choose any.
pub const DEFAULT_SYMBOLS: &[Symbol] = &[Symbol::Contradictions];

static STATEMENTS_TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::mapping([(
        "statements",
        Template::sequence(Template::mapping([
            ("reasoning", Template::string()),
            ("summary", Template::string()),
            ("severity", Template::string()),
        ])),
    )])
});

static STATEMENT_OUTPUT_TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    Template::mapping([
        ("scores", Template::mapping([("score", Template::number())])),
        ("reasoning", STATEMENTS_TEMPLATE.clone()),
    ])
});

static STATEMENT_ORDER: LazyLock<KeyOrder> = LazyLock::new(|| {
    KeyOrder::node([
        ("scores", KeyOrder::leaves(["score"])),
        (
            "reasoning",
            KeyOrder::node([(
                "statements",
                KeyOrder::leaves(["severity", "summary", "reasoning"]),
            )]),
        ),
    ])
});

static F1_ORDER: LazyLock<KeyOrder> = LazyLock::new(|| {
    KeyOrder::node([
        ("scores", KeyOrder::leaves(["score", "precision", "recall"])),
        (
            "reasoning",
            KeyOrder::node([(
                "statements",
                KeyOrder::leaves(["severity", "summary", "reasoning"]),
            )]),
        ),
    ])
});

static DEFAULT_SCORING_TEMPLATE: LazyLock<Template> = LazyLock::new(|| {
    let exemplar = serde_json::to_value(ScoringDescriptor::linear_default())
        .unwrap_or(serde_json::Value::Null);
    Template::from_exemplar(&exemplar)
});

impl Symbol {
    /// Every symbol, in catalogue order.
    pub const ALL: [Symbol; 3] = [Symbol::Contradictions, Symbol::MissingFacts, Symbol::F1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Contradictions => "contradictions",
            Symbol::MissingFacts => "missing_facts",
            Symbol::F1 => "f1",
        }
    }

    /// Protocol version of the remote evaluation endpoint.
    pub fn version(&self) -> &'static str {
        "1"
    }

    /// Short form used in dataset column names (`score_con`, `reason_mis`, ...).
    pub fn column_suffix(&self) -> &'static str {
        let name = self.as_str();
        &name[..name.len().min(3)]
    }

    pub fn default_scoring(&self) -> ScoringDescriptor {
        ScoringDescriptor::linear_default()
    }

    /// Shape a user-supplied scoring descriptor must have.
    pub fn scoring_template(&self) -> &'static Template {
        &DEFAULT_SCORING_TEMPLATE
    }

    /// Shape of one projected result for this symbol.
    pub fn output_template(&self) -> &'static Template {
        &STATEMENT_OUTPUT_TEMPLATE
    }

    /// Canonical key order of one projected result for this symbol.
    pub fn key_order(&self) -> &'static [(String, KeyOrder)] {
        let order: &'static KeyOrder = match self {
            Symbol::F1 => &F1_ORDER,
            Symbol::Contradictions | Symbol::MissingFacts => &STATEMENT_ORDER,
        };
        match order {
            KeyOrder::Node(fields) => fields,
            KeyOrder::Leaf => &[],
        }
    }

    /// Parse a list of symbol names, rejecting anything outside the catalogue.
    ///
    /// Duplicates are dropped; first occurrence wins.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Symbol>> {
        let mut symbols = Vec::with_capacity(names.len());
        for name in names {
            let symbol: Symbol = name.as_ref().parse()?;
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        Ok(symbols)
    }
}

impl FromStr for Symbol {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        Symbol::ALL
            .into_iter()
            .find(|symbol| symbol.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Symbol::ALL.iter().map(Symbol::as_str).collect();
                EvalError::InvalidArgument(format!(
                    "wrong symbol: {s}, one of {known:?} expected"
                ))
            })
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
