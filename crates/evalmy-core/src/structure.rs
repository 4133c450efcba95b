//! Structural validation of JSON values against shape templates.
//!
//! A [`Template`] describes the shape a value must have:
//! - `Mapping` lists required keys (extra keys in the value are ignored)
//! - `Sequence` holds the template every element must satisfy
//! - `Scalar` names the JSON type a leaf must have
//!
//! [`check`] walks template and value together and reports the first
//! mismatch with a dotted path such as `.contradictions.reasoning.statements[1].severity`.

use serde_json::Value;

/// JSON scalar type tag. Integers and floats share `Number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Number,
    Bool,
    Null,
}

impl ScalarKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(ScalarKind::String),
            Value::Number(_) => Some(ScalarKind::Number),
            Value::Bool(_) => Some(ScalarKind::Bool),
            Value::Null => Some(ScalarKind::Null),
            Value::Object(_) | Value::Array(_) => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
            ScalarKind::Bool => "boolean",
            ScalarKind::Null => "null",
        }
    }
}

/// Shape template for a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    /// Required keys, checked in declaration order.
    Mapping(Vec<(String, Template)>),
    /// Element template; `None` accepts any array.
    Sequence(Option<Box<Template>>),
    /// Leaf of the given type.
    Scalar(ScalarKind),
}

impl Template {
    pub fn mapping<K: Into<String>>(fields: impl IntoIterator<Item = (K, Template)>) -> Self {
        Template::Mapping(fields.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    pub fn sequence(element: Template) -> Self {
        Template::Sequence(Some(Box::new(element)))
    }

    pub fn string() -> Self {
        Template::Scalar(ScalarKind::String)
    }

    pub fn number() -> Self {
        Template::Scalar(ScalarKind::Number)
    }

    /// Build a template from an exemplar value.
    ///
    /// Object keys become required keys in their serialized order, the first
    /// array element becomes the element template, scalars contribute their type.
    pub fn from_exemplar(value: &Value) -> Self {
        match value {
            Value::Object(map) => Template::Mapping(
                map.iter()
                    .map(|(k, v)| (k.clone(), Template::from_exemplar(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                Template::Sequence(items.first().map(|v| Box::new(Template::from_exemplar(v))))
            }
            scalar => Template::Scalar(ScalarKind::of(scalar).unwrap_or(ScalarKind::Null)),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Template::Mapping(_) => "object",
            Template::Sequence(_) => "array",
            Template::Scalar(kind) => kind.name(),
        }
    }
}

/// First structural mismatch found by [`check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureError {
    /// Dotted path of the value being checked when the mismatch was found
    pub path: String,
    /// Human readable description of the mismatch
    pub message: String,
}

impl StructureError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        StructureError {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StructureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}.", self.message)
        } else {
            write!(f, "{} at '{}'.", self.message, self.path)
        }
    }
}

impl std::error::Error for StructureError {}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        scalar => ScalarKind::of(scalar).map_or("null", ScalarKind::name),
    }
}

/// Check `value` against `template`, starting from the root path.
pub fn check(template: &Template, value: &Value) -> Result<(), StructureError> {
    check_at(template, value, "")
}

/// Check `value` against `template`, reporting failures relative to `path`.
pub fn check_at(template: &Template, value: &Value, path: &str) -> Result<(), StructureError> {
    match (template, value) {
        (Template::Mapping(fields), Value::Object(map)) => {
            for (key, field_template) in fields {
                let field = map.get(key).ok_or_else(|| {
                    StructureError::new(path, format!("field '{key}' expected, but not found"))
                })?;
                check_at(field_template, field, &format!("{path}.{key}"))?;
            }
            Ok(())
        }
        (Template::Sequence(element), Value::Array(items)) => {
            if let Some(element) = element {
                for (i, item) in items.iter().enumerate() {
                    check_at(element, item, &format!("{path}[{i}]"))?;
                }
            }
            Ok(())
        }
        (Template::Scalar(kind), v) if ScalarKind::of(v) == Some(*kind) => Ok(()),
        (t, v) => Err(StructureError::new(
            path,
            format!(
                "'{}' expected, but '{}' found",
                t.type_name(),
                value_type_name(v)
            ),
        )),
    }
}
