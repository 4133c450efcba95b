//! Canonical key ordering for nested service responses.
//!
//! The scoring service has reshaped its responses between protocol
//! revisions. [`project`] re-emits only the keys named by a [`KeyOrder`]
//! tree, in the tree's order, so callers always see the same field layout.

use serde_json::{Map, Value};

/// Ordered allow-list of keys, possibly nested.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOrder {
    /// Copy the value verbatim.
    Leaf,
    /// Project nested objects (or each object of a nested array) with these keys.
    Node(Vec<(String, KeyOrder)>),
}

impl KeyOrder {
    pub fn node<K: Into<String>>(fields: impl IntoIterator<Item = (K, KeyOrder)>) -> Self {
        KeyOrder::Node(fields.into_iter().map(|(k, o)| (k.into(), o)).collect())
    }

    /// A node whose children are all leaves.
    pub fn leaves<K: Into<String>>(keys: impl IntoIterator<Item = K>) -> Self {
        KeyOrder::Node(keys.into_iter().map(|k| (k.into(), KeyOrder::Leaf)).collect())
    }
}

/// Project `value` onto `order`.
///
/// Keys missing from `value` are skipped and keys absent from `order` are
/// dropped. Non-object elements of a nested array are copied unchanged.
pub fn project(value: &Map<String, Value>, order: &[(String, KeyOrder)]) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, child) in order {
        let Some(field) = value.get(key) else {
            continue;
        };
        out.insert(key.clone(), project_value(field, child));
    }
    out
}

fn project_value(value: &Value, order: &KeyOrder) -> Value {
    match (order, value) {
        (KeyOrder::Node(fields), Value::Object(map)) => Value::Object(project(map, fields)),
        (KeyOrder::Node(_), Value::Array(items)) => {
            Value::Array(items.iter().map(|item| project_value(item, order)).collect())
        }
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contradiction_order() -> Vec<(String, KeyOrder)> {
        match KeyOrder::node([
            ("scores", KeyOrder::leaves(["score"])),
            (
                "reasoning",
                KeyOrder::node([(
                    "statements",
                    KeyOrder::leaves(["severity", "summary", "reasoning"]),
                )]),
            ),
        ]) {
            KeyOrder::Node(fields) => fields,
            KeyOrder::Leaf => unreachable!(),
        }
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_projection_reorders_and_drops_keys() {
        let raw = as_map(json!({
            "call_outputs": ["..."],
            "reasoning": {"statements": [
                {"reasoning": "r", "summary": "s", "severity": "critical", "id": 3}
            ]},
            "scores": {"score": 0.0}
        }));

        let projected = project(&raw, &contradiction_order());

        let keys: Vec<_> = projected.keys().cloned().collect();
        assert_eq!(keys, vec!["scores", "reasoning"]);

        let statement = &projected["reasoning"]["statements"][0];
        let statement_keys: Vec<_> = statement.as_object().unwrap().keys().cloned().collect();
        assert_eq!(statement_keys, vec!["severity", "summary", "reasoning"]);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let raw = as_map(json!({
            "reasoning": {"statements": [{"summary": "s", "severity": "small"}]},
            "scores": {"score": 0.4, "extra": 1}
        }));
        let once = project(&raw, &contradiction_order());
        let twice = project(&once, &contradiction_order());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_missing_keys_are_skipped() {
        let raw = as_map(json!({"scores": {"score": 1.0}}));
        let projected = project(&raw, &contradiction_order());
        assert_eq!(projected.len(), 1);
        assert!(projected.get("reasoning").is_none());
    }

    #[test]
    fn test_leaf_copies_nested_values_verbatim() {
        let order = vec![("reasoning".to_string(), KeyOrder::Leaf)];
        let raw = as_map(json!({"reasoning": {"b": 1, "a": [2]}}));
        let projected = project(&raw, &order);
        assert_eq!(projected["reasoning"], json!({"b": 1, "a": [2]}));
    }
}
