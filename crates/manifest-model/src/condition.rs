//! Declarative conditions (`required_when`, `visible_when`, `enabled_when`)
//!
//! Conditions are evaluated against a context object shaped like
//! `{"record": <draft>}`. Field paths use dot notation; a path that does not
//! start with a known root is read relative to `record`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Roots a field path may start with explicitly
const CONTEXT_ROOTS: &[&str] = &["record"];

/// A boolean condition over the evaluation context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// Literal `true` / `false`
    Const(bool),
    /// Operator expression
    Expr(Expr),
}

/// Operator expression, tagged by `op`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    /// Field equals value
    Eq {
        /// Field path
        field: String,
        /// Expected value
        value: Value,
    },
    /// Field differs from value
    Neq {
        /// Field path
        field: String,
        /// Rejected value
        value: Value,
    },
    /// Field equals one of the values
    In {
        /// Field path
        field: String,
        /// Accepted values
        values: Vec<Value>,
    },
    /// Field is present and not null
    Exists {
        /// Field path
        field: String,
    },
    /// Field is absent, null or the empty string
    Empty {
        /// Field path
        field: String,
    },
    /// Field holds a truthy value
    Truthy {
        /// Field path
        field: String,
    },
    /// Every nested condition holds
    All {
        /// Nested conditions
        conditions: Vec<Condition>,
    },
    /// At least one nested condition holds
    Any {
        /// Nested conditions
        conditions: Vec<Condition>,
    },
    /// Nested condition does not hold
    Not {
        /// Negated condition
        condition: Box<Condition>,
    },
}

impl Condition {
    /// Evaluate against a raw context value
    #[must_use]
    pub fn evaluate(&self, context: &Value) -> bool {
        match self {
            Self::Const(value) => *value,
            Self::Expr(expr) => expr.evaluate(context),
        }
    }

    /// Evaluate against `{record: draft}`
    #[must_use]
    pub fn evaluate_record(&self, record: &serde_json::Map<String, Value>) -> bool {
        self.evaluate(&json!({ "record": record }))
    }
}

impl Expr {
    fn evaluate(&self, context: &Value) -> bool {
        match self {
            Self::Eq { field, value } => lookup(context, field) == Some(value),
            Self::Neq { field, value } => lookup(context, field) != Some(value),
            Self::In { field, values } => {
                lookup(context, field).is_some_and(|actual| values.contains(actual))
            }
            Self::Exists { field } => lookup(context, field).is_some_and(|v| !v.is_null()),
            Self::Empty { field } => crate::record::is_missing(lookup(context, field)),
            Self::Truthy { field } => lookup(context, field).is_some_and(is_truthy),
            Self::All { conditions } => conditions.iter().all(|c| c.evaluate(context)),
            Self::Any { conditions } => conditions.iter().any(|c| c.evaluate(context)),
            Self::Not { condition } => !condition.evaluate(context),
        }
    }
}

/// Resolve a dotted path in the context
#[must_use]
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let rooted = path
        .split('.')
        .next()
        .is_some_and(|first| CONTEXT_ROOTS.contains(&first));
    let mut current = if rooted { context } else { context.get("record")? };
    for segment in path.split('.') {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(value: Value) -> Condition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn literal_conditions() {
        assert!(cond(json!(true)).evaluate(&json!({})));
        assert!(!cond(json!(false)).evaluate(&json!({})));
    }

    #[test]
    fn eq_with_rooted_and_bare_paths() {
        let ctx = json!({"record": {"status": "approved"}});
        assert!(cond(json!({"op": "eq", "field": "record.status", "value": "approved"})).evaluate(&ctx));
        assert!(cond(json!({"op": "eq", "field": "status", "value": "approved"})).evaluate(&ctx));
        assert!(!cond(json!({"op": "eq", "field": "status", "value": "draft"})).evaluate(&ctx));
    }

    #[test]
    fn nested_paths() {
        let ctx = json!({"record": {"address": {"country": "DE"}}});
        assert!(cond(json!({"op": "in", "field": "address.country", "values": ["DE", "FR"]})).evaluate(&ctx));
        assert!(!cond(json!({"op": "exists", "field": "address.zip"})).evaluate(&ctx));
    }

    #[test]
    fn empty_and_truthy() {
        let ctx = json!({"record": {"note": "", "count": 0, "flag": true}});
        assert!(cond(json!({"op": "empty", "field": "note"})).evaluate(&ctx));
        assert!(cond(json!({"op": "empty", "field": "missing"})).evaluate(&ctx));
        assert!(!cond(json!({"op": "truthy", "field": "count"})).evaluate(&ctx));
        assert!(cond(json!({"op": "truthy", "field": "flag"})).evaluate(&ctx));
    }

    #[test]
    fn combinators() {
        let ctx = json!({"record": {"kind": "b2b", "vat": null}});
        let c = cond(json!({
            "op": "all",
            "conditions": [
                {"op": "eq", "field": "kind", "value": "b2b"},
                {"op": "not", "condition": {"op": "exists", "field": "vat"}}
            ]
        }));
        assert!(c.evaluate(&ctx));

        let c = cond(json!({
            "op": "any",
            "conditions": [false, {"op": "neq", "field": "kind", "value": "b2b"}]
        }));
        assert!(!c.evaluate(&ctx));
    }

    #[test]
    fn evaluate_record_wraps_context() {
        let mut record = serde_json::Map::new();
        record.insert("priority".into(), json!("high"));
        assert!(cond(json!({"op": "eq", "field": "priority", "value": "high"})).evaluate_record(&record));
    }
}
