// SPDX-License-Identifier: MIT

//! Reducer implementations
//!
//! Reducers are pure: they read the current value and the incoming value and
//! return the combined value without touching anything else.

use serde_json::{Map, Number, Value};

use super::schema::ReducerType;
use crate::graph::error::GraphError;

impl ReducerType {
    /// Combine `incoming` with the current value of `field`
    pub fn apply(
        &self,
        field: &str,
        current: Option<&Value>,
        incoming: &Value,
    ) -> Result<Value, GraphError> {
        match self {
            ReducerType::Overwrite => Ok(incoming.clone()),
            ReducerType::Append => append(field, current, incoming),
            ReducerType::Add => add(field, current, incoming),
            ReducerType::Max => extremum(field, current, incoming, |new, old| new > old),
            ReducerType::Min => extremum(field, current, incoming, |new, old| new < old),
            ReducerType::Merge => merge_objects(field, current, incoming),
            ReducerType::Messages => add_messages(field, current, incoming),
        }
    }
}

/// Name of a JSON value's shape, for mismatch diagnostics
pub(crate) fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(field: &str, expected: &str, found: &Value) -> GraphError {
    GraphError::ReducerMismatch {
        field: field.to_string(),
        expected: expected.to_string(),
        found: shape_of(found).to_string(),
    }
}

/// Current value as an array; absent or null starts empty
fn current_array(field: &str, current: Option<&Value>) -> Result<Vec<Value>, GraphError> {
    match current {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(mismatch(field, "array", other)),
    }
}

fn append(field: &str, current: Option<&Value>, incoming: &Value) -> Result<Value, GraphError> {
    let mut items = current_array(field, current)?;
    match incoming {
        Value::Array(new_items) => items.extend(new_items.iter().cloned()),
        other => items.push(other.clone()),
    }
    Ok(Value::Array(items))
}

fn add(field: &str, current: Option<&Value>, incoming: &Value) -> Result<Value, GraphError> {
    let Value::Number(rhs) = incoming else {
        return Err(mismatch(field, "number", incoming));
    };
    let lhs = match current {
        None | Some(Value::Null) => return Ok(incoming.clone()),
        Some(Value::Number(n)) => n,
        Some(other) => return Err(mismatch(field, "number", other)),
    };

    // Keep integer arithmetic exact when both sides are integers
    if let (Some(a), Some(b)) = (lhs.as_i64(), rhs.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Ok(Value::Number(sum.into()));
        }
    }

    let sum = lhs.as_f64().unwrap_or(0.0) + rhs.as_f64().unwrap_or(0.0);
    Number::from_f64(sum)
        .map(Value::Number)
        .ok_or_else(|| mismatch(field, "finite number", incoming))
}

fn extremum<F>(
    field: &str,
    current: Option<&Value>,
    incoming: &Value,
    replaces: F,
) -> Result<Value, GraphError>
where
    F: Fn(f64, f64) -> bool,
{
    let new = incoming
        .as_f64()
        .ok_or_else(|| mismatch(field, "number", incoming))?;
    match current {
        None | Some(Value::Null) => Ok(incoming.clone()),
        Some(value @ Value::Number(n)) => {
            let old = n.as_f64().unwrap_or(f64::NAN);
            if replaces(new, old) {
                Ok(incoming.clone())
            } else {
                Ok(value.clone())
            }
        }
        Some(other) => Err(mismatch(field, "number", other)),
    }
}

fn merge_objects(
    field: &str,
    current: Option<&Value>,
    incoming: &Value,
) -> Result<Value, GraphError> {
    let Value::Object(new_obj) = incoming else {
        return Err(mismatch(field, "object", incoming));
    };
    let mut merged = match current {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(obj)) => obj.clone(),
        Some(other) => return Err(mismatch(field, "object", other)),
    };
    for (k, v) in new_obj {
        merged.insert(k.clone(), v.clone());
    }
    Ok(Value::Object(merged))
}

/// Append messages; a message carrying an `id` already present replaces the
/// existing one in place. Messages without an `id` are always appended.
fn add_messages(
    field: &str,
    current: Option<&Value>,
    incoming: &Value,
) -> Result<Value, GraphError> {
    let mut messages = current_array(field, current)?;
    let new_messages: Vec<&Value> = match incoming {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };

    for message in new_messages {
        if !message.is_object() {
            return Err(mismatch(field, "message object", message));
        }
        let existing = message
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| {
                messages
                    .iter()
                    .position(|m| m.get("id").and_then(Value::as_str) == Some(id))
            });
        match existing {
            Some(pos) => messages[pos] = message.clone(),
            None => messages.push(message.clone()),
        }
    }
    Ok(Value::Array(messages))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overwrite_reducer() {
        let r = ReducerType::Overwrite;
        assert_eq!(r.apply("v", Some(&json!("first")), &json!("second")).unwrap(), json!("second"));
        assert_eq!(r.apply("v", None, &json!(1)).unwrap(), json!(1));
    }

    #[test]
    fn test_append_reducer() {
        let r = ReducerType::Append;
        let v = r.apply("items", None, &json!("item1")).unwrap();
        assert_eq!(v, json!(["item1"]));

        let v = r.apply("items", Some(&v), &json!("item2")).unwrap();
        assert_eq!(v, json!(["item1", "item2"]));

        let v = r.apply("items", Some(&v), &json!(["item3", "item4"])).unwrap();
        assert_eq!(v, json!(["item1", "item2", "item3", "item4"]));
    }

    #[test]
    fn test_append_onto_non_array_is_mismatch() {
        let err = ReducerType::Append
            .apply("items", Some(&json!("text")), &json!("x"))
            .unwrap_err();
        assert!(matches!(err, GraphError::ReducerMismatch { .. }));
    }

    #[test]
    fn test_add_reducer_keeps_integers() {
        let r = ReducerType::Add;
        assert_eq!(r.apply("count", Some(&json!(2)), &json!(1)).unwrap(), json!(3));
        assert_eq!(r.apply("count", None, &json!(5)).unwrap(), json!(5));
        assert_eq!(r.apply("count", Some(&json!(1.5)), &json!(1)).unwrap(), json!(2.5));
    }

    #[test]
    fn test_add_rejects_non_numbers() {
        let err = ReducerType::Add
            .apply("count", Some(&json!(1)), &json!("one"))
            .unwrap_err();
        match err {
            GraphError::ReducerMismatch { expected, found, .. } => {
                assert_eq!(expected, "number");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_max_reducer() {
        let r = ReducerType::Max;
        let v = r.apply("score", None, &json!(5.0)).unwrap();
        let v = r.apply("score", Some(&v), &json!(3.0)).unwrap();
        assert_eq!(v, json!(5.0));
        let v = r.apply("score", Some(&v), &json!(8.0)).unwrap();
        assert_eq!(v, json!(8.0));
    }

    #[test]
    fn test_min_reducer() {
        let r = ReducerType::Min;
        let v = r.apply("cost", None, &json!(10.0)).unwrap();
        let v = r.apply("cost", Some(&v), &json!(15.0)).unwrap();
        assert_eq!(v, json!(10.0));
        let v = r.apply("cost", Some(&v), &json!(5.0)).unwrap();
        assert_eq!(v, json!(5.0));
    }

    #[test]
    fn test_merge_reducer() {
        let r = ReducerType::Merge;
        let v = r.apply("meta", None, &json!({"a": 1})).unwrap();
        let v = r.apply("meta", Some(&v), &json!({"b": 2})).unwrap();
        assert_eq!(v, json!({"a": 1, "b": 2}));
        let v = r.apply("meta", Some(&v), &json!({"a": 10})).unwrap();
        assert_eq!(v, json!({"a": 10, "b": 2}));
    }

    #[test]
    fn test_messages_reducer_replaces_by_id() {
        let r = ReducerType::Messages;
        let v = r
            .apply(
                "messages",
                None,
                &json!([{"id": "1", "content": "hi"}, {"content": "no id"}]),
            )
            .unwrap();
        let v = r
            .apply("messages", Some(&v), &json!({"id": "1", "content": "edited"}))
            .unwrap();
        let v = r
            .apply("messages", Some(&v), &json!({"id": "2", "content": "new"}))
            .unwrap();

        assert_eq!(
            v,
            json!([
                {"id": "1", "content": "edited"},
                {"content": "no id"},
                {"id": "2", "content": "new"}
            ])
        );
    }

    #[test]
    fn test_messages_reducer_rejects_scalars() {
        assert!(ReducerType::Messages
            .apply("messages", None, &json!("plain text"))
            .is_err());
    }
}
