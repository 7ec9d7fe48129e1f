// SPDX-License-Identifier: MIT

//! Condition expression evaluator

use serde_json::Value;

use super::ast::{CompareOp, Expression, Literal};
use crate::graph::state::State;

/// Evaluate a condition expression against a state snapshot
pub fn evaluate(expr: &Expression, state: &State) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Truthy(path) => state.get_path(path).is_some_and(is_truthy),
        Expression::Compare { path, op, right } => evaluate_compare(state.get_path(path), *op, right),
        Expression::And(left, right) => evaluate(left, state) && evaluate(right, state),
        Expression::Or(left, right) => evaluate(left, state) || evaluate(right, state),
        Expression::Not(inner) => !evaluate(inner, state),
    }
}

fn evaluate_compare(left: Option<&Value>, op: CompareOp, right: &Literal) -> bool {
    match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::NotEq => !values_equal(left, right),
        CompareOp::Gt => compare_numbers(left, right, |a, b| a > b),
        CompareOp::Gte => compare_numbers(left, right, |a, b| a >= b),
        CompareOp::Lt => compare_numbers(left, right, |a, b| a < b),
        CompareOp::Lte => compare_numbers(left, right, |a, b| a <= b),
        CompareOp::Contains => check_contains(left, right),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn literal_matches(value: &Value, literal: &Literal) -> bool {
    match (value, literal) {
        (Value::Null, Literal::Null) => true,
        (Value::String(s), Literal::String(rs)) => s == rs,
        (Value::Number(n), Literal::Number(rn)) => n.as_f64().is_some_and(|f| f == *rn),
        (Value::Bool(b), Literal::Boolean(rb)) => b == rb,
        _ => false,
    }
}

fn values_equal(left: Option<&Value>, right: &Literal) -> bool {
    match left {
        // A missing field compares equal to null
        None => *right == Literal::Null,
        Some(value) => literal_matches(value, right),
    }
}

fn compare_numbers<F>(left: Option<&Value>, right: &Literal, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (left.and_then(Value::as_f64), right) {
        (Some(l), Literal::Number(r)) => cmp(l, *r),
        _ => false,
    }
}

fn check_contains(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (Some(Value::String(s)), Literal::String(needle)) => s.contains(needle.as_str()),
        (Some(Value::Array(items)), literal) => items.iter().any(|v| literal_matches(v, literal)),
        (Some(Value::Object(map)), Literal::String(key)) => map.contains_key(key),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::condition::parser::parse;
    use serde_json::json;

    fn state(value: Value) -> State {
        State::from_json(value).unwrap()
    }

    fn check(condition: &str, state: &State) -> bool {
        evaluate(&parse(condition).unwrap(), state)
    }

    #[test]
    fn test_string_equality() {
        let s = state(json!({"intent": "search"}));
        assert!(check("intent == 'search'", &s));
        assert!(!check("intent == 'code'", &s));
        assert!(check("intent != 'code'", &s));
    }

    #[test]
    fn test_number_comparison() {
        let s = state(json!({"score": 7.5, "count": 3}));
        assert!(check("score > 5", &s));
        assert!(!check("score > 10", &s));
        assert!(check("score >= 7.5", &s));
        assert!(check("score <= 7.5", &s));
        assert!(!check("score < 5", &s));
        assert!(check("count == 3", &s));
    }

    #[test]
    fn test_missing_field_is_null() {
        let s = state(json!({"result": null}));
        assert!(check("result == null", &s));
        assert!(check("missing == null", &s));
        assert!(!check("missing == 'value'", &s));
        assert!(!check("missing > 0", &s));
    }

    #[test]
    fn test_contains() {
        let s = state(json!({
            "message": "hello world",
            "tags": ["bug", "urgent"],
            "ids": [1, 2, 3],
            "meta": {"owner": "ops"}
        }));
        assert!(check("message contains 'world'", &s));
        assert!(check("tags contains 'bug'", &s));
        assert!(!check("tags contains 'frontend'", &s));
        assert!(check("ids contains 2", &s));
        assert!(check("meta contains 'owner'", &s));
    }

    #[test]
    fn test_truthiness() {
        let s = state(json!({"approved": true, "notes": "", "items": [1], "zero": 0}));
        assert!(check("approved", &s));
        assert!(!check("notes", &s));
        assert!(check("items", &s));
        assert!(!check("zero", &s));
        assert!(!check("absent", &s));
        assert!(check("not absent", &s));
    }

    #[test]
    fn test_logical_operators() {
        let s = state(json!({"stage": "report", "confidence": 0.9, "retries": 1}));
        assert!(check("stage == 'report' and confidence > 0.8", &s));
        assert!(!check("stage == 'done' and confidence > 0.8", &s));
        assert!(check("stage == 'done' or retries < 3", &s));
        assert!(check("not (stage == 'done' or retries > 3)", &s));
    }

    #[test]
    fn test_nested_path() {
        let s = state(json!({"result": {"data": {"intent": "search"}, "items": ["a", "b"]}}));
        assert!(check("result.data.intent == 'search'", &s));
        assert!(check("result.items.1 == 'b'", &s));
    }
}
