//! Parsing of `key=value` parameter tokens from FUNCTION_CALL directives.
//!
//! Dotted keys produce nested objects (`input.string=AB` becomes
//! `{"input": {"string": "AB"}}`) and values go through a permissive
//! literal grammar before falling back to the trimmed raw string. This
//! module knows nothing about tool schemas; coercion against a schema is
//! the dispatcher's job.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Invalid parameter format (expected key=value): {0}")]
    MissingEquals(String),
}

/// Parse an ordered token list into a nested argument object.
///
/// Later tokens win on path collisions. Fails without producing partial
/// output when any token lacks `=`.
pub fn parse_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Value, ParamError> {
    let mut root = Map::new();
    for token in tokens {
        let token = token.as_ref();
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| ParamError::MissingEquals(token.to_string()))?;
        let parsed = parse_literal(value);
        insert_path(&mut root, key, parsed);
    }
    Ok(Value::Object(root))
}

/// Interpret a raw value as a literal: integer, float, boolean, a
/// bracketed list of literals, or a quoted string. Anything else is the
/// trimmed raw string.
pub fn parse_literal(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match trimmed {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        _ => {}
    }
    if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let items = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner.split(',').map(parse_literal).collect()
        };
        return Value::Array(items);
    }
    if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        return Value::String(trimmed[1..trimmed.len() - 1].to_string());
    }
    Value::String(trimmed.to_string())
}

fn insert_path(root: &mut Map<String, Value>, key: &str, value: Value) {
    let mut segments: Vec<&str> = key.split('.').collect();
    let last = segments.pop().unwrap_or(key);
    let mut current = root;
    for seg in segments {
        current = child_object(current, seg);
    }
    current.insert(last.to_string(), value);
}

fn child_object<'a>(parent: &'a mut Map<String, Value>, seg: &str) -> &'a mut Map<String, Value> {
    let entry = parent
        .entry(seg.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        // Last token wins: a scalar at an intermediate path gets replaced.
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(map) => map,
        _ => unreachable!("entry was just made an object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_key_builds_object() {
        let args = parse_tokens(&["input.string=AB"]).unwrap();
        assert_eq!(args, json!({"input": {"string": "AB"}}));
    }

    #[test]
    fn literals_are_typed() {
        let args = parse_tokens(&["x=7", "y=2.5", "flag=true", "name=hello world"]).unwrap();
        assert_eq!(
            args,
            json!({"x": 7, "y": 2.5, "flag": true, "name": "hello world"})
        );
    }

    #[test]
    fn bracketed_list_parses_elementwise() {
        let args = parse_tokens(&["input.int_list=[68, 104, 97]"]).unwrap();
        assert_eq!(args, json!({"input": {"int_list": [68, 104, 97]}}));
    }

    #[test]
    fn quoted_value_stays_string() {
        let args = parse_tokens(&["text=\"12345.67\""]).unwrap();
        assert_eq!(args, json!({"text": "12345.67"}));
    }

    #[test]
    fn last_token_wins_on_collision() {
        let args = parse_tokens(&["a.b=1", "a.b=2"]).unwrap();
        assert_eq!(args, json!({"a": {"b": 2}}));
    }

    #[test]
    fn scalar_at_intermediate_path_is_replaced() {
        let args = parse_tokens(&["a=1", "a.b=2"]).unwrap();
        assert_eq!(args, json!({"a": {"b": 2}}));
    }

    #[test]
    fn missing_equals_fails() {
        let err = parse_tokens(&["x=1", "broken"]).unwrap_err();
        assert!(matches!(err, ParamError::MissingEquals(ref t) if t == "broken"));
    }

    #[test]
    fn reparsing_is_idempotent() {
        let tokens = ["a.b.c=[1,2]", "a.d=x"];
        assert_eq!(parse_tokens(&tokens).unwrap(), parse_tokens(&tokens).unwrap());
    }
}
