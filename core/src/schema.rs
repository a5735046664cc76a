//! A small JSON Schema subset used for tool inputs and step outputs.
//!
//! Supported keywords: `type` (string or array of strings), `properties`,
//! `required`, `additionalProperties: false`, `items`, `enum`, `minimum`
//! and `maximum`. Unknown keywords are ignored.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: if path.is_empty() { "$".to_string() } else { path.to_string() },
            message: message.into(),
        }
    }
}

pub fn validate(schema: &Value, value: &Value) -> Result<(), SchemaError> {
    validate_at(schema, value, "")
}

fn validate_at(schema: &Value, value: &Value, path: &str) -> Result<(), SchemaError> {
    let Some(schema) = schema.as_object() else {
        // `true` / `{}`-like schemas accept anything.
        return Ok(());
    };

    if let Some(expected) = schema.get("type") {
        check_type(expected, value, path)?;
    }

    if let Some(Value::Array(allowed)) = schema.get("enum")
        && !allowed.contains(value)
    {
        return Err(SchemaError::new(
            path,
            format!("value {} is not one of {}", value, Value::Array(allowed.clone())),
        ));
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64)
            && n < min
        {
            return Err(SchemaError::new(path, format!("{n} is below minimum {min}")));
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64)
            && n > max
        {
            return Err(SchemaError::new(path, format!("{n} is above maximum {max}")));
        }
    }

    match value {
        Value::Object(fields) => check_object(schema, fields, path),
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    validate_at(item_schema, item, &format!("{path}/{i}"))?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_object(
    schema: &Map<String, Value>,
    fields: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaError> {
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            if !fields.contains_key(key) {
                return Err(SchemaError::new(path, format!("missing required field '{key}'")));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, field) in fields {
        match properties.and_then(|p| p.get(key)) {
            Some(field_schema) => validate_at(field_schema, field, &format!("{path}/{key}"))?,
            None if closed => {
                return Err(SchemaError::new(path, format!("unexpected field '{key}'")));
            }
            None => {}
        }
    }

    Ok(())
}

fn check_type(expected: &Value, value: &Value, path: &str) -> Result<(), SchemaError> {
    let matches = match expected {
        Value::String(name) => type_matches(name, value),
        Value::Array(names) => names
            .iter()
            .filter_map(Value::as_str)
            .any(|name| type_matches(name, value)),
        _ => true,
    };

    if matches {
        Ok(())
    } else {
        Err(SchemaError::new(
            path,
            format!("expected type {}, got {}", expected, type_name(value)),
        ))
    }
}

fn type_matches(name: &str, value: &Value) -> bool {
    match name {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        // 2.0 is an integer; 2.5 is not
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        _ => true,
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "age": {"type": "integer", "minimum": 0},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name"],
            "additionalProperties": false
        })
    }

    #[test]
    fn accepts_valid_object() {
        let value = json!({"name": "ada", "age": 36, "tags": ["math"]});
        assert!(validate(&person(), &value).is_ok());
    }

    #[test]
    fn reports_missing_required_field() {
        let err = validate(&person(), &json!({"age": 3})).unwrap_err();
        assert_eq!(err.path, "$");
        assert!(err.message.contains("'name'"));
    }

    #[test]
    fn rejects_unexpected_field_when_closed() {
        let err = validate(&person(), &json!({"name": "x", "extra": 1})).unwrap_err();
        assert!(err.message.contains("unexpected field 'extra'"));
    }

    #[test]
    fn reports_nested_path() {
        let err = validate(&person(), &json!({"name": "x", "tags": ["a", 2]})).unwrap_err();
        assert_eq!(err.path, "/tags/1");
        assert_eq!(err.to_string(), "/tags/1: expected type \"string\", got number");
    }

    #[test]
    fn integer_rejects_fractions() {
        let err = validate(&person(), &json!({"name": "x", "age": 1.5})).unwrap_err();
        assert_eq!(err.path, "/age");
    }

    #[test]
    fn integer_accepts_whole_floats() {
        assert!(validate(&json!({"type": "integer"}), &json!(2.0)).is_ok());
        assert!(validate(&json!({"type": "integer"}), &json!(-7.0)).is_ok());
        assert!(validate(&person(), &json!({"name": "x", "age": 36.0})).is_ok());
        assert!(validate(&json!({"type": "integer"}), &json!(2.25)).is_err());
    }

    #[test]
    fn enforces_bounds_and_enum() {
        let schema = json!({"type": "number", "minimum": 0, "maximum": 1});
        assert!(validate(&schema, &json!(0.5)).is_ok());
        assert!(validate(&schema, &json!(1.5)).is_err());

        let schema = json!({"enum": ["a", "b"]});
        assert!(validate(&schema, &json!("a")).is_ok());
        assert!(validate(&schema, &json!("c")).is_err());
    }

    #[test]
    fn type_arrays_allow_null() {
        let schema = json!({"type": ["string", "null"]});
        assert!(validate(&schema, &Value::Null).is_ok());
        assert!(validate(&schema, &json!(3)).is_err());
    }
}
