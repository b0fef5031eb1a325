//! Argument validation against a tool's `inputSchema`.
//!
//! Only the subset of JSON Schema the catalogue uses is checked: `required`,
//! and the primitive `type` of each declared property (including array item
//! types). `null` counts as absent. Undeclared properties are ignored.

use serde_json::{Map, Value};

/// Checks `args` against `schema`.
///
/// # Errors
///
/// Returns a message naming the first offending property.
pub fn validate(schema: &Value, args: &Map<String, Value>) -> Result<(), String> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if args.get(name).map_or(true, Value::is_null) {
                return Err(format!("Missing required parameter: {name}"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, property) in properties {
        match args.get(name) {
            None | Some(Value::Null) => {}
            Some(value) => check_type(name, value, property)?,
        }
    }

    Ok(())
}

fn check_type(path: &str, value: &Value, schema: &Value) -> Result<(), String> {
    let Some(expected) = schema.get("type").and_then(Value::as_str) else {
        return Ok(());
    };

    let matches = match expected {
        "string" => value.is_string(),
        "integer" => is_integer(value),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => {
            let Some(items) = value.as_array() else {
                return Err(mismatch(path, expected, value));
            };
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check_type(&format!("{path}[{i}]"), item, item_schema)?;
                }
            }
            true
        }
        _ => true,
    };

    if matches {
        Ok(())
    } else {
        Err(mismatch(path, expected, value))
    }
}

/// Integers, including floats with no fractional part (`5.0`).
fn is_integer(value: &Value) -> bool {
    value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn mismatch(path: &str, expected: &str, value: &Value) -> String {
    format!(
        "Invalid parameter '{path}': expected {expected}, got {}",
        type_name(value)
    )
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
