//! Conversion of server-declared input schemas into the model's dialect.
//!
//! Tool servers declare inputs as full JSON Schema, which carries fields the
//! chat API does not understand. The converter strips those meta-fields at
//! every nesting depth and guarantees the presence of `type` and
//! `properties`, defaulting to an empty object schema.

use serde_json::{json, Value};

/// Meta-fields the model's schema dialect does not accept.
const DISALLOWED_FIELDS: &[&str] = &["$schema", "additionalProperties"];

/// Recursively remove unsupported meta-fields from a schema.
///
/// Applies to nested `properties`, array `items`, and any other embedded
/// object or array. Non-object values pass through unchanged.
pub fn clean_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !DISALLOWED_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), clean_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(clean_schema).collect()),
        other => other.clone(),
    }
}

/// Convert an optional server schema into the model's expected shape.
///
/// The result is always an object schema with `type` and `properties`
/// present; a missing or non-object source collapses to the empty object
/// schema.
pub fn to_model_schema(schema: Option<&Value>) -> Value {
    let empty = || json!({"type": "object", "properties": {}});

    let Some(schema) = schema else {
        return empty();
    };

    let mut cleaned = clean_schema(schema);
    match &mut cleaned {
        Value::Object(map) => {
            if !map.contains_key("properties") {
                map.insert("properties".to_string(), json!({}));
            }
            if !map.contains_key("type") {
                map.insert("type".to_string(), json!("object"));
            }
            cleaned
        }
        _ => empty(),
    }
}
