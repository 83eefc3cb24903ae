//! Server-assigned value placeholders.

use serde_json::{json, Value};

/// Placeholder the backend replaces with its own clock (epoch millis) at
/// write time.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

fn is_timestamp_placeholder(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|o| o.len() == 1 && o.get(".sv").and_then(Value::as_str) == Some("timestamp"))
}

/// Replace every timestamp placeholder inside `value` with `now_ms`.
pub fn resolve_server_values(value: &mut Value, now_ms: i64) {
    if is_timestamp_placeholder(value) {
        *value = json!(now_ms);
        return;
    }
    match value {
        Value::Object(map) => map
            .values_mut()
            .for_each(|v| resolve_server_values(v, now_ms)),
        Value::Array(items) => items
            .iter_mut()
            .for_each(|v| resolve_server_values(v, now_ms)),
        _ => {}
    }
}
