//! Stored record shapes and the outgoing message builder.

use roomchat_common::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::store::server_timestamp;

pub const MAX_MESSAGE_LEN: usize = 500;

/// A message as stored under `rooms/{room}/messages/{key}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub content: String,
    /// Server time in epoch millis. `None` until the server has assigned it.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Accepts integers, floats and placeholders; anything that is not a
/// number reads as "not yet assigned".
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    })
}

impl ChatMessage {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// The result of preparing user input for sending.
#[derive(Debug, Clone, PartialEq)]
pub enum Prepared {
    /// Nothing to send after trimming.
    Empty,
    Ready(String),
}

/// Trim `input` and enforce the length limit.
pub fn prepare_content(input: &str) -> Result<Prepared, ValidationError> {
    let content = input.trim();
    if content.is_empty() {
        return Ok(Prepared::Empty);
    }
    let len = content.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageTooLong { len });
    }
    Ok(Prepared::Ready(content.to_string()))
}

/// The record written for an outgoing message, with a server timestamp
/// placeholder.
pub fn outgoing_record(content: &str, user_id: &SessionId, color: &str) -> Value {
    serde_json::json!({
        "content": content,
        "timestamp": server_timestamp(),
        "userId": user_id.as_str(),
        "color": color,
    })
}
