//! Configuration, wire envelope, and event/command enums for the realtime
//! database connection.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::store::{Query, StorePath};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Database host, e.g. `my-project.example-db.com`. A full `ws://` or
    /// `wss://` URL is used verbatim, which is how local emulators are
    /// reached.
    pub host: String,
    /// Database namespace (`ns` query parameter).
    pub namespace: String,
    pub heartbeat_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_delay_secs: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            namespace: String::new(),
            heartbeat_interval_secs: 45,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
            connect_timeout_secs: 15,
            request_timeout_secs: 20,
        }
    }
}

impl RealtimeConfig {
    /// WebSocket URL for `host` (which may differ from the configured host
    /// after a server redirect).
    pub(crate) fn ws_url_for(&self, host: &str) -> String {
        if host.starts_with("ws://") || host.starts_with("wss://") {
            return host.to_string();
        }
        format!("wss://{}/.ws?v=5&ns={}", host, self.namespace)
    }
}

// ---------------------------------------------------------------------------
// Wire Envelope
// ---------------------------------------------------------------------------

/// Outer frame: `t` is `"d"` for data messages and `"c"` for control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub t: String,
    pub d: Value,
}

impl Envelope {
    pub fn request(id: u64, action: &str, body: Value) -> Self {
        Self {
            t: "d".to_string(),
            d: json!({ "r": id, "a": action, "b": body }),
        }
    }

    /// Request ids are only present on responses.
    pub fn response_id(&self) -> Option<u64> {
        (self.t == "d").then(|| self.d.get("r")?.as_u64()).flatten()
    }

    /// Server push action (`d`, `m`, ...), if this is a push.
    pub fn push_action(&self) -> Option<&str> {
        if self.t != "d" || self.d.get("r").is_some() {
            return None;
        }
        self.d.get("a")?.as_str()
    }

    pub fn body(&self) -> &Value {
        self.d.get("b").unwrap_or(&Value::Null)
    }

    /// Control message type (`h`, `r`, `s`, `e`, ...).
    pub fn control_type(&self) -> Option<&str> {
        if self.t != "c" {
            return None;
        }
        self.d.get("t")?.as_str()
    }

    pub fn control_data(&self) -> &Value {
        self.d.get("d").unwrap_or(&Value::Null)
    }
}

/// Body of a `q` (listen) request.
pub(crate) fn listen_body(path: &StorePath, query: &Query, tag: u64) -> Value {
    let mut body = json!({ "p": path.to_wire(), "h": "" });
    if !query.is_default() {
        body["q"] = query.to_wire();
        body["t"] = json!(tag);
    }
    body
}

/// Body of an `n` (unlisten) request.
pub(crate) fn unlisten_body(path: &StorePath, query: &Query, tag: u64) -> Value {
    let mut body = json!({ "p": path.to_wire() });
    if !query.is_default() {
        body["q"] = query.to_wire();
        body["t"] = json!(tag);
    }
    body
}

// ---------------------------------------------------------------------------
// Events & Commands
// ---------------------------------------------------------------------------

/// Connection-level events for observers of the realtime client.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// Handshake completed.
    Connected { server_time_ms: Option<i64> },
    /// Socket lost; the client keeps retrying with backoff.
    Disconnected,
    /// The server moved this namespace to another host.
    Redirected { host: String },
    /// A listen was revoked by the server (usually access rules).
    ListenRevoked { path: String },
    Error(String),
}

pub(crate) type Reply = oneshot::Sender<Result<Value, StoreError>>;

/// Commands sent to the connection task.
pub(crate) enum RealtimeCommand {
    Request {
        action: &'static str,
        body: Value,
        reply: Reply,
    },
    Listen {
        path: StorePath,
        query: Query,
        sink: mpsc::UnboundedSender<Value>,
        token: CancellationToken,
        reply: oneshot::Sender<Result<u64, StoreError>>,
    },
    Unlisten {
        id: u64,
    },
    Authenticate {
        token: String,
        reply: Reply,
    },
    Disconnect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_uses_host_and_namespace() {
        let config = RealtimeConfig {
            host: "chat-demo.example-db.com".into(),
            namespace: "chat-demo".into(),
            ..Default::default()
        };
        assert_eq!(
            config.ws_url_for(&config.host),
            "wss://chat-demo.example-db.com/.ws?v=5&ns=chat-demo"
        );
        assert_eq!(
            config.ws_url_for("ws://127.0.0.1:9000/.ws?ns=x"),
            "ws://127.0.0.1:9000/.ws?ns=x"
        );
    }

    #[test]
    fn request_serialises_to_wire_shape() {
        let env = Envelope::request(7, "g", json!({"p": "/rooms/a/metadata", "q": {}}));
        let text = serde_json::to_value(&env).unwrap();
        assert_eq!(
            text,
            json!({"t": "d", "d": {"r": 7, "a": "g", "b": {"p": "/rooms/a/metadata", "q": {}}}})
        );
    }

    #[test]
    fn classifies_incoming_frames() {
        let response: Envelope =
            serde_json::from_str(r#"{"t":"d","d":{"r":3,"b":{"s":"ok","d":null}}}"#).unwrap();
        assert_eq!(response.response_id(), Some(3));
        assert_eq!(response.push_action(), None);
        assert_eq!(response.body()["s"], "ok");

        let push: Envelope =
            serde_json::from_str(r#"{"t":"d","d":{"a":"d","b":{"p":"rooms/a","d":1}}}"#).unwrap();
        assert_eq!(push.response_id(), None);
        assert_eq!(push.push_action(), Some("d"));

        let control: Envelope = serde_json::from_str(
            r#"{"t":"c","d":{"t":"h","d":{"ts":1700000000000,"v":"5","h":"s1.example-db.com","s":"abc"}}}"#,
        )
        .unwrap();
        assert_eq!(control.control_type(), Some("h"));
        assert_eq!(control.control_data()["ts"], 1_700_000_000_000_i64);
    }

    #[test]
    fn listen_body_tags_only_non_default_queries() {
        let path = StorePath::parse("rooms/a/presence");
        assert_eq!(
            listen_body(&path, &Query::all(), 4),
            json!({"p": "/rooms/a/presence", "h": ""})
        );

        let query = Query::all().order_by_child("timestamp").limit_to_last(100);
        let body = listen_body(&StorePath::parse("rooms/a/messages"), &query, 5);
        assert_eq!(body["t"], 5);
        assert_eq!(body["q"], json!({"i": "timestamp", "l": 100, "vf": "r"}));
        assert_eq!(unlisten_body(&path, &Query::all(), 4), json!({"p": "/rooms/a/presence"}));
    }
}
