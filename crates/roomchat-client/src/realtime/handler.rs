//! Incoming frame handler: response routing, data pushes and control
//! messages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use super::cache::ListenRegistry;
use super::types::{Envelope, RealtimeEvent, Reply};
use crate::error::StoreError;
use crate::store::StorePath;

/// What a request id is waiting on.
pub(crate) enum Pending {
    Request(Reply),
    Listen {
        id: u64,
        reply: Option<oneshot::Sender<Result<u64, StoreError>>>,
    },
    /// Fire-and-forget (unlisten, re-listen, re-auth after reconnect).
    Ignore,
}

pub(crate) type PendingMap = Arc<Mutex<HashMap<u64, Pending>>>;

/// What the connection loop should do after a frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Continue,
    /// Reconnect to another host.
    Redirect(String),
    /// The server asked us to stop; do not reconnect.
    Shutdown,
}

// ---------------------------------------------------------------------------
// Frame Assembly
// ---------------------------------------------------------------------------

/// Reassembles payloads the server splits across several text frames.
///
/// A frame holding only a small integer announces how many frames
/// follow; their texts concatenate to one envelope.
#[derive(Debug, Default)]
pub(crate) struct FrameAssembler {
    remaining: usize,
    buffer: String,
}

impl FrameAssembler {
    /// Feed one text frame; returns a complete payload when one is ready.
    pub(crate) fn push(&mut self, text: &str) -> Option<String> {
        if self.remaining > 0 {
            self.buffer.push_str(text);
            self.remaining -= 1;
            return (self.remaining == 0).then(|| std::mem::take(&mut self.buffer));
        }
        if text.len() <= 6 {
            if let Ok(count) = text.trim().parse::<usize>() {
                if count > 0 {
                    self.remaining = count;
                    self.buffer.clear();
                }
                return None;
            }
        }
        Some(text.to_string())
    }
}

// ---------------------------------------------------------------------------
// Message Handler
// ---------------------------------------------------------------------------

/// Handle one incoming envelope.
pub(crate) async fn handle_envelope(
    env: &Envelope,
    pending: &PendingMap,
    registry: &Arc<Mutex<ListenRegistry>>,
    server_offset: &AtomicI64,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) -> Outcome {
    if let Some(id) = env.response_id() {
        handle_response(id, env.body(), pending, registry).await;
        return Outcome::Continue;
    }
    if let Some(action) = env.push_action() {
        handle_push(action, env.body(), registry, event_tx).await;
        return Outcome::Continue;
    }
    match env.control_type() {
        Some(kind) => handle_control(kind, env.control_data(), server_offset, event_tx).await,
        None => {
            debug!(frame = ?env, "Unrecognized frame");
            Outcome::Continue
        }
    }
}

async fn handle_response(
    id: u64,
    body: &Value,
    pending: &PendingMap,
    registry: &Arc<Mutex<ListenRegistry>>,
) {
    let Some(waiter) = pending.lock().await.remove(&id) else {
        debug!(id, "Response for unknown request");
        return;
    };
    let status = body.get("s").and_then(Value::as_str).unwrap_or("");
    let result = if status == "ok" {
        Ok(body.get("d").cloned().unwrap_or(Value::Null))
    } else {
        let detail = body.get("d").and_then(Value::as_str).unwrap_or("");
        Err(StoreError::Rejected(if detail.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {detail}")
        }))
    };

    match waiter {
        Pending::Request(reply) => {
            let _ = reply.send(result);
        }
        Pending::Listen { id: listen_id, reply } => {
            let mut registry = registry.lock().await;
            let outcome = match result {
                Ok(_) => {
                    registry.complete(listen_id);
                    Ok(listen_id)
                }
                Err(e) => {
                    warn!(error = %e, "Listen rejected");
                    if let Some(listen) = registry.remove(listen_id) {
                        listen.token.cancel();
                    }
                    Err(e)
                }
            };
            if let Some(reply) = reply {
                let _ = reply.send(outcome);
            }
        }
        Pending::Ignore => {
            if let Err(e) = result {
                debug!(id, error = %e, "Background request failed");
            }
        }
    }
}

async fn handle_push(
    action: &str,
    body: &Value,
    registry: &Arc<Mutex<ListenRegistry>>,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) {
    let path = StorePath::parse(body.get("p").and_then(Value::as_str).unwrap_or(""));
    let tag = body.get("t").and_then(Value::as_u64);
    let data = body.get("d").unwrap_or(&Value::Null);

    match action {
        "d" => registry.lock().await.apply_put(&path, data, tag),
        "m" => match data.as_object() {
            Some(children) => registry.lock().await.apply_merge(&path, children, tag),
            None => warn!(path = %path, "Merge push without object payload"),
        },
        "c" => {
            warn!(path = %path, "Listen revoked by server");
            {
                let mut registry = registry.lock().await;
                let revoked: Vec<u64> = registry
                    .iter()
                    .filter(|(_, l)| l.path == path)
                    .map(|(id, _)| id)
                    .collect();
                for id in revoked {
                    if let Some(listen) = registry.remove(id) {
                        listen.token.cancel();
                    }
                }
            }
            let _ = event_tx
                .send(RealtimeEvent::ListenRevoked {
                    path: path.to_string(),
                })
                .await;
        }
        "ac" | "apc" => {
            let reason = data.as_str().unwrap_or("credential revoked").to_string();
            warn!(reason = %reason, "Auth revoked by server");
            let _ = event_tx.send(RealtimeEvent::Error(reason)).await;
        }
        "sd" => debug!(message = %data, "Server debug message"),
        other => debug!(action = %other, "Unhandled push action"),
    }
}

async fn handle_control(
    kind: &str,
    data: &Value,
    server_offset: &AtomicI64,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) -> Outcome {
    match kind {
        "h" => {
            let server_time_ms = data.get("ts").and_then(Value::as_i64);
            if let Some(ts) = server_time_ms {
                let offset = ts - chrono::Utc::now().timestamp_millis();
                server_offset.store(offset, Ordering::Relaxed);
            }
            let host = data.get("h").and_then(Value::as_str).unwrap_or("");
            info!(host = %host, "Realtime handshake complete");
            let _ = event_tx
                .send(RealtimeEvent::Connected { server_time_ms })
                .await;
            Outcome::Continue
        }
        "r" => {
            let host = data.as_str().unwrap_or("").to_string();
            if host.is_empty() {
                warn!("Redirect without host");
                return Outcome::Continue;
            }
            info!(host = %host, "Redirected by server");
            let _ = event_tx
                .send(RealtimeEvent::Redirected { host: host.clone() })
                .await;
            Outcome::Redirect(host)
        }
        "s" => {
            let reason = data.as_str().unwrap_or("server shutdown").to_string();
            warn!(reason = %reason, "Server closed the connection");
            let _ = event_tx.send(RealtimeEvent::Error(reason)).await;
            Outcome::Shutdown
        }
        "e" => {
            let message = data.as_str().map(str::to_string).unwrap_or_else(|| data.to_string());
            warn!(error = %message, "Server error");
            let _ = event_tx.send(RealtimeEvent::Error(message)).await;
            Outcome::Continue
        }
        other => {
            debug!(kind = %other, "Unhandled control message");
            Outcome::Continue
        }
    }
}
