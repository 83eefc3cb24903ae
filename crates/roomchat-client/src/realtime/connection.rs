//! Background WebSocket connection loop with auto-reconnect.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::cache::ListenRegistry;
use super::handler::{handle_envelope, FrameAssembler, Outcome, Pending, PendingMap};
use super::types::{listen_body, unlisten_body, Envelope, RealtimeCommand, RealtimeConfig, RealtimeEvent};
use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Request Ids
// ---------------------------------------------------------------------------

/// Monotonically increasing request id shared by all connections.
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_request_id() -> u64 {
    REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// State that outlives a single socket.
pub(crate) struct Shared {
    pub(crate) connected: Arc<RwLock<bool>>,
    pub(crate) server_offset: Arc<AtomicI64>,
    pub(crate) registry: Arc<Mutex<ListenRegistry>>,
    pub(crate) pending: PendingMap,
    /// Credential re-sent after every reconnect.
    pub(crate) auth_token: Arc<RwLock<Option<String>>>,
    pub(crate) shutdown: CancellationToken,
}

type Writer = Arc<
    Mutex<
        futures_util::stream::SplitSink<
            tokio_tungstenite::WebSocketStream<
                tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
            >,
            WsMessage,
        >,
    >,
>;

async fn send_envelope<S>(writer: &Arc<Mutex<S>>, env: &Envelope) -> bool
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    match serde_json::to_string(env) {
        Ok(json) => writer.lock().await.send(WsMessage::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to encode frame");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Background task managing the WebSocket connection with auto-reconnect.
pub(crate) async fn connection_loop(
    config: RealtimeConfig,
    shared: Shared,
    event_tx: mpsc::Sender<RealtimeEvent>,
    command_rx: mpsc::Receiver<RealtimeCommand>,
) {
    let command_rx = Arc::new(Mutex::new(command_rx));
    let mut host = config.host.clone();
    let mut reconnect_delay = config.reconnect_delay_secs;

    loop {
        let url = config.ws_url_for(&host);
        info!(url = %url.split('?').next().unwrap_or(""), "Connecting to realtime database");

        let attempt = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            attempt = tokio::time::timeout(
                Duration::from_secs(config.connect_timeout_secs),
                tokio_tungstenite::connect_async(&url),
            ) => attempt,
        };

        match attempt {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = config.reconnect_delay_secs;
                *shared.connected.write().await = true;

                let (ws_write, mut ws_read) = ws_stream.split();
                let ws_write: Writer = Arc::new(Mutex::new(ws_write));

                restore_session(&ws_write, &shared).await;

                let heartbeat_handle = tokio::spawn(heartbeat_task(
                    Arc::clone(&ws_write),
                    config.heartbeat_interval_secs,
                ));
                let cmd_handle = tokio::spawn(command_forwarder(
                    Arc::clone(&command_rx),
                    Arc::clone(&ws_write),
                    Arc::clone(&shared.registry),
                    Arc::clone(&shared.pending),
                    Arc::clone(&shared.auth_token),
                    shared.shutdown.clone(),
                ));

                let mut assembler = FrameAssembler::default();
                let mut outcome = Outcome::Continue;
                loop {
                    let msg_result = tokio::select! {
                        _ = shared.shutdown.cancelled() => break,
                        next = ws_read.next() => match next {
                            Some(result) => result,
                            None => break,
                        },
                    };
                    match msg_result {
                        Ok(WsMessage::Text(text)) => {
                            let Some(payload) = assembler.push(&text) else {
                                continue;
                            };
                            match serde_json::from_str::<Envelope>(&payload) {
                                Ok(env) => {
                                    outcome = handle_envelope(
                                        &env,
                                        &shared.pending,
                                        &shared.registry,
                                        &shared.server_offset,
                                        &event_tx,
                                    )
                                    .await;
                                    if outcome != Outcome::Continue {
                                        break;
                                    }
                                }
                                Err(_) => {
                                    debug!(text = %payload, "Unrecognized message from server");
                                }
                            }
                        }
                        Ok(WsMessage::Close(_)) => {
                            info!("Realtime database closed connection");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                        _ => {}
                    }
                }

                // Cleanup.
                heartbeat_handle.abort();
                cmd_handle.abort();
                *shared.connected.write().await = false;
                fail_pending(&shared.pending).await;
                let _ = event_tx.send(RealtimeEvent::Disconnected).await;

                match outcome {
                    Outcome::Redirect(new_host) => {
                        host = new_host;
                        continue;
                    }
                    Outcome::Shutdown => shared.shutdown.cancel(),
                    Outcome::Continue => {}
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to realtime database");
                let _ = event_tx
                    .send(RealtimeEvent::Error(format!("Connection failed: {e}")))
                    .await;
            }
            Err(_elapsed) => {
                error!(
                    timeout = config.connect_timeout_secs,
                    "WebSocket connection timed out"
                );
                let _ = event_tx
                    .send(RealtimeEvent::Error(format!(
                        "Connection timed out after {}s",
                        config.connect_timeout_secs
                    )))
                    .await;
            }
        }

        if shared.shutdown.is_cancelled() {
            break;
        }

        // Exponential backoff reconnect.
        info!(delay_secs = reconnect_delay, "Reconnecting");
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(reconnect_delay)) => {}
        }
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay_secs);
    }

    shared.registry.lock().await.close_all();
    fail_pending(&shared.pending).await;
    info!("Realtime connection loop stopped");
}

/// Re-authenticate and re-listen after (re)connecting.
async fn restore_session(ws_write: &Writer, shared: &Shared) {
    if let Some(token) = shared.auth_token.read().await.clone() {
        let id = next_request_id();
        shared.pending.lock().await.insert(id, Pending::Ignore);
        send_envelope(ws_write, &Envelope::request(id, "auth", serde_json::json!({ "cred": token })))
            .await;
    }

    let registry = shared.registry.lock().await;
    for (listen_id, listen) in registry.iter() {
        let id = next_request_id();
        shared.pending.lock().await.insert(
            id,
            Pending::Listen {
                id: listen_id,
                reply: None,
            },
        );
        let body = listen_body(&listen.path, &listen.query, listen_id);
        send_envelope(ws_write, &Envelope::request(id, "q", body)).await;
    }
    if registry.len() > 0 {
        debug!(listens = registry.len(), "Restored listens");
    }
}

/// Requests in flight when the socket dropped will never be answered.
async fn fail_pending(pending: &PendingMap) {
    for (_, waiter) in pending.lock().await.drain() {
        match waiter {
            Pending::Request(reply) => {
                let _ = reply.send(Err(StoreError::Disconnected));
            }
            Pending::Listen {
                reply: Some(reply), ..
            } => {
                let _ = reply.send(Err(StoreError::Disconnected));
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

/// Keep-alive: a bare `0` text frame.
async fn heartbeat_task<S>(ws_write: Arc<Mutex<S>>, interval_secs: u64)
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let period = Duration::from_secs(interval_secs);
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        interval.tick().await;
        let mut writer = ws_write.lock().await;
        if writer.send(WsMessage::Text(String::from("0").into())).await.is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Command Forwarder
// ---------------------------------------------------------------------------

async fn command_forwarder<S>(
    cmd_rx: Arc<Mutex<mpsc::Receiver<RealtimeCommand>>>,
    cmd_write: Arc<Mutex<S>>,
    registry: Arc<Mutex<ListenRegistry>>,
    pending: PendingMap,
    auth_token: Arc<RwLock<Option<String>>>,
    shutdown: CancellationToken,
) where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let mut rx = cmd_rx.lock().await;
    loop {
        let Some(cmd) = rx.recv().await else {
            // Every client handle is gone.
            shutdown.cancel();
            let _ = cmd_write.lock().await.send(WsMessage::Close(None)).await;
            return;
        };

        let dropped = registry.lock().await.take_cancelled();
        for (listen_id, listen) in dropped {
            let id = next_request_id();
            pending.lock().await.insert(id, Pending::Ignore);
            let body = unlisten_body(&listen.path, &listen.query, listen_id);
            send_envelope(&cmd_write, &Envelope::request(id, "n", body)).await;
        }

        match cmd {
            RealtimeCommand::Request {
                action,
                body,
                reply,
            } => {
                let id = next_request_id();
                pending.lock().await.insert(id, Pending::Request(reply));
                if !send_envelope(&cmd_write, &Envelope::request(id, action, body)).await {
                    if let Some(Pending::Request(reply)) = pending.lock().await.remove(&id) {
                        let _ = reply.send(Err(StoreError::Disconnected));
                    }
                }
            }
            RealtimeCommand::Listen {
                path,
                query,
                sink,
                token,
                reply,
            } => {
                let listen_id = registry
                    .lock()
                    .await
                    .register(path.clone(), query.clone(), sink, token);
                let id = next_request_id();
                pending.lock().await.insert(
                    id,
                    Pending::Listen {
                        id: listen_id,
                        reply: Some(reply),
                    },
                );
                let body = listen_body(&path, &query, listen_id);
                send_envelope(&cmd_write, &Envelope::request(id, "q", body)).await;
            }
            RealtimeCommand::Unlisten { id: listen_id } => {
                let removed = registry.lock().await.remove(listen_id);
                if let Some(listen) = removed {
                    listen.token.cancel();
                    let id = next_request_id();
                    pending.lock().await.insert(id, Pending::Ignore);
                    let body = unlisten_body(&listen.path, &listen.query, listen_id);
                    send_envelope(&cmd_write, &Envelope::request(id, "n", body)).await;
                }
            }
            RealtimeCommand::Authenticate { token, reply } => {
                *auth_token.write().await = Some(token.clone());
                let id = next_request_id();
                pending.lock().await.insert(id, Pending::Request(reply));
                send_envelope(
                    &cmd_write,
                    &Envelope::request(id, "auth", serde_json::json!({ "cred": token })),
                )
                .await;
            }
            RealtimeCommand::Disconnect => {
                shutdown.cancel();
                let mut writer = cmd_write.lock().await;
                let _ = writer.send(WsMessage::Close(None)).await;
                return;
            }
        }
    }
}
