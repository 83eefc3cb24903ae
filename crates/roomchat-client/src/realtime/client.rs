//! Public handle for interacting with the realtime database connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::cache::ListenRegistry;
use super::connection::{connection_loop, Shared};
use super::types::{RealtimeCommand, RealtimeConfig, RealtimeEvent};
use crate::error::StoreError;
use crate::store::{Query, StorePath};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle for interacting with the realtime database connection.
///
/// Requests are queued to the background connection task and answered
/// through a oneshot; each waits at most `request_timeout_secs`.
pub struct RealtimeClient {
    command_tx: mpsc::Sender<RealtimeCommand>,
    connected: Arc<RwLock<bool>>,
    server_offset: Arc<AtomicI64>,
    request_timeout: Duration,
}

impl RealtimeClient {
    /// Create a new client and start the background connection.
    /// Returns `(client, event_receiver)`.
    pub fn connect(config: RealtimeConfig) -> (Self, mpsc::Receiver<RealtimeEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (command_tx, command_rx) = mpsc::channel(64);

        let shared = Shared {
            connected: Arc::new(RwLock::new(false)),
            server_offset: Arc::new(AtomicI64::new(0)),
            registry: Arc::new(Mutex::new(ListenRegistry::default())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            auth_token: Arc::new(RwLock::new(None)),
            shutdown: CancellationToken::new(),
        };

        let client = Self {
            command_tx,
            connected: Arc::clone(&shared.connected),
            server_offset: Arc::clone(&shared.server_offset),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        };

        tokio::spawn(connection_loop(config, shared, event_tx, command_rx));

        (client, event_rx)
    }

    /// Send one request and wait for its response payload.
    pub(crate) async fn request(
        &self,
        action: &'static str,
        body: Value,
    ) -> Result<Value, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(RealtimeCommand::Request {
            action,
            body,
            reply,
        })
        .await?;
        self.await_reply(rx).await?
    }

    /// Start listening at `path`; snapshots arrive on `sink` until `token`
    /// is cancelled. Returns the listen id.
    pub(crate) async fn listen(
        &self,
        path: StorePath,
        query: Query,
        sink: mpsc::UnboundedSender<Value>,
        token: CancellationToken,
    ) -> Result<u64, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(RealtimeCommand::Listen {
            path,
            query,
            sink,
            token,
            reply,
        })
        .await?;
        self.await_reply(rx).await?
    }

    pub(crate) async fn unlisten(&self, id: u64) {
        let _ = self.command_tx.send(RealtimeCommand::Unlisten { id }).await;
    }

    /// Present an ID token. It is re-sent automatically after reconnects.
    pub async fn authenticate(&self, token: &str) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(RealtimeCommand::Authenticate {
            token: token.to_string(),
            reply,
        })
        .await?;
        self.await_reply(rx).await?.map(|_| ())
    }

    /// Current time on the server's clock, from the handshake offset.
    pub fn server_time_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis() + self.server_offset.load(Ordering::Relaxed)
    }

    /// Check if connected.
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    /// Disconnect from the server and stop reconnecting.
    pub async fn disconnect(&self) {
        let _ = self.command_tx.send(RealtimeCommand::Disconnect).await;
    }

    async fn send(&self, command: RealtimeCommand) -> Result<(), StoreError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| StoreError::Disconnected)
    }

    async fn await_reply<T>(&self, rx: oneshot::Receiver<T>) -> Result<T, StoreError> {
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(StoreError::Disconnected),
            Err(_) => Err(StoreError::Timeout(self.request_timeout.as_secs())),
        }
    }
}
