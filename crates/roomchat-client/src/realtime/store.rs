//! [`RoomStore`] over the realtime database wire protocol.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::RealtimeClient;
use super::types::{RealtimeConfig, RealtimeEvent};
use crate::error::StoreError;
use crate::identity::Identity;
use crate::store::{PushIdGenerator, Query, RoomStore, StorePath, Subscription};

pub struct RealtimeStore {
    client: Arc<RealtimeClient>,
    push_ids: Mutex<PushIdGenerator>,
}

impl RealtimeStore {
    /// Start the background connection. Connection events are logged.
    pub fn connect(config: RealtimeConfig) -> Self {
        let (client, events) = RealtimeClient::connect(config);
        tokio::spawn(log_events(events));
        Self {
            client: Arc::new(client),
            push_ids: Mutex::new(PushIdGenerator::new()),
        }
    }

    pub fn client(&self) -> &RealtimeClient {
        &self.client
    }

    /// Close the socket and stop reconnecting. The server runs this
    /// connection's disconnect hooks.
    pub async fn shutdown(&self) {
        self.client.disconnect().await;
    }
}

async fn log_events(mut events: mpsc::Receiver<RealtimeEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            RealtimeEvent::Connected { server_time_ms } => {
                debug!(server_time_ms = ?server_time_ms, "Realtime connected");
            }
            RealtimeEvent::Disconnected => warn!("Realtime connection lost"),
            RealtimeEvent::Redirected { host } => info!(host = %host, "Realtime redirected"),
            RealtimeEvent::ListenRevoked { path } => warn!(path = %path, "Listen revoked"),
            RealtimeEvent::Error(message) => warn!(error = %message, "Realtime error"),
        }
    }
}

#[async_trait]
impl RoomStore for RealtimeStore {
    async fn authorize(&self, identity: &Identity) -> Result<(), StoreError> {
        match &identity.id_token {
            Some(token) => self.client.authenticate(token).await,
            None => Ok(()),
        }
    }

    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let data = self
            .client
            .request("g", json!({ "p": path.to_wire(), "q": {} }))
            .await?;
        Ok((!data.is_null()).then_some(data))
    }

    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.client
            .request("p", json!({ "p": path.to_wire(), "d": value }))
            .await
            .map(|_| ())
    }

    async fn push(&self, path: &StorePath, value: Value) -> Result<String, StoreError> {
        let key = self
            .push_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_id(self.client.server_time_ms());
        self.set(&path.child(&key), value).await?;
        Ok(key)
    }

    async fn on_disconnect_remove(&self, path: &StorePath) -> Result<(), StoreError> {
        self.client
            .request("o", json!({ "p": path.to_wire(), "d": null }))
            .await
            .map(|_| ())
    }

    async fn watch(
        &self,
        path: &StorePath,
        query: Query,
    ) -> Result<Subscription<Value>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let id = self
            .client
            .listen(path.clone(), query, tx, token.clone())
            .await?;

        let client = Arc::clone(&self.client);
        let watch_token = token.clone();
        tokio::spawn(async move {
            watch_token.cancelled().await;
            client.unlisten(id).await;
        });

        Ok(Subscription::new(rx, token))
    }
}
