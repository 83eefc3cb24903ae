//! Builds the store and identity provider a client runs against.

use std::sync::Arc;

use roomchat_client::{
    AnonymousAuth, AnonymousAuthConfig, IdentityProvider, LocalIdentityProvider, MemoryDatabase,
    RealtimeConfig, RealtimeStore, RoomStore,
};
use roomchat_common::RoomchatError;
use roomchat_config::RoomchatConfig;
use tracing::info;

/// One connection's worth of backend. Rebuilt on every reload.
pub struct Backend {
    store: Arc<dyn RoomStore>,
    identity: Arc<dyn IdentityProvider>,
    realtime: Option<Arc<RealtimeStore>>,
}

impl Backend {
    pub fn start(
        config: &RoomchatConfig,
        offline: bool,
        memory: &MemoryDatabase,
    ) -> Result<Self, RoomchatError> {
        if offline {
            Ok(Self::offline(memory))
        } else {
            Self::realtime(config)
        }
    }

    /// A fresh connection to the in-process database.
    pub fn offline(memory: &MemoryDatabase) -> Self {
        let store = memory.connect();
        info!(connection = store.connection_id(), "Using in-process store");
        Self {
            store: Arc::new(store),
            identity: Arc::new(LocalIdentityProvider),
            realtime: None,
        }
    }

    pub fn realtime(config: &RoomchatConfig) -> Result<Self, RoomchatError> {
        let backend = &config.backend;
        if backend.database_host.is_empty() {
            return Err(RoomchatError::Backend(
                "backend.database_host is not set (use --offline for a local session)".into(),
            ));
        }
        let identity = AnonymousAuth::new(AnonymousAuthConfig {
            endpoint: backend.identity_endpoint.clone(),
            api_key: backend.api_key.clone(),
            timeout_secs: u64::from(config.realtime.request_timeout),
        })
        .map_err(|e| RoomchatError::Backend(e.to_string()))?;

        let settings = &config.realtime;
        let store = Arc::new(RealtimeStore::connect(RealtimeConfig {
            host: backend.database_host.clone(),
            namespace: backend.resolved_namespace().to_string(),
            heartbeat_interval_secs: u64::from(settings.heartbeat_interval),
            reconnect_delay_secs: u64::from(settings.reconnect_delay),
            max_reconnect_delay_secs: u64::from(settings.max_reconnect_delay),
            connect_timeout_secs: u64::from(settings.connect_timeout),
            request_timeout_secs: u64::from(settings.request_timeout),
        }));
        info!(host = %backend.database_host, "Using realtime store");

        Ok(Self {
            store: Arc::clone(&store) as Arc<dyn RoomStore>,
            identity: Arc::new(identity),
            realtime: Some(store),
        })
    }

    pub fn store(&self) -> Arc<dyn RoomStore> {
        Arc::clone(&self.store)
    }

    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.identity)
    }

    /// Close the connection; the backend then runs its disconnect hooks.
    pub async fn shutdown(self) {
        if let Some(realtime) = &self.realtime {
            realtime.shutdown().await;
        }
    }
}
