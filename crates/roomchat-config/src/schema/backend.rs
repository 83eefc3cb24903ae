//! Backend connection settings: which store to use and how to reach it.

use serde::{Deserialize, Serialize};

/// Which Room Store implementation the client talks to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process store; nothing leaves this process.
    Memory,
    /// Hosted realtime database over WebSocket.
    #[default]
    Realtime,
}

/// Backend configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Database host, e.g. `my-chat-default-rtdb.firebaseio.com`.
    pub database_host: String,
    /// Database namespace. Empty means "first label of `database_host`".
    pub namespace: String,
    /// Public (publishable) web API key used for anonymous sign-up.
    pub api_key: String,
    /// Base URL of the identity REST API.
    pub identity_endpoint: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("database_host", &self.database_host)
            .field("namespace", &self.namespace)
            .field("api_key", &"[REDACTED]")
            .field("identity_endpoint", &self.identity_endpoint)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Realtime,
            database_host: String::new(),
            namespace: String::new(),
            api_key: String::new(),
            identity_endpoint: "https://identitytoolkit.googleapis.com".into(),
        }
    }
}

impl BackendConfig {
    /// The namespace to address, falling back to the host's first label.
    pub fn resolved_namespace(&self) -> &str {
        if !self.namespace.is_empty() {
            return &self.namespace;
        }
        self.database_host
            .split('.')
            .next()
            .unwrap_or(&self.database_host)
    }
}
