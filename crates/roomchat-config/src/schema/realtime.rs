//! Realtime connection tuning.

use serde::{Deserialize, Serialize};

/// Timing knobs for the realtime WebSocket connection. All values in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Keep-alive interval (valid range: 10-300).
    pub heartbeat_interval: u32,
    /// Base reconnect delay (valid range: 1-60).
    pub reconnect_delay: u32,
    /// Reconnect backoff ceiling (valid range: 1-600).
    pub max_reconnect_delay: u32,
    /// WebSocket handshake timeout (valid range: 1-120).
    pub connect_timeout: u32,
    /// Per-request round-trip timeout (valid range: 1-120).
    pub request_timeout: u32,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: 45,
            reconnect_delay: 1,
            max_reconnect_delay: 30,
            connect_timeout: 15,
            request_timeout: 20,
        }
    }
}
