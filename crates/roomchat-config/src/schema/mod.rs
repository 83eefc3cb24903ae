//! Configuration schema types for roomchat.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod backend;
mod realtime;
mod system;
mod ui;

pub use backend::*;
pub use realtime::*;
pub use system::*;
pub use ui::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for roomchat.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RoomchatConfig {
    pub backend: BackendConfig,
    pub realtime: RealtimeSettings,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}
