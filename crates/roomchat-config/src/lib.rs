//! roomchat configuration system.
//!
//! TOML-based configuration with validation. All sections use defaults
//! so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use roomchat_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    BackendConfig, BackendKind, LogLevel, LoggingConfig, RealtimeSettings, RoomchatConfig,
    UiConfig, CONFIG_SCHEMA_VERSION,
};

use std::path::Path;

use roomchat_common::ConfigError;

/// Load config from `path`, or from the platform default location
/// (creating it on first run) when `path` is `None`.
pub fn load_config(path: Option<&Path>) -> Result<RoomchatConfig, ConfigError> {
    match path {
        Some(path) => toml_loader::load_from_path(path),
        None => toml_loader::load_default(),
    }
}

/// Serialize a config to a pretty-printed JSON string. The API key is redacted.
pub fn config_to_json(config: &RoomchatConfig) -> String {
    let mut printable = config.clone();
    if !printable.backend.api_key.is_empty() {
        printable.backend.api_key = "[REDACTED]".into();
    }
    serde_json::to_string_pretty(&printable)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
