use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("clipboard error: {0}")]
    ClipboardError(String),

    #[error("terminal error: {0}")]
    TerminalError(String),
}

/// Top-level error for the `roomchat` binary.
#[derive(Debug, thiserror::Error)]
pub enum RoomchatError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("chat error: {0}")]
    Chat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("ui.copy_feedback_secs = 0".into());
        assert_eq!(
            err.to_string(),
            "config validation error: ui.copy_feedback_secs = 0"
        );
    }

    #[test]
    fn platform_error_display() {
        let err = PlatformError::ClipboardError("access denied".into());
        assert_eq!(err.to_string(), "clipboard error: access denied");

        let err = PlatformError::TerminalError("broken pipe".into());
        assert_eq!(err.to_string(), "terminal error: broken pipe");
    }

    #[test]
    fn roomchat_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: RoomchatError = config_err.into();
        assert!(matches!(err, RoomchatError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn roomchat_error_message_variants() {
        let err = RoomchatError::Backend("socket closed".into());
        assert_eq!(err.to_string(), "backend error: socket closed");

        let err = RoomchatError::Chat("not in a room".into());
        assert_eq!(err.to_string(), "chat error: not in a room");
    }
}
