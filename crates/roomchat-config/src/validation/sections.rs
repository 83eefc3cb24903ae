//! Per-section validators: backend, realtime and ui.

use crate::schema::{BackendKind, RoomchatConfig};

use super::helpers::validate_range;

/// The realtime backend cannot start without a host.
pub(crate) fn validate_backend(errors: &mut Vec<String>, config: &RoomchatConfig) {
    if config.backend.kind == BackendKind::Realtime && config.backend.database_host.is_empty() {
        errors.push("backend.database_host must be set for the realtime backend".into());
    }
    if !config.backend.identity_endpoint.starts_with("http://")
        && !config.backend.identity_endpoint.starts_with("https://")
    {
        errors.push(format!(
            "backend.identity_endpoint = {:?} must be an http(s) URL",
            config.backend.identity_endpoint
        ));
    }
}

/// Validate realtime timing ranges.
pub(crate) fn validate_realtime(errors: &mut Vec<String>, config: &RoomchatConfig) {
    let rt = &config.realtime;
    validate_range(errors, "realtime.heartbeat_interval", rt.heartbeat_interval, 10, 300);
    validate_range(errors, "realtime.reconnect_delay", rt.reconnect_delay, 1, 60);
    validate_range(errors, "realtime.max_reconnect_delay", rt.max_reconnect_delay, 1, 600);
    validate_range(errors, "realtime.connect_timeout", rt.connect_timeout, 1, 120);
    validate_range(errors, "realtime.request_timeout", rt.request_timeout, 1, 120);
    if rt.max_reconnect_delay < rt.reconnect_delay {
        errors.push(format!(
            "realtime.max_reconnect_delay = {} is below realtime.reconnect_delay = {}",
            rt.max_reconnect_delay, rt.reconnect_delay
        ));
    }
}

/// Validate UI timing ranges.
pub(crate) fn validate_ui(errors: &mut Vec<String>, config: &RoomchatConfig) {
    validate_range(errors, "ui.auto_join_delay_ms", config.ui.auto_join_delay_ms, 0, 10_000);
    validate_range(errors, "ui.copy_feedback_secs", config.ui.copy_feedback_secs, 1, 30);
    if config.ui.base_url.contains('#') {
        errors.push("ui.base_url must not contain a fragment".into());
    }
}
