//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# roomchat configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[backend]
# kind = "realtime"      # realtime, memory
# database_host = "my-chat-default-rtdb.firebaseio.com"
# namespace = ""         # empty: first label of database_host
# api_key = ""
# identity_endpoint = "https://identitytoolkit.googleapis.com"

[realtime]
# heartbeat_interval = 45    # 10-300 seconds
# reconnect_delay = 1        # 1-60
# max_reconnect_delay = 30   # 1-600
# connect_timeout = 15       # 1-120
# request_timeout = 20       # 1-120

[ui]
# auto_join_delay_ms = 500   # 0-10000
# copy_feedback_secs = 2     # 1-30
# base_url = "roomchat://local/"

[logging]
# level = "INFO"             # DEBUG, INFO, WARNING, ERROR
"##
    .to_string()
}
