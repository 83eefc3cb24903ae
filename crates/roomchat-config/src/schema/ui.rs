//! Widget behaviour settings.

use serde::{Deserialize, Serialize};

/// UI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Delay before auto-joining the room named in the start-up location
    /// fragment, in milliseconds (valid range: 0-10000).
    pub auto_join_delay_ms: u32,
    /// How long the copy-link button shows its success label (valid range: 1-30).
    pub copy_feedback_secs: u32,
    /// Location the room fragment is appended to when none is given.
    pub base_url: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            auto_join_delay_ms: 500,
            copy_feedback_secs: 2,
            base_url: "roomchat://local/".into(),
        }
    }
}
