//! Message Renderer: stored message to display record.

use chrono::{DateTime, Local, TimeZone};
use roomchat_common::{Color, SessionId};

use crate::message::ChatMessage;

/// Accent used when the author's colour is missing or unusable.
pub const FALLBACK_ACCENT: &str = "#333333";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorship {
    Own,
    Other,
}

impl Authorship {
    pub fn label(self) -> &'static str {
        match self {
            Authorship::Own => "Sent",
            Authorship::Other => "Received",
        }
    }
}

/// What the view shows for one message. `content` is already escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayRecord {
    /// `HH:MM`, empty while the server timestamp is pending.
    pub time: String,
    pub authorship: Authorship,
    pub content: String,
    /// `#rrggbb`.
    pub accent: String,
}

impl DisplayRecord {
    pub fn label(&self) -> &'static str {
        self.authorship.label()
    }

    pub fn accent_color(&self) -> Color {
        Color::from_hex(&self.accent).unwrap_or(Color::from_rgb(0x33, 0x33, 0x33))
    }
}

/// Escape the five markup-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Render with times in the local timezone.
pub fn render(message: &ChatMessage, local_user: &SessionId) -> DisplayRecord {
    render_in(message, local_user, &Local)
}

pub fn render_in<Tz: TimeZone>(message: &ChatMessage, local_user: &SessionId, tz: &Tz) -> DisplayRecord
where
    Tz::Offset: std::fmt::Display,
{
    let time = message
        .timestamp
        .and_then(DateTime::from_timestamp_millis)
        .map(|utc| utc.with_timezone(tz).format("%H:%M").to_string())
        .unwrap_or_default();

    let authorship = if message.user_id == local_user.as_str() {
        Authorship::Own
    } else {
        Authorship::Other
    };

    let accent = message
        .color
        .as_deref()
        .and_then(Color::from_hex)
        .map(|c| c.to_hex())
        .unwrap_or_else(|| FALLBACK_ACCENT.to_string());

    DisplayRecord {
        time,
        authorship,
        content: escape_html(&message.content),
        accent,
    }
}
