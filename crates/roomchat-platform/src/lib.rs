//! Platform services for the roomchat client.

pub mod clipboard;

pub use clipboard::{
    osc52_sequence, ClipboardBackend, CopyMethod, LinkCopier, SystemClipboard, TerminalClipboard,
};
