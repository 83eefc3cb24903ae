//! Clipboard access for the "copy link" button.
//!
//! The system clipboard (`arboard`) is tried first. Headless sessions and
//! remote shells usually have no clipboard owner, so a terminal fallback
//! writes an OSC 52 escape that most terminal emulators turn into a copy.

use std::io::Write;

use base64::Engine;
use roomchat_common::PlatformError;
use tracing::{debug, warn};

/// Anything that can take a piece of text and put it on a clipboard.
pub trait ClipboardBackend {
    fn set_text(&mut self, text: &str) -> Result<(), PlatformError>;
}

/// Cross-platform clipboard abstraction backed by `arboard`.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    /// Creates a new clipboard handle.
    pub fn new() -> Result<Self, PlatformError> {
        let inner =
            arboard::Clipboard::new().map_err(|e| PlatformError::ClipboardError(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl ClipboardBackend for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), PlatformError> {
        self.inner
            .set_text(text.to_owned())
            .map_err(|e| PlatformError::ClipboardError(e.to_string()))
    }
}

/// Build the OSC 52 "set clipboard" escape for `text`.
pub fn osc52_sequence(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{encoded}\x07")
}

/// Clipboard that asks the hosting terminal to copy via OSC 52.
pub struct TerminalClipboard<W: Write> {
    out: W,
}

impl<W: Write> TerminalClipboard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl TerminalClipboard<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ClipboardBackend for TerminalClipboard<W> {
    fn set_text(&mut self, text: &str) -> Result<(), PlatformError> {
        self.out
            .write_all(osc52_sequence(text).as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|e| PlatformError::TerminalError(e.to_string()))
    }
}

/// Which path actually performed a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    System,
    TerminalEscape,
}

/// Copies links with the system clipboard, falling back to the terminal.
pub struct LinkCopier {
    primary: Option<Box<dyn ClipboardBackend>>,
    fallback: Box<dyn ClipboardBackend>,
}

impl LinkCopier {
    pub fn new(
        primary: Option<Box<dyn ClipboardBackend>>,
        fallback: Box<dyn ClipboardBackend>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// System clipboard when one can be opened, OSC 52 on stdout otherwise.
    pub fn detect() -> Self {
        let primary: Option<Box<dyn ClipboardBackend>> = match SystemClipboard::new() {
            Ok(clipboard) => Some(Box::new(clipboard)),
            Err(e) => {
                debug!(error = %e, "System clipboard unavailable");
                None
            }
        };
        Self::new(primary, Box::new(TerminalClipboard::stdout()))
    }

    pub fn copy(&mut self, text: &str) -> Result<CopyMethod, PlatformError> {
        if let Some(primary) = self.primary.as_mut() {
            match primary.set_text(text) {
                Ok(()) => return Ok(CopyMethod::System),
                Err(e) => warn!(error = %e, "Clipboard write failed, using terminal fallback"),
            }
        }
        self.fallback.set_text(text)?;
        Ok(CopyMethod::TerminalEscape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording {
        copied: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl ClipboardBackend for Recording {
        fn set_text(&mut self, text: &str) -> Result<(), PlatformError> {
            if self.fail {
                return Err(PlatformError::ClipboardError("no owner".into()));
            }
            self.copied.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn recording(fail: bool) -> (Box<dyn ClipboardBackend>, Arc<Mutex<Vec<String>>>) {
        let copied = Arc::new(Mutex::new(Vec::new()));
        let backend = Recording {
            copied: Arc::clone(&copied),
            fail,
        };
        (Box::new(backend), copied)
    }

    #[test]
    fn osc52_wraps_base64() {
        assert_eq!(osc52_sequence("hi"), "\x1b]52;c;aGk=\x07");
    }

    #[test]
    fn terminal_clipboard_writes_escape() {
        let mut clip = TerminalClipboard::new(Vec::new());
        clip.set_text("roomchat://local/#lobby").unwrap();
        let written = String::from_utf8(clip.into_inner()).unwrap();
        assert_eq!(written, osc52_sequence("roomchat://local/#lobby"));
    }

    #[test]
    fn copier_prefers_system_clipboard() {
        let (primary, primary_log) = recording(false);
        let (fallback, fallback_log) = recording(false);
        let mut copier = LinkCopier::new(Some(primary), fallback);

        assert_eq!(copier.copy("link").unwrap(), CopyMethod::System);
        assert_eq!(primary_log.lock().unwrap().as_slice(), ["link"]);
        assert!(fallback_log.lock().unwrap().is_empty());
    }

    #[test]
    fn copier_falls_back_when_system_fails() {
        let (primary, _) = recording(true);
        let (fallback, fallback_log) = recording(false);
        let mut copier = LinkCopier::new(Some(primary), fallback);

        assert_eq!(copier.copy("link").unwrap(), CopyMethod::TerminalEscape);
        assert_eq!(fallback_log.lock().unwrap().as_slice(), ["link"]);
    }

    #[test]
    fn copier_without_system_clipboard_uses_fallback() {
        let (fallback, fallback_log) = recording(false);
        let mut copier = LinkCopier::new(None, fallback);
        assert_eq!(copier.copy("x").unwrap(), CopyMethod::TerminalEscape);
        assert_eq!(fallback_log.lock().unwrap().len(), 1);
    }

    #[test]
    fn copier_reports_fallback_failure() {
        let (fallback, _) = recording(true);
        let mut copier = LinkCopier::new(None, fallback);
        assert!(copier.copy("x").is_err());
    }
}
