//! What the controller drives: input lines in, widget updates out.

use std::collections::VecDeque;
use std::io::Write;

use async_trait::async_trait;
use roomchat_client::{Placement, ReceivedMessage, RoomName};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

pub const COPY_LABEL: &str = "Copy link";
pub const COPIED_LABEL: &str = "Copied!";

/// Buttons that are disabled while their request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    CreateRoom,
    JoinRoom,
    Send,
}

#[async_trait]
pub trait View: Send {
    /// The next submitted line, or `None` once input is closed.
    async fn next_input(&mut self) -> Option<String>;

    /// Show an error and return only once the user has acknowledged it.
    async fn alert(&mut self, message: &str);

    /// Swap the lobby for the chat screen.
    fn show_chat(&mut self, room: &RoomName, link: &str);

    fn show_message(&mut self, message: &ReceivedMessage, placement: Placement);

    fn set_online_count(&mut self, count: usize);

    fn set_control_enabled(&mut self, control: Control, enabled: bool);

    fn set_copy_label(&mut self, label: &str);

    /// Replace the message input's content.
    fn set_input(&mut self, text: &str);
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Drop control characters so message text cannot drive the terminal.
fn printable(text: &str) -> String {
    text.chars().filter(|c| !c.is_control()).collect()
}

/// Line-oriented view on a terminal.
///
/// Keeps the rendered message lines in display order. An arrival that
/// lands before the newest line cannot be printed in place, so the room's
/// history is reprinted instead.
pub struct TerminalView<R, W> {
    input: Lines<R>,
    out: W,
    shown: VecDeque<String>,
}

impl TerminalView<BufReader<Stdin>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), std::io::stdout())
    }
}

impl<R: AsyncBufRead + Unpin, W: Write> TerminalView<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self {
            input: input.lines(),
            out,
            shown: VecDeque::new(),
        }
    }

    pub fn print_help(&mut self) {
        self.emit(format_args!(
            "Commands: /create <room>  /join <room>  /copy  /open <url|#room>  /quit"
        ));
        self.emit(format_args!("Anything else is sent as a message."));
    }

    fn emit(&mut self, line: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!(error = %e, "Failed to write to terminal");
        }
    }
}

#[async_trait]
impl<R, W> View for TerminalView<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    async fn next_input(&mut self) -> Option<String> {
        match self.input.next_line().await {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to read input");
                None
            }
        }
    }

    async fn alert(&mut self, message: &str) {
        self.emit(format_args!("\x1b[1;31m! {message}{RESET} {DIM}[Enter]{RESET}"));
        let _ = self.next_input().await;
    }

    fn show_chat(&mut self, room: &RoomName, link: &str) {
        self.shown.clear();
        self.emit(format_args!("== #{room} =="));
        self.emit(format_args!("{DIM}{link}  [{COPY_LABEL}: /copy]{RESET}"));
    }

    fn show_message(&mut self, message: &ReceivedMessage, placement: Placement) {
        let display = &message.display;
        let accent = display.accent_color().ansi_fg();
        let time = if display.time.is_empty() {
            "--:--"
        } else {
            display.time.as_str()
        };
        let line = format!(
            "{accent}\u{25cf}{RESET} {DIM}{} {time}{RESET} {accent}\u{2502}{RESET} {}",
            display.label(),
            printable(&message.message.content),
        );

        if placement.evicted_oldest {
            self.shown.pop_front();
        }
        let index = placement.index.min(self.shown.len());
        self.shown.insert(index, line);

        if index + 1 == self.shown.len() {
            debug!(key = %message.key, index, "Appending message");
            if let Some(line) = self.shown.back().cloned() {
                self.emit(format_args!("{line}"));
            }
            return;
        }

        debug!(key = %message.key, index, "Reprinting history for earlier message");
        self.emit(format_args!("{DIM}-- history --{RESET}"));
        let lines: Vec<String> = self.shown.iter().cloned().collect();
        for line in lines {
            self.emit(format_args!("{line}"));
        }
    }

    fn set_online_count(&mut self, count: usize) {
        self.emit(format_args!("{DIM}{count} online{RESET}"));
    }

    fn set_control_enabled(&mut self, control: Control, enabled: bool) {
        match (control, enabled) {
            (Control::CreateRoom, false) => self.emit(format_args!("{DIM}Creating...{RESET}")),
            (Control::JoinRoom, false) => self.emit(format_args!("{DIM}Joining...{RESET}")),
            _ => {}
        }
    }

    fn set_copy_label(&mut self, label: &str) {
        self.emit(format_args!("{DIM}[{label}]{RESET}"));
    }

    fn set_input(&mut self, text: &str) {
        if !text.is_empty() {
            self.emit(format_args!("{DIM}draft kept: {}{RESET}", printable(text)));
        }
    }
}

// ---------------------------------------------------------------------------
// Recording (tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum ViewUpdate {
        Alert(String),
        Chat { room: String, link: String },
        Message { content: String, label: &'static str, index: usize },
        OnlineCount(usize),
        Control(Control, bool),
        CopyLabel(String),
        Input(String),
    }

    /// Scripted input, recorded output. Alerts are acknowledged at once.
    pub struct RecordingView {
        inputs: mpsc::UnboundedReceiver<String>,
        updates: Arc<Mutex<Vec<ViewUpdate>>>,
    }

    #[derive(Clone)]
    pub struct ViewHandle {
        inputs: mpsc::UnboundedSender<String>,
        updates: Arc<Mutex<Vec<ViewUpdate>>>,
    }

    pub fn recording_view() -> (RecordingView, ViewHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let updates = Arc::new(Mutex::new(Vec::new()));
        (
            RecordingView {
                inputs: rx,
                updates: Arc::clone(&updates),
            },
            ViewHandle {
                inputs: tx,
                updates,
            },
        )
    }

    impl ViewHandle {
        pub fn submit(&self, line: &str) {
            let _ = self.inputs.send(line.to_string());
        }

        pub fn updates(&self) -> Vec<ViewUpdate> {
            self.updates.lock().unwrap().clone()
        }

        pub fn alerts(&self) -> Vec<String> {
            self.updates()
                .into_iter()
                .filter_map(|u| match u {
                    ViewUpdate::Alert(message) => Some(message),
                    _ => None,
                })
                .collect()
        }

        pub fn messages(&self) -> Vec<String> {
            self.updates()
                .into_iter()
                .filter_map(|u| match u {
                    ViewUpdate::Message { content, .. } => Some(content),
                    _ => None,
                })
                .collect()
        }

        pub fn last_online_count(&self) -> Option<usize> {
            self.updates().into_iter().rev().find_map(|u| match u {
                ViewUpdate::OnlineCount(n) => Some(n),
                _ => None,
            })
        }
    }

    impl RecordingView {
        fn record(&self, update: ViewUpdate) {
            self.updates.lock().unwrap().push(update);
        }
    }

    #[async_trait]
    impl View for RecordingView {
        async fn next_input(&mut self) -> Option<String> {
            self.inputs.recv().await
        }

        async fn alert(&mut self, message: &str) {
            self.record(ViewUpdate::Alert(message.to_string()));
        }

        fn show_chat(&mut self, room: &RoomName, link: &str) {
            self.record(ViewUpdate::Chat {
                room: room.to_string(),
                link: link.to_string(),
            });
        }

        fn show_message(&mut self, message: &ReceivedMessage, placement: Placement) {
            self.record(ViewUpdate::Message {
                content: message.display.content.clone(),
                label: message.display.label(),
                index: placement.index,
            });
        }

        fn set_online_count(&mut self, count: usize) {
            self.record(ViewUpdate::OnlineCount(count));
        }

        fn set_control_enabled(&mut self, control: Control, enabled: bool) {
            self.record(ViewUpdate::Control(control, enabled));
        }

        fn set_copy_label(&mut self, label: &str) {
            self.record(ViewUpdate::CopyLabel(label.to_string()));
        }

        fn set_input(&mut self, text: &str) {
            self.record(ViewUpdate::Input(text.to_string()));
        }
    }
}
