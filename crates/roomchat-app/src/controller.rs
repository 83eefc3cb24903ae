//! UI controller: turns view input into client calls and session events
//! into view updates.
//!
//! Everything runs on one task, so handlers never overlap. A blocking
//! alert holds up the next event until the view returns from it.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use roomchat_client::{ChatClient, ChatError, MessageLog, SendOutcome, SessionEvent};
use roomchat_config::UiConfig;
use roomchat_platform::LinkCopier;
use tokio::sync::mpsc;
use tokio::time::{sleep, Sleep};
use tracing::{debug, error, info, warn};

use crate::location::Location;
use crate::view::{Control, View, COPIED_LABEL, COPY_LABEL};

/// Why the controller stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    Quit,
    /// The location changed; tear everything down and start over there.
    Reload(Location),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create(String),
    Join(String),
    Copy,
    Open(String),
    Quit,
    Message(String),
}

impl Command {
    /// Slash commands by their first word; any other line is a message.
    pub fn parse(line: &str) -> Command {
        let trimmed = line.trim();
        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };
        match head {
            "/create" => Command::Create(rest.to_string()),
            "/join" => Command::Join(rest.to_string()),
            "/copy" => Command::Copy,
            "/open" => Command::Open(rest.to_string()),
            "/quit" => Command::Quit,
            _ => Command::Message(line.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Create,
    Join,
}

impl Entry {
    fn control(self) -> Control {
        match self {
            Entry::Create => Control::CreateRoom,
            Entry::Join => Control::JoinRoom,
        }
    }
}

type Timer = Option<Pin<Box<Sleep>>>;

async fn fired(timer: &mut Timer) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<SessionEvent>>) -> Option<SessionEvent> {
    match events {
        Some(events) => events.recv().await,
        None => pending().await,
    }
}

pub struct Controller<'v, V: View> {
    client: ChatClient,
    view: &'v mut V,
    copier: LinkCopier,
    location: Location,
    auto_join_delay: Duration,
    copy_feedback: Duration,
    events: Option<mpsc::Receiver<SessionEvent>>,
    log: MessageLog,
    auto_join: Timer,
    copy_reset: Timer,
}

impl<'v, V: View> Controller<'v, V> {
    pub fn new(
        client: ChatClient,
        view: &'v mut V,
        copier: LinkCopier,
        location: Location,
        ui: &UiConfig,
    ) -> Self {
        Self {
            client,
            view,
            copier,
            location,
            auto_join_delay: Duration::from_millis(u64::from(ui.auto_join_delay_ms)),
            copy_feedback: Duration::from_secs(u64::from(ui.copy_feedback_secs)),
            events: None,
            log: MessageLog::default(),
            auto_join: None,
            copy_reset: None,
        }
    }

    /// Sign in, then serve input, session events and timers until the
    /// user quits or the location changes.
    pub async fn run(mut self) -> Exit {
        if self.location.fragment().is_some() {
            self.auto_join = Some(Box::pin(sleep(self.auto_join_delay)));
        }

        if let Err(e) = self.client.authenticate().await {
            self.report(&e).await;
        }

        let exit = loop {
            tokio::select! {
                line = self.view.next_input() => match line {
                    Some(line) => {
                        if let Some(exit) = self.handle_command(Command::parse(&line)).await {
                            break exit;
                        }
                    }
                    None => break Exit::Quit,
                },
                event = next_event(&mut self.events) => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("Session event stream ended");
                        self.events = None;
                    }
                },
                _ = fired(&mut self.auto_join) => {
                    self.auto_join = None;
                    let pending_room = self
                        .location
                        .fragment()
                        .filter(|_| self.client.room().is_none())
                        .map(str::to_string);
                    if let Some(room) = pending_room {
                        info!(room = %room, "Joining room from location");
                        self.enter(Entry::Join, &room).await;
                    }
                },
                _ = fired(&mut self.copy_reset) => {
                    self.copy_reset = None;
                    self.view.set_copy_label(COPY_LABEL);
                },
            }
        };

        if self.client.room().is_some() {
            if let Err(e) = self.client.leave().await {
                warn!(error = %e, "Leaving room failed");
            }
        }
        exit
    }

    async fn handle_command(&mut self, command: Command) -> Option<Exit> {
        match command {
            Command::Create(raw) => self.enter(Entry::Create, &raw).await,
            Command::Join(raw) => self.enter(Entry::Join, &raw).await,
            Command::Copy => self.copy_link(),
            Command::Open(target) => {
                let next = self.location.navigate(&target);
                if next != self.location {
                    info!(from = %self.location, to = %next, "Location changed");
                    return Some(Exit::Reload(next));
                }
                debug!(location = %next, "Location unchanged");
            }
            Command::Quit => return Some(Exit::Quit),
            Command::Message(text) => self.send(text).await,
        }
        None
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Message(received) => {
                let placement = self
                    .log
                    .insert(received.key.clone(), received.message.clone());
                match placement {
                    Some(placement) => self.view.show_message(&received, placement),
                    None => debug!(key = %received.key, "Message not displayed"),
                }
            }
            SessionEvent::OnlineCount(count) => self.view.set_online_count(count),
        }
    }

    /// Create or join. The control stays disabled once the chat screen
    /// replaces the lobby.
    async fn enter(&mut self, entry: Entry, raw: &str) {
        let control = entry.control();
        self.view.set_control_enabled(control, false);
        let result = match entry {
            Entry::Create => self.client.create_room(raw).await,
            Entry::Join => self.client.join_room(raw).await,
        };
        match result {
            Ok(events) => {
                let Some(room) = self.client.room().cloned() else {
                    return;
                };
                self.location.set_fragment(room.as_str());
                self.log.clear();
                self.events = Some(events);
                self.view.show_chat(&room, &self.location.href());
            }
            Err(e) => {
                self.view.set_control_enabled(control, true);
                self.report(&e).await;
            }
        }
    }

    async fn send(&mut self, text: String) {
        self.view.set_control_enabled(Control::Send, false);
        let result = self.client.send(&text).await;
        self.view.set_control_enabled(Control::Send, true);
        match result {
            Ok(SendOutcome::Sent { .. }) => self.view.set_input(""),
            Ok(SendOutcome::Ignored) => {}
            Err(e) => {
                self.view.set_input(&text);
                self.report(&e).await;
            }
        }
    }

    fn copy_link(&mut self) {
        if self.client.room().is_none() {
            debug!("Copy link ignored outside a room");
            return;
        }
        let link = self.location.href();
        match self.copier.copy(&link) {
            Ok(method) => {
                info!(link = %link, method = ?method, "Room link copied");
                self.view.set_copy_label(COPIED_LABEL);
                self.copy_reset = Some(Box::pin(sleep(self.copy_feedback)));
            }
            Err(e) => warn!(error = %e, "Could not copy room link"),
        }
    }

    async fn report(&mut self, err: &ChatError) {
        match err {
            e if e.is_fatal() => error!(error = %e, "Session unusable"),
            ChatError::Validation(e) => debug!(error = %e, "Input rejected"),
            e => warn!(error = %e, "Request failed"),
        }
        self.view.alert(&err.user_message()).await;
    }
}
