//! Chat Session: the subscriptions and presence of one joined room.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ChatError, Operation};
use crate::history::HISTORY_LIMIT;
use crate::identity::Identity;
use crate::message::{outgoing_record, prepare_content, ChatMessage, Prepared};
use crate::presence::PresenceTracker;
use crate::render::{render, DisplayRecord};
use crate::room::RoomName;
use crate::store::{ChildAdded, Query, RoomStore, Subscription};

/// Who is chatting where, and in what colour. Built on room entry and
/// dropped on teardown.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub room: RoomName,
    pub identity: Identity,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub key: String,
    pub message: ChatMessage,
    pub display: DisplayRecord,
}

/// Updates pushed to the UI while a session is open.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Message(ReceivedMessage),
    OnlineCount(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing left after trimming; nothing written.
    Ignored,
    Sent { key: String },
}

fn message_query() -> Query {
    Query::all()
        .order_by_child("timestamp")
        .limit_to_last(HISTORY_LIMIT)
}

pub struct ChatSession {
    context: SessionContext,
    store: Arc<dyn RoomStore>,
    presence: PresenceTracker,
    shutdown: CancellationToken,
}

impl ChatSession {
    /// Subscribe to messages, announce presence, then watch the count.
    /// `op` names the user action for error reporting.
    pub async fn open(
        store: Arc<dyn RoomStore>,
        context: SessionContext,
        op: Operation,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), ChatError> {
        let room = context.room.clone();

        let messages = store
            .watch(&room.messages_path(), message_query())
            .await
            .map_err(ChatError::backend(op))?
            .child_added(message_query());

        let presence = PresenceTracker::new(
            Arc::clone(&store),
            room.clone(),
            context.identity.user_id.clone(),
        );
        if let Err(e) = presence.announce().await {
            messages.unsubscribe();
            return Err(ChatError::backend(op)(e));
        }
        let counts = match presence.watch_count().await {
            Ok(counts) => counts,
            Err(e) => {
                messages.unsubscribe();
                if let Err(cleanup) = presence.withdraw().await {
                    warn!(room = %room, error = %cleanup, "Could not withdraw presence");
                }
                return Err(ChatError::backend(op)(e));
            }
        };

        let (event_tx, event_rx) = mpsc::channel(256);
        let shutdown = CancellationToken::new();
        tokio::spawn(event_translator(
            messages,
            counts,
            event_tx,
            context.identity.clone(),
            shutdown.clone(),
        ));

        info!(room = %room, user_id = %context.identity.user_id, "Entered room");
        Ok((
            Self {
                context,
                store,
                presence,
                shutdown,
            },
            event_rx,
        ))
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn room(&self) -> &RoomName {
        &self.context.room
    }

    /// Trim, check the length, then append. Empty input writes nothing.
    pub async fn send(&self, input: &str) -> Result<SendOutcome, ChatError> {
        let content = match prepare_content(input)? {
            Prepared::Empty => return Ok(SendOutcome::Ignored),
            Prepared::Ready(content) => content,
        };
        let record = outgoing_record(
            &content,
            &self.context.identity.user_id,
            &self.context.color,
        );
        let key = self
            .store
            .push(&self.context.room.messages_path(), record)
            .await
            .map_err(ChatError::backend(Operation::SendMessage))?;
        debug!(room = %self.context.room, key = %key, "Message sent");
        Ok(SendOutcome::Sent { key })
    }

    /// Stop the subscriptions and delete the presence entry.
    pub async fn close(self) -> Result<(), ChatError> {
        self.shutdown.cancel();
        self.presence
            .withdraw()
            .await
            .map_err(ChatError::backend(Operation::LeaveRoom))?;
        info!(room = %self.context.room, "Left room");
        Ok(())
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ---------------------------------------------------------------------------
// Event Translator
// ---------------------------------------------------------------------------

/// Turns store notifications into [`SessionEvent`]s until shutdown or
/// until both feeds end.
async fn event_translator(
    mut messages: Subscription<ChildAdded>,
    mut counts: Subscription<usize>,
    event_tx: mpsc::Sender<SessionEvent>,
    identity: Identity,
    shutdown: CancellationToken,
) {
    let mut messages_open = true;
    let mut counts_open = true;

    while messages_open || counts_open {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            added = messages.recv(), if messages_open => match added {
                Some(added) => match ChatMessage::from_value(&added.value) {
                    Some(message) => {
                        let display = render(&message, &identity.user_id);
                        SessionEvent::Message(ReceivedMessage {
                            key: added.key,
                            message,
                            display,
                        })
                    }
                    None => {
                        warn!(key = %added.key, "Skipping malformed message");
                        continue;
                    }
                },
                None => {
                    messages_open = false;
                    continue;
                }
            },
            count = counts.recv(), if counts_open => match count {
                Some(count) => SessionEvent::OnlineCount(count),
                None => {
                    counts_open = false;
                    continue;
                }
            },
        };
        if event_tx.send(event).await.is_err() {
            break;
        }
    }

    messages.unsubscribe();
    counts.unsubscribe();
    debug!("Session event translator stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StoreError, ValidationError};
    use crate::render::Authorship;
    use crate::store::flaky::FlakyStore;
    use crate::store::{MemoryDatabase, StorePath};
    use roomchat_common::SessionId;
    use serde_json::json;

    fn context(room: &str, user: &str) -> SessionContext {
        SessionContext {
            room: RoomName::parse(room).unwrap(),
            identity: Identity::anonymous(SessionId::from(user)),
            color: "#3498db".into(),
        }
    }

    async fn open(db: &MemoryDatabase, user: &str) -> (ChatSession, mpsc::Receiver<SessionEvent>) {
        ChatSession::open(Arc::new(db.connect()), context("lobby", user), Operation::JoinRoom)
            .await
            .unwrap()
    }

    async fn next_message(rx: &mut mpsc::Receiver<SessionEvent>) -> ReceivedMessage {
        loop {
            match rx.recv().await {
                Some(SessionEvent::Message(m)) => return m,
                Some(SessionEvent::OnlineCount(_)) => continue,
                None => panic!("session ended"),
            }
        }
    }

    async fn next_count(rx: &mut mpsc::Receiver<SessionEvent>) -> usize {
        loop {
            match rx.recv().await {
                Some(SessionEvent::OnlineCount(n)) => return n,
                Some(SessionEvent::Message(_)) => continue,
                None => panic!("session ended"),
            }
        }
    }

    #[tokio::test]
    async fn own_message_echoes_back_as_sent() {
        let db = MemoryDatabase::new();
        let (session, mut rx) = open(&db, "alice").await;

        let outcome = session.send("  hello  ").await.unwrap();
        let SendOutcome::Sent { key } = outcome else {
            panic!("expected a write");
        };
        let received = next_message(&mut rx).await;
        assert_eq!(received.key, key);
        assert_eq!(received.message.content, "hello");
        assert_eq!(received.message.color.as_deref(), Some("#3498db"));
        assert_eq!(received.display.authorship, Authorship::Own);
        assert!(received.message.timestamp.is_some());
    }

    #[tokio::test]
    async fn other_members_receive_messages() {
        let db = MemoryDatabase::new();
        let (alice, _alice_rx) = open(&db, "alice").await;
        let (_bob, mut bob_rx) = open(&db, "bob").await;

        alice.send("<b>hi</b>").await.unwrap();
        let received = next_message(&mut bob_rx).await;
        assert_eq!(received.display.label(), "Received");
        assert_eq!(received.display.content, "&lt;b&gt;hi&lt;/b&gt;");
    }

    #[tokio::test]
    async fn empty_send_writes_nothing() {
        let db = MemoryDatabase::new();
        let (session, _rx) = open(&db, "alice").await;
        assert_eq!(session.send("   ").await.unwrap(), SendOutcome::Ignored);
        assert!(db.snapshot(&StorePath::parse("rooms/lobby/messages")).is_none());
    }

    #[tokio::test]
    async fn length_limit_on_send() {
        let db = MemoryDatabase::new();
        let (session, _rx) = open(&db, "alice").await;

        assert!(matches!(
            session.send(&"x".repeat(500)).await.unwrap(),
            SendOutcome::Sent { .. }
        ));
        let err = session.send(&"x".repeat(501)).await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Validation(ValidationError::MessageTooLong { len: 501 })
        ));
        let stored = db.snapshot(&StorePath::parse("rooms/lobby/messages")).unwrap();
        assert_eq!(stored.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_reports_backend_error() {
        let db = MemoryDatabase::new();
        let (session, _rx) = open(&db, "alice").await;
        db.set_unavailable(true);
        let err = session.send("hello").await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Backend {
                op: Operation::SendMessage,
                source: StoreError::Unavailable(_)
            }
        ));
    }

    #[tokio::test]
    async fn history_arrives_in_timestamp_order() {
        let db = MemoryDatabase::new();
        let writer = db.connect();
        let messages = StorePath::parse("rooms/lobby/messages");
        // Keys sort opposite to timestamps.
        for (key, t) in [("a", 30), ("b", 10), ("c", 20)] {
            writer
                .set(
                    &messages.child(key),
                    json!({"content": format!("t{t}"), "timestamp": t, "userId": "x"}),
                )
                .await
                .unwrap();
        }

        let (_session, mut rx) = open(&db, "alice").await;
        let mut order = Vec::new();
        for _ in 0..3 {
            order.push(next_message(&mut rx).await.message.content);
        }
        assert_eq!(order, ["t10", "t20", "t30"]);
    }

    #[tokio::test]
    async fn only_latest_hundred_are_delivered() {
        let db = MemoryDatabase::new();
        let writer = db.connect();
        let messages = StorePath::parse("rooms/lobby/messages");
        for t in 0..120 {
            writer
                .set(
                    &messages.child(&format!("m{t:03}")),
                    json!({"content": t.to_string(), "timestamp": t, "userId": "x"}),
                )
                .await
                .unwrap();
        }
        let (_session, mut rx) = open(&db, "alice").await;
        let first = next_message(&mut rx).await;
        assert_eq!(first.message.content, "20");
    }

    fn flaky(db: &MemoryDatabase) -> Arc<FlakyStore> {
        Arc::new(FlakyStore::new(db.connect()))
    }

    async fn open_on(
        store: &Arc<FlakyStore>,
    ) -> Result<(ChatSession, mpsc::Receiver<SessionEvent>), ChatError> {
        ChatSession::open(
            Arc::clone(store) as Arc<dyn RoomStore>,
            context("lobby", "alice"),
            Operation::JoinRoom,
        )
        .await
    }

    #[tokio::test]
    async fn presence_watch_failure_withdraws_marker() {
        let db = MemoryDatabase::new();
        let store = flaky(&db);
        // Second watch is the presence count, after the marker is written.
        store.fail_watch(2);

        let err = open_on(&store).await.err().unwrap();
        assert!(matches!(
            err,
            ChatError::Backend {
                op: Operation::JoinRoom,
                source: StoreError::Unavailable(_)
            }
        ));
        assert!(db.snapshot(&StorePath::parse("rooms/lobby/presence")).is_none());

        let (_session, mut rx) = open_on(&store).await.unwrap();
        assert_eq!(next_count(&mut rx).await, 1);
    }

    #[tokio::test]
    async fn hook_failure_mid_open_leaves_nothing_behind() {
        let db = MemoryDatabase::new();
        let store = flaky(&db);
        store.fail_next_hook();

        assert!(open_on(&store).await.is_err());
        store.inner().disconnect();
        assert!(db.snapshot(&StorePath::parse("rooms/lobby/presence")).is_none());
    }

    #[tokio::test]
    async fn presence_count_follows_members() {
        let db = MemoryDatabase::new();
        let alice_store = Arc::new(db.connect());
        let (_alice, mut alice_rx) = ChatSession::open(
            alice_store.clone() as Arc<dyn RoomStore>,
            context("lobby", "alice"),
            Operation::CreateRoom,
        )
        .await
        .unwrap();
        assert_eq!(next_count(&mut alice_rx).await, 1);

        let bob_store = Arc::new(db.connect());
        let (_bob, mut bob_rx) = ChatSession::open(
            bob_store.clone() as Arc<dyn RoomStore>,
            context("lobby", "bob"),
            Operation::JoinRoom,
        )
        .await
        .unwrap();
        assert_eq!(next_count(&mut bob_rx).await, 2);
        assert_eq!(next_count(&mut alice_rx).await, 2);

        bob_store.disconnect();
        assert_eq!(next_count(&mut alice_rx).await, 1);
    }

    #[tokio::test]
    async fn close_withdraws_presence() {
        let db = MemoryDatabase::new();
        let (alice, mut alice_rx) = open(&db, "alice").await;
        let (bob, _bob_rx) = open(&db, "bob").await;
        assert_eq!(next_count(&mut alice_rx).await, 1);
        assert_eq!(next_count(&mut alice_rx).await, 2);

        bob.close().await.unwrap();
        assert_eq!(next_count(&mut alice_rx).await, 1);
        assert!(db
            .snapshot(&StorePath::parse("rooms/lobby/presence/bob"))
            .is_none());
    }

    #[tokio::test]
    async fn open_fails_cleanly_when_store_is_down() {
        let db = MemoryDatabase::new();
        db.set_unavailable(true);
        let result =
            ChatSession::open(Arc::new(db.connect()), context("lobby", "alice"), Operation::JoinRoom)
                .await;
        assert!(matches!(
            result,
            Err(ChatError::Backend {
                op: Operation::JoinRoom,
                ..
            })
        ));
    }
}
