//! Anonymous group-chat client.
//!
//! Rooms, messages and presence live in a hosted realtime store reached
//! through the [`store::RoomStore`] trait. This crate validates room
//! names, drives the create/join flow, keeps one room's subscriptions
//! open in a [`ChatSession`], and renders incoming messages for display.

pub mod client;
pub mod error;
pub mod history;
pub mod identity;
pub mod message;
pub mod presence;
pub mod realtime;
pub mod render;
pub mod room;
pub mod session;
pub mod store;

pub use client::{ChatClient, ClientState};
pub use error::{AuthError, ChatError, Operation, StoreError, ValidationError};
pub use history::{MessageLog, Placement, HISTORY_LIMIT};
pub use identity::{AnonymousAuth, AnonymousAuthConfig, Identity, IdentityProvider, LocalIdentityProvider};
pub use message::{ChatMessage, MAX_MESSAGE_LEN};
pub use presence::{online_count, PresenceTracker};
pub use realtime::{RealtimeConfig, RealtimeStore};
pub use render::{escape_html, render, render_in, Authorship, DisplayRecord};
pub use room::{RoomName, RoomResolver};
pub use session::{ChatSession, ReceivedMessage, SendOutcome, SessionContext, SessionEvent};
pub use store::{MemoryDatabase, MemoryStore, RoomStore};
