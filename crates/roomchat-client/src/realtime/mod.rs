//! Thin client for a hosted realtime JSON database.
//!
//! Speaks the database's JSON-over-WebSocket protocol using
//! `tokio-tungstenite`: request/response with ids, listens with server
//! pushes mirrored into a local cache, keep-alives, server redirects and
//! auto-reconnect with backoff. [`RealtimeStore`] adapts it to
//! [`crate::store::RoomStore`].

mod cache;
mod client;
mod connection;
mod handler;
mod store;
mod types;

pub use client::RealtimeClient;
pub use store::RealtimeStore;
pub use types::{Envelope, RealtimeConfig, RealtimeEvent};
