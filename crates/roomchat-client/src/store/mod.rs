//! Room Store abstraction.
//!
//! A hierarchical JSON store with server-assigned timestamps, appended
//! list entries, per-connection removal hooks and push-based change
//! notification. [`memory`] holds the in-process implementation; the
//! realtime wire client lives in [`crate::realtime`].

#[cfg(test)]
pub(crate) mod flaky;
pub mod memory;
mod path;
mod push_id;
mod query;
mod server_value;
mod subscription;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::identity::Identity;

pub use memory::{MemoryDatabase, MemoryStore};
pub use path::{set_at, value_at, StorePath};
pub use push_id::PushIdGenerator;
pub use query::{ChildAdded, ChildTracker, Query};
pub use server_value::{resolve_server_values, server_timestamp};
pub use subscription::Subscription;

#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Present the session credential to the store. Stores without access
    /// rules accept everything.
    async fn authorize(&self, identity: &Identity) -> Result<(), StoreError> {
        let _ = identity;
        Ok(())
    }

    /// Point read. `None` when nothing is stored at `path`.
    async fn get(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Replace the node at `path`. Timestamp placeholders are resolved by
    /// the store.
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// Append `value` under a fresh time-ordered key and return the key.
    async fn push(&self, path: &StorePath, value: Value) -> Result<String, StoreError>;

    async fn remove(&self, path: &StorePath) -> Result<(), StoreError> {
        self.set(path, Value::Null).await
    }

    /// Ask the store to delete `path` once this connection goes away.
    async fn on_disconnect_remove(&self, path: &StorePath) -> Result<(), StoreError>;

    /// Snapshots of `path` through `query`: the current value first, then
    /// one per change.
    async fn watch(&self, path: &StorePath, query: Query)
        -> Result<Subscription<Value>, StoreError>;
}
