//! Presence Tracker: the local online marker and the room's live count.

use std::sync::Arc;

use roomchat_common::SessionId;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::StoreError;
use crate::room::RoomName;
use crate::store::{server_timestamp, Query, RoomStore, StorePath, Subscription};

/// Number of entries in a presence map snapshot.
pub fn online_count(presence: &Value) -> usize {
    presence.as_object().map_or(0, |entries| entries.len())
}

pub struct PresenceTracker {
    store: Arc<dyn RoomStore>,
    room: RoomName,
    user_id: SessionId,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn RoomStore>, room: RoomName, user_id: SessionId) -> Self {
        Self {
            store,
            room,
            user_id,
        }
    }

    pub fn entry_path(&self) -> StorePath {
        self.room.presence_path().child(self.user_id.as_str())
    }

    /// Have the store remove the online marker if this connection drops,
    /// then write it. The marker is never written without the hook.
    pub async fn announce(&self) -> Result<(), StoreError> {
        let entry = self.entry_path();
        self.store.on_disconnect_remove(&entry).await?;
        self.store
            .set(&entry, json!({ "online": true, "timestamp": server_timestamp() }))
            .await?;
        debug!(room = %self.room, user_id = %self.user_id, "Presence announced");
        Ok(())
    }

    /// Graceful exit: delete the marker now.
    pub async fn withdraw(&self) -> Result<(), StoreError> {
        self.store.remove(&self.entry_path()).await?;
        debug!(room = %self.room, user_id = %self.user_id, "Presence withdrawn");
        Ok(())
    }

    /// Online count, recomputed on every change to the presence map.
    pub async fn watch_count(&self) -> Result<Subscription<usize>, StoreError> {
        let snapshots = self
            .store
            .watch(&self.room.presence_path(), Query::all())
            .await?;
        Ok(snapshots.map(|presence| online_count(&presence)))
    }
}
