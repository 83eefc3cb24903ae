//! Room names and the Room Resolver.

use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::error::{ChatError, Operation, ValidationError};
use crate::store::{server_timestamp, RoomStore, StorePath};

pub const MIN_ROOM_NAME_LEN: usize = 3;
pub const MAX_ROOM_NAME_LEN: usize = 30;

/// A validated room name: lowercase `[a-z0-9-]`, 3 to 30 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
    /// Trim and lowercase `raw`, then check length and charset.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let name = raw.trim().to_lowercase();
        let len = name.chars().count();
        if len < MIN_ROOM_NAME_LEN {
            return Err(ValidationError::RoomNameTooShort);
        }
        if len > MAX_ROOM_NAME_LEN {
            return Err(ValidationError::RoomNameTooLong);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError::RoomNameCharset);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn root(&self) -> StorePath {
        StorePath::parse("rooms").child(&self.0)
    }

    pub fn metadata_path(&self) -> StorePath {
        self.root().child("metadata")
    }

    pub fn messages_path(&self) -> StorePath {
        self.root().child("messages")
    }

    pub fn presence_path(&self) -> StorePath {
        self.root().child("presence")
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoomName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Existence checks and room creation against the Room Store.
#[derive(Clone)]
pub struct RoomResolver {
    store: Arc<dyn RoomStore>,
}

impl RoomResolver {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// One point-read of the room's metadata node.
    pub async fn room_exists(&self, name: &RoomName, op: Operation) -> Result<bool, ChatError> {
        let metadata = self
            .store
            .get(&name.metadata_path())
            .await
            .map_err(ChatError::backend(op))?;
        debug!(room = %name, exists = metadata.is_some(), "Room existence check");
        Ok(metadata.is_some())
    }

    /// Check, then write the metadata. Two concurrent creators can both
    /// pass the check; the later write wins.
    pub async fn create_room(&self, raw: &str) -> Result<RoomName, ChatError> {
        let name = RoomName::parse(raw)?;
        if self.room_exists(&name, Operation::CreateRoom).await? {
            return Err(ChatError::AlreadyExists(name));
        }
        self.store
            .set(
                &name.metadata_path(),
                json!({ "name": name.as_str(), "createdAt": server_timestamp() }),
            )
            .await
            .map_err(ChatError::backend(Operation::CreateRoom))?;
        info!(room = %name, "Room created");
        Ok(name)
    }

    pub async fn join_room(&self, raw: &str) -> Result<RoomName, ChatError> {
        let name = RoomName::parse(raw)?;
        if !self.room_exists(&name, Operation::JoinRoom).await? {
            return Err(ChatError::NotFound(name));
        }
        Ok(name)
    }
}
