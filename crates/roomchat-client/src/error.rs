//! Error taxonomy for the chat client.
//!
//! Every variant is recoverable by the user re-submitting the action,
//! except [`ChatError::Auth`] which ends the session until a reload.

use roomchat_common::RoomchatError;

use crate::room::RoomName;

/// Input rejected before anything touches the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Room name must be at least 3 characters")]
    RoomNameTooShort,

    #[error("Room name must be at most 30 characters")]
    RoomNameTooLong,

    #[error("Use only letters, numbers and hyphens in the room name")]
    RoomNameCharset,

    #[error("Message too long! Maximum 500 characters.")]
    MessageTooLong { len: usize },
}

/// Failure talking to the Room Store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected by backend: {0}")]
    Rejected(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("connection closed")]
    Disconnected,
}

/// Failure obtaining an anonymous identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("identity service unreachable: {0}")]
    Transport(String),

    #[error("sign-in rejected: {0}")]
    Rejected(String),

    #[error("malformed sign-in response: {0}")]
    Malformed(String),
}

/// The user action a backend failure interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateRoom,
    JoinRoom,
    SendMessage,
    LeaveRoom,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::CreateRoom => "create room",
            Operation::JoinRoom => "join room",
            Operation::SendMessage => "send message",
            Operation::LeaveRoom => "leave room",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("room not found: {0}")]
    NotFound(RoomName),

    #[error("room already exists: {0}")]
    AlreadyExists(RoomName),

    #[error("{op} failed: {source}")]
    Backend {
        op: Operation,
        #[source]
        source: StoreError,
    },

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("already in a room")]
    AlreadyInRoom,

    #[error("not in a room")]
    NotInRoom,
}

impl ChatError {
    pub(crate) fn backend(op: Operation) -> impl FnOnce(StoreError) -> ChatError {
        move |source| ChatError::Backend { op, source }
    }

    /// Text for the blocking alert shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Validation(e) => e.to_string(),
            ChatError::NotFound(_) => {
                "Room not found! Check the name or create a new room.".to_string()
            }
            ChatError::AlreadyExists(_) => {
                "This room already exists! Use \"Join a room\" to enter it.".to_string()
            }
            ChatError::Backend { op, .. } => match op {
                Operation::CreateRoom => "Error creating room. Try again.",
                Operation::JoinRoom => "Error joining room. Try again.",
                Operation::SendMessage => "Error sending message. Try again.",
                Operation::LeaveRoom => "Error leaving room.",
            }
            .to_string(),
            ChatError::Auth(_) | ChatError::NotAuthenticated => {
                "Error connecting. Reload the page.".to_string()
            }
            ChatError::AlreadyInRoom => {
                "Already in a room. Change the link to switch rooms.".to_string()
            }
            ChatError::NotInRoom => "Join a room first.".to_string(),
        }
    }

    /// Fatal errors offer no retry path short of a full reload.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChatError::Auth(_) | ChatError::NotAuthenticated)
    }
}

impl From<ChatError> for RoomchatError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Backend { source, .. } => RoomchatError::Backend(source.to_string()),
            other => RoomchatError::Chat(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(name: &str) -> RoomName {
        RoomName::parse(name).unwrap()
    }

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(
            ChatError::from(ValidationError::RoomNameTooShort).user_message(),
            "Room name must be at least 3 characters"
        );
        assert_eq!(
            ChatError::from(ValidationError::MessageTooLong { len: 501 }).user_message(),
            "Message too long! Maximum 500 characters."
        );
    }

    #[test]
    fn not_found_and_exists_messages() {
        assert!(ChatError::NotFound(room("abc"))
            .user_message()
            .starts_with("Room not found!"));
        assert!(ChatError::AlreadyExists(room("abc"))
            .user_message()
            .starts_with("This room already exists!"));
    }

    #[test]
    fn backend_message_depends_on_operation() {
        let err = ChatError::Backend {
            op: Operation::SendMessage,
            source: StoreError::Disconnected,
        };
        assert_eq!(err.user_message(), "Error sending message. Try again.");
        assert_eq!(err.to_string(), "send message failed: connection closed");

        let err = ChatError::backend(Operation::JoinRoom)(StoreError::Timeout(20));
        assert_eq!(err.user_message(), "Error joining room. Try again.");
    }

    #[test]
    fn only_auth_errors_are_fatal() {
        assert!(ChatError::Auth(AuthError::Rejected("ADMIN_ONLY_OPERATION".into())).is_fatal());
        assert!(ChatError::NotAuthenticated.is_fatal());
        assert!(!ChatError::NotFound(room("abc")).is_fatal());
        assert!(!ChatError::Backend {
            op: Operation::CreateRoom,
            source: StoreError::Unavailable("offline".into()),
        }
        .is_fatal());
    }

    #[test]
    fn converts_into_top_level_error() {
        let err: RoomchatError = ChatError::Backend {
            op: Operation::CreateRoom,
            source: StoreError::Disconnected,
        }
        .into();
        assert!(matches!(err, RoomchatError::Backend(_)));

        let err: RoomchatError = ChatError::NotInRoom.into();
        assert_eq!(err.to_string(), "chat error: not in a room");
    }
}
