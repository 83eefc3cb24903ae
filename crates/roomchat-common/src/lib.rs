pub mod color;
pub mod errors;
pub mod id;

pub use color::{Color, SESSION_PALETTE};
pub use errors::{ConfigError, PlatformError, RoomchatError};
pub use id::{new_id, SessionId};

pub type Result<T> = std::result::Result<T, RoomchatError>;
