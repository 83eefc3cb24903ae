//! Anonymous session identity.

mod anonymous;

use async_trait::async_trait;
use roomchat_common::SessionId;

use crate::error::AuthError;

pub use anonymous::{AnonymousAuth, AnonymousAuthConfig};

/// The identity a session acts under. Stable for the process lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: SessionId,
    /// Bearer credential presented to the Room Store, when the backend
    /// enforces access rules.
    pub id_token: Option<String>,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Identity {
    pub fn anonymous(user_id: SessionId) -> Self {
        Self {
            user_id,
            id_token: None,
        }
    }
}

/// Issues anonymous identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;
}

/// Mints a random session id locally. No credential is issued.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalIdentityProvider;

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous(SessionId::new()))
    }
}
