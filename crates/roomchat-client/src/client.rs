//! The client state machine: `Unauthenticated -> Authenticated -> InRoom`.

use std::sync::Arc;

use rand::Rng;
use roomchat_common::color::pick_session_color;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{AuthError, ChatError, Operation};
use crate::identity::{Identity, IdentityProvider};
use crate::room::{RoomName, RoomResolver};
use crate::session::{ChatSession, SendOutcome, SessionContext, SessionEvent};
use crate::store::RoomStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unauthenticated,
    Authenticated,
    InRoom,
}

/// One running chat client. At most one room per client; switching rooms
/// means building a new client.
pub struct ChatClient {
    store: Arc<dyn RoomStore>,
    identity_provider: Arc<dyn IdentityProvider>,
    resolver: RoomResolver,
    color: String,
    identity: Option<Identity>,
    session: Option<ChatSession>,
    /// Created by this client, but entering it failed. Creating it again
    /// retries the entry instead of reporting that it exists.
    created_unentered: Option<RoomName>,
}

impl ChatClient {
    /// The session colour is drawn from the palette with `rng`.
    pub fn new<R: Rng + ?Sized>(
        store: Arc<dyn RoomStore>,
        identity_provider: Arc<dyn IdentityProvider>,
        rng: &mut R,
    ) -> Self {
        Self {
            resolver: RoomResolver::new(Arc::clone(&store)),
            store,
            identity_provider,
            color: pick_session_color(rng).to_string(),
            identity: None,
            session: None,
            created_unentered: None,
        }
    }

    pub fn state(&self) -> ClientState {
        match (&self.identity, &self.session) {
            (None, _) => ClientState::Unauthenticated,
            (Some(_), None) => ClientState::Authenticated,
            (Some(_), Some(_)) => ClientState::InRoom,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn room(&self) -> Option<&RoomName> {
        self.session.as_ref().map(ChatSession::room)
    }

    /// Obtain an anonymous identity and present it to the store.
    pub async fn authenticate(&mut self) -> Result<&Identity, ChatError> {
        if self.identity.is_none() {
            let identity = self.identity_provider.sign_in_anonymously().await?;
            self.store.authorize(&identity).await.map_err(|e| {
                warn!(error = %e, "Store rejected credential");
                AuthError::Rejected(e.to_string())
            })?;
            info!(user_id = %identity.user_id, color = %self.color, "Authenticated");
            self.identity = Some(identity);
        }
        self.identity.as_ref().ok_or(ChatError::NotAuthenticated)
    }

    pub async fn create_room(&mut self, raw: &str) -> Result<mpsc::Receiver<SessionEvent>, ChatError> {
        self.ensure_can_enter()?;
        let name = RoomName::parse(raw)?;
        let room = match &self.created_unentered {
            Some(created) if *created == name => {
                info!(room = %created, "Retrying entry to created room");
                name
            }
            _ => self.resolver.create_room(raw).await?,
        };
        let entered = self.enter(room.clone(), Operation::CreateRoom).await;
        if entered.is_err() {
            self.created_unentered = Some(room);
        }
        entered
    }

    pub async fn join_room(&mut self, raw: &str) -> Result<mpsc::Receiver<SessionEvent>, ChatError> {
        self.ensure_can_enter()?;
        let room = self.resolver.join_room(raw).await?;
        self.enter(room, Operation::JoinRoom).await
    }

    pub async fn send(&self, input: &str) -> Result<SendOutcome, ChatError> {
        match &self.session {
            Some(session) => session.send(input).await,
            None => Err(ChatError::NotInRoom),
        }
    }

    /// Graceful exit from the current room.
    pub async fn leave(&mut self) -> Result<(), ChatError> {
        match self.session.take() {
            Some(session) => session.close().await,
            None => Err(ChatError::NotInRoom),
        }
    }

    fn ensure_can_enter(&self) -> Result<(), ChatError> {
        match self.state() {
            ClientState::Unauthenticated => Err(ChatError::NotAuthenticated),
            ClientState::InRoom => Err(ChatError::AlreadyInRoom),
            ClientState::Authenticated => Ok(()),
        }
    }

    async fn enter(
        &mut self,
        room: RoomName,
        op: Operation,
    ) -> Result<mpsc::Receiver<SessionEvent>, ChatError> {
        let identity = self.identity.clone().ok_or(ChatError::NotAuthenticated)?;
        let context = SessionContext {
            room,
            identity,
            color: self.color.clone(),
        };
        let (session, events) = ChatSession::open(Arc::clone(&self.store), context, op).await?;
        self.session = Some(session);
        self.created_unentered = None;
        Ok(events)
    }
}
