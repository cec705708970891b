//! Request/response collaborators consumed by the session.

pub mod http;

use async_trait::async_trait;
use shared::models::{Credential, Identity, Message, PresenceEntry, ProfileResponse};

use crate::error::SessionResult;

pub use http::HttpApi;

/// The REST-style backend the session pulls from and persists to.
///
/// Every call carries the session credential so implementations stay
/// stateless with respect to who is logged in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// The full message backlog, already in chronological order.
    async fn fetch_history(&self, credential: &Credential) -> SessionResult<Vec<Message>>;

    /// Profile data for one user.
    async fn fetch_profile(
        &self,
        credential: &Credential,
        username: &Identity,
    ) -> SessionResult<ProfileResponse>;

    /// The currently active users.
    async fn fetch_presence(&self, credential: &Credential) -> SessionResult<Vec<PresenceEntry>>;

    /// Durably records a sent message.
    async fn persist_message(&self, credential: &Credential, message: &Message)
    -> SessionResult<()>;
}
