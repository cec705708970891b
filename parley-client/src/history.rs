//! # History Loader
//!
//! One-shot fetch of the message backlog at session start.

use std::sync::Arc;

use shared::models::{Credential, Message};
use tracing::{info, warn};

use crate::{api::ChatApi, error::SessionResult};

/// Pulls the full backlog through a [`ChatApi`].
#[derive(Clone)]
pub struct HistoryLoader {
    api: Arc<dyn ChatApi>,
}

impl std::fmt::Debug for HistoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLoader").finish_non_exhaustive()
    }
}

impl HistoryLoader {
    #[must_use]
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }

    /// The backlog in server order. The order is not re-sorted.
    ///
    /// # Errors
    /// [`crate::SessionError::Fetch`] when the backend call fails.
    pub async fn load(&self, credential: &Credential) -> SessionResult<Vec<Message>> {
        self.api.fetch_history(credential).await
    }

    /// Like [`HistoryLoader::load`], but a failure degrades to an empty log.
    pub async fn load_or_empty(&self, credential: &Credential) -> Vec<Message> {
        match self.load(credential).await {
            Ok(messages) => {
                info!(count = messages.len(), "history loaded");
                messages
            }
            Err(err) => {
                warn!(error = %err, "history unavailable; starting with an empty log");
                Vec::new()
            }
        }
    }
}
