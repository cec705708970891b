//! # Profile Cache
//!
//! Maps usernames to avatar references with at most one outstanding fetch
//! per username. The cache itself is plain data owned by the session actor;
//! [`ProfileFetcher`] runs the fetches and reports back over a channel.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use shared::models::{Credential, Identity, ProfileEntry, ProfileResponse};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{api::ChatApi, error::SessionResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    InFlight,
    Ready(String),
}

/// Username to avatar map with in-flight tracking.
#[derive(Debug, Default, Clone)]
pub struct ProfileCache {
    slots: HashMap<Identity, Slot>,
}

impl ProfileCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `username` in flight unless it is already known or pending.
    /// Returns `true` exactly when the caller must issue the fetch.
    pub fn ensure(&mut self, username: &Identity) -> bool {
        if self.slots.contains_key(username) {
            return false;
        }
        self.slots.insert(username.clone(), Slot::InFlight);
        true
    }

    /// Applies a finished fetch and returns `true` when an avatar was stored.
    /// A failure clears the in-flight marker so a later
    /// [`ProfileCache::ensure`] retries.
    pub fn resolve(
        &mut self,
        username: Identity,
        outcome: SessionResult<ProfileResponse>,
    ) -> bool {
        match outcome {
            Ok(profile) => {
                self.slots.insert(username, Slot::Ready(profile.avatar()));
                true
            }
            Err(err) => {
                warn!(user = %username, error = %err, "profile fetch failed");
                self.slots.remove(&username);
                false
            }
        }
    }

    /// Avatar for `username`, once populated. Empty when the user has none.
    #[must_use]
    pub fn avatar(&self, username: &str) -> Option<&str> {
        match self.slots.get(username) {
            Some(Slot::Ready(avatar)) => Some(avatar),
            _ => None,
        }
    }

    /// `true` while a fetch for `username` is outstanding.
    #[must_use]
    pub fn is_pending(&self, username: &str) -> bool {
        matches!(self.slots.get(username), Some(Slot::InFlight))
    }

    /// Populated entries, sorted by username.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<Identity, ProfileEntry> {
        self.slots
            .iter()
            .filter_map(|(username, slot)| match slot {
                Slot::Ready(avatar) => Some((
                    username.clone(),
                    ProfileEntry {
                        username: username.clone(),
                        avatar: avatar.clone(),
                    },
                )),
                Slot::InFlight => None,
            })
            .collect()
    }
}

/// A finished profile fetch on its way back to the cache owner.
#[derive(Debug)]
pub struct ProfileResolved {
    pub username: Identity,
    pub outcome: SessionResult<ProfileResponse>,
}

/// Spawns one fetch task per request and posts the outcome to `results`.
///
/// Outcomes that arrive after the receiver is gone are discarded.
#[derive(Clone)]
pub struct ProfileFetcher {
    api: Arc<dyn ChatApi>,
    credential: Credential,
    results: mpsc::UnboundedSender<ProfileResolved>,
}

impl std::fmt::Debug for ProfileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileFetcher")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl ProfileFetcher {
    #[must_use]
    pub fn new(
        api: Arc<dyn ChatApi>,
        credential: Credential,
        results: mpsc::UnboundedSender<ProfileResolved>,
    ) -> Self {
        Self {
            api,
            credential,
            results,
        }
    }

    pub fn fetch(&self, username: Identity) {
        let api = Arc::clone(&self.api);
        let credential = self.credential.clone();
        let results = self.results.clone();
        debug!(user = %username, "fetching profile");
        tokio::spawn(async move {
            let outcome = api.fetch_profile(&credential, &username).await;
            if results.send(ProfileResolved { username, outcome }).is_err() {
                debug!("session gone; discarding profile result");
            }
        });
    }
}
