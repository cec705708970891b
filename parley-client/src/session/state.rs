use std::{collections::BTreeMap, sync::Arc};

use shared::models::{
    ConnectionState, Credential, Identity, Message, PresenceEntry, ProfileEntry, ProfileResponse,
};

use crate::{
    error::{SessionError, SessionResult},
    profiles::ProfileCache,
};

/// Everything one session owns. Only the session actor mutates it.
///
/// The log and the populated profiles are shared with published views, so
/// taking a snapshot never copies them.
#[derive(Debug, Clone)]
pub struct SessionState {
    credential: Credential,
    connection_state: ConnectionState,
    message_log: Arc<Vec<Message>>,
    profiles: ProfileCache,
    profile_entries: Arc<BTreeMap<Identity, ProfileEntry>>,
    presence: Vec<PresenceEntry>,
}

impl SessionState {
    /// Fresh state for `credential`.
    ///
    /// # Errors
    /// [`SessionError::Unauthenticated`] when there is no credential.
    pub fn new(credential: Option<Credential>) -> SessionResult<Self> {
        let credential = credential.ok_or(SessionError::Unauthenticated)?;
        if credential.username.is_blank() || credential.token.is_empty() {
            return Err(SessionError::Unauthenticated);
        }
        Ok(Self {
            credential,
            connection_state: ConnectionState::Closed,
            message_log: Arc::default(),
            profiles: ProfileCache::new(),
            profile_entries: Arc::default(),
            presence: Vec::new(),
        })
    }

    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.credential.username
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.message_log
    }

    #[must_use]
    pub fn presence(&self) -> &[PresenceEntry] {
        &self.presence
    }

    /// Returns `false` when `state` is already current.
    pub fn set_connection_state(&mut self, state: ConnectionState) -> bool {
        let changed = self.connection_state != state;
        self.connection_state = state;
        changed
    }

    /// Replaces the log with the history backlog. Returns the senders whose
    /// profiles must now be fetched, each at most once.
    pub fn seed_history(&mut self, messages: Vec<Message>) -> Vec<Identity> {
        let fetch = messages
            .iter()
            .filter(|message| self.profiles.ensure(&message.sender))
            .map(|message| message.sender.clone())
            .collect();
        self.message_log = Arc::new(messages);
        fetch
    }

    /// Appends a live message. Returns the sender when its profile must be
    /// fetched.
    pub fn append(&mut self, message: Message) -> Option<Identity> {
        let fetch = self
            .profiles
            .ensure(&message.sender)
            .then(|| message.sender.clone());
        Arc::make_mut(&mut self.message_log).push(message);
        fetch
    }

    /// Swaps in a new presence list. Returns usernames whose profiles must
    /// now be fetched.
    pub fn replace_presence(&mut self, entries: Vec<PresenceEntry>) -> Vec<Identity> {
        let fetch = entries
            .iter()
            .filter(|entry| self.profiles.ensure(&entry.username))
            .map(|entry| entry.username.clone())
            .collect();
        self.presence = entries;
        fetch
    }

    /// Records a finished profile fetch. Returns `true` when an avatar was
    /// populated.
    pub fn resolve_profile(
        &mut self,
        username: Identity,
        outcome: SessionResult<ProfileResponse>,
    ) -> bool {
        if !self.profiles.resolve(username, outcome) {
            return false;
        }
        self.profile_entries = Arc::new(self.profiles.entries());
        true
    }

    /// A render snapshot.
    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            identity: Some(self.credential.username.clone()),
            connection_state: self.connection_state,
            messages: Arc::clone(&self.message_log),
            profiles: Arc::clone(&self.profile_entries),
            presence: self.presence.clone(),
        }
    }
}

/// Read-only snapshot handed to the presentation layer.
///
/// The default value is the idle session: no identity, `Closed`, nothing
/// loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    pub identity: Option<Identity>,
    pub connection_state: ConnectionState,
    pub messages: Arc<Vec<Message>>,
    pub profiles: Arc<BTreeMap<Identity, ProfileEntry>>,
    pub presence: Vec<PresenceEntry>,
}

impl SessionView {
    /// `true` when `message` was sent by the logged-in user.
    #[must_use]
    pub fn is_own(&self, message: &Message) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|identity| message.is_from(identity))
    }

    /// Cached avatar for `username`. `None` until the profile is fetched,
    /// `Some("")` when the user has none.
    #[must_use]
    pub fn avatar_for(&self, username: &str) -> Option<&str> {
        self.profiles
            .get(username)
            .map(|entry| entry.avatar.as_str())
    }

    #[must_use]
    pub fn can_send(&self) -> bool {
        self.connection_state.can_send()
    }
}
