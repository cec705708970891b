//! # Session Manager
//!
//! The one coordination point the presentation layer talks to. `start` loads
//! history before opening the live transport, then hands every piece of
//! per-session state to a single actor task; readers get snapshots through a
//! [`watch`] channel.

mod actor;
mod state;

use std::{fmt, sync::Arc, time::Duration};

use shared::{
    config::{ClientConfig, ConfigError},
    models::{ConnectionState, Credential, Message},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use state::{SessionState, SessionView};

use self::actor::SessionActor;
use crate::{
    api::{ChatApi, HttpApi},
    error::{SessionError, SessionResult},
    history::HistoryLoader,
    presence::PresencePoller,
    profiles::ProfileFetcher,
    transport::{LiveChannel, LiveTransport, TransportSettings, websocket::WebSocketChannel},
};

/// Timing knobs for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Period of the presence poll.
    pub presence_interval: Duration,
    /// Live transport deadlines and reconnect policy.
    pub transport: TransportSettings,
}

impl SessionSettings {
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            presence_interval: config.presence_interval(),
            transport: TransportSettings::from_config(config),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&ClientConfig::with_defaults())
    }
}

struct ActiveSession {
    credential: Credential,
    transport: LiveTransport,
    poller: PresencePoller,
    cancel: CancellationToken,
    actor: Option<JoinHandle<()>>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owns at most one running session.
pub struct SessionManager {
    api: Arc<dyn ChatApi>,
    channel: Arc<dyn LiveChannel>,
    settings: SessionSettings,
    view: Arc<watch::Sender<SessionView>>,
    active: Option<ActiveSession>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("settings", &self.settings)
            .field("started", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// A stopped manager over the given collaborators.
    #[must_use]
    pub fn new(
        api: Arc<dyn ChatApi>,
        channel: Arc<dyn LiveChannel>,
        settings: SessionSettings,
    ) -> Self {
        let (view, _) = watch::channel(SessionView::default());
        Self {
            api,
            channel,
            settings,
            view: Arc::new(view),
            active: None,
        }
    }

    /// Wires the HTTP backend and the WebSocket channel from configuration.
    ///
    /// # Errors
    /// [`SessionError::InvalidConfig`] when the configuration does not
    /// validate, or a fetch error if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> SessionResult<Self> {
        config.validate().map_err(ConfigError::Invalid)?;
        let api = HttpApi::from_config(config)?;
        let channel = WebSocketChannel::new(config.ws_url.clone());
        Ok(Self::new(
            Arc::new(api),
            Arc::new(channel),
            SessionSettings::from_config(config),
        ))
    }

    /// Starts a session: history first, then the live transport, then the
    /// presence poller. A failed history load leaves the log empty.
    ///
    /// # Errors
    /// [`SessionError::AlreadyStarted`] if a session is running;
    /// [`SessionError::Unauthenticated`] without a usable credential.
    pub async fn start(&mut self, credential: Option<Credential>) -> SessionResult<()> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        let mut state = SessionState::new(credential)?;
        let credential = state.credential().clone();
        info!(user = %credential.username, "starting session");

        state.set_connection_state(ConnectionState::Connecting);
        self.view.send_replace(state.view());

        let history = HistoryLoader::new(Arc::clone(&self.api))
            .load_or_empty(&credential)
            .await;
        let pending_profiles = state.seed_history(history);

        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let transport = LiveTransport::spawn(
            Arc::clone(&self.channel),
            credential.clone(),
            self.settings.transport,
            transport_tx,
        );

        let (presence_tx, presence_rx) = mpsc::unbounded_channel();
        let poller = PresencePoller::spawn(
            Arc::clone(&self.api),
            credential.clone(),
            self.settings.presence_interval,
            presence_tx,
        );

        let (profile_tx, profile_rx) = mpsc::unbounded_channel();
        let fetcher = ProfileFetcher::new(Arc::clone(&self.api), credential.clone(), profile_tx);
        for username in pending_profiles {
            fetcher.fetch(username);
        }

        self.view.send_replace(state.view());

        let cancel = CancellationToken::new();
        let actor = SessionActor {
            state,
            fetcher,
            view: Arc::clone(&self.view),
            transport: transport_rx,
            presence: presence_rx,
            profiles: profile_rx,
            cancel: cancel.clone(),
        };
        let actor = tokio::spawn(actor.run());

        self.active = Some(ActiveSession {
            credential,
            transport,
            poller,
            cancel,
            actor: Some(actor),
        });
        Ok(())
    }

    /// Sends `text` as the logged-in user. The message is transmitted live
    /// and persisted concurrently; it reaches the log only through the
    /// server's echo.
    ///
    /// # Errors
    /// [`SessionError::NotConnected`] unless the live transport is open,
    /// [`SessionError::EmptyMessage`] for blank text, or the transport's
    /// error when the live write fails. A failed persist is only logged.
    pub async fn send(&self, text: &str) -> SessionResult<()> {
        let Some(active) = &self.active else {
            return Err(SessionError::NotConnected);
        };
        if !active.transport.state().can_send() {
            return Err(SessionError::NotConnected);
        }
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let message = Message::now(active.credential.username.clone(), text);
        let (transmitted, persisted) = tokio::join!(
            active.transport.send(&message),
            self.api.persist_message(&active.credential, &message),
        );
        if let Err(err) = persisted {
            warn!(error = %err, "message sent live but not persisted");
        }
        transmitted
    }

    /// Closes the transport, stops the poller and drops all per-session
    /// state. Profile fetches still in flight are discarded. Calling it on a
    /// stopped manager does nothing.
    pub async fn stop(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        active.transport.close().await;
        active.poller.stop().await;
        active.cancel.cancel();
        if let Some(actor) = active.actor.take() {
            if let Err(err) = actor.await {
                warn!(error = %err, "session actor ended abnormally");
            }
        }
        self.view.send_replace(SessionView::default());
        info!(user = %active.credential.username, "session stopped");
    }

    /// Current snapshot.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Change notifications; the receiver always holds the latest snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.subscribe()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.active
            .as_ref()
            .map_or(ConnectionState::Closed, |active| active.transport.state())
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }
}
