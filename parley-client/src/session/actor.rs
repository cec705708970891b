use std::sync::Arc;

use shared::models::PresenceEntry;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::state::{SessionState, SessionView};
use crate::{
    profiles::{ProfileFetcher, ProfileResolved},
    transport::TransportEvent,
};

/// The single mutation point for a running session. Transport events,
/// presence ticks and profile results are merged here one at a time, and
/// every change is published as a fresh [`SessionView`].
pub(super) struct SessionActor {
    pub(super) state: SessionState,
    pub(super) fetcher: ProfileFetcher,
    pub(super) view: Arc<watch::Sender<SessionView>>,
    pub(super) transport: mpsc::UnboundedReceiver<TransportEvent>,
    pub(super) presence: mpsc::UnboundedReceiver<Vec<PresenceEntry>>,
    pub(super) profiles: mpsc::UnboundedReceiver<ProfileResolved>,
    pub(super) cancel: CancellationToken,
}

impl SessionActor {
    pub(super) async fn run(mut self) {
        loop {
            let changed = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(event) = self.transport.recv() => self.on_transport(event),
                Some(entries) = self.presence.recv() => self.on_presence(entries),
                Some(resolved) = self.profiles.recv() => {
                    self.state.resolve_profile(resolved.username, resolved.outcome)
                }
                else => break,
            };
            if changed {
                self.publish();
            }
        }
        debug!(user = %self.state.identity(), "session actor stopped");
    }

    /// Applies one transport event; `false` when the view is unaffected.
    fn on_transport(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::State(state) => self.state.set_connection_state(state),
            TransportEvent::Incoming(message) => {
                if let Some(sender) = self.state.append(message) {
                    self.fetcher.fetch(sender);
                }
                true
            }
            TransportEvent::DecodeFailed(reason) => {
                debug!(%reason, "live frame skipped");
                false
            }
        }
    }

    /// A repeated list still retries profiles whose fetch failed, but only a
    /// different list is published.
    fn on_presence(&mut self, entries: Vec<PresenceEntry>) -> bool {
        let changed = self.state.presence() != entries.as_slice();
        for username in self.state.replace_presence(entries) {
            self.fetcher.fetch(username);
        }
        changed
    }

    fn publish(&self) {
        self.view.send_replace(self.state.view());
    }
}
