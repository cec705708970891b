//! # Presence Poller
//!
//! A cancellable periodic task that refreshes the active-user list. Its
//! lifetime is bounded by the handle: stopping or dropping it cancels the
//! timer.

use std::{sync::Arc, time::Duration};

use shared::models::{Credential, PresenceEntry};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ChatApi;

/// Handle to a running presence poll loop.
#[derive(Debug)]
pub struct PresencePoller {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PresencePoller {
    /// Polls every `period`, starting immediately. Each successful tick posts
    /// the full list to `updates`; a failed tick posts nothing.
    pub fn spawn(
        api: Arc<dyn ChatApi>,
        credential: Credential,
        period: Duration,
        updates: mpsc::UnboundedSender<Vec<PresenceEntry>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let fetched = tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    fetched = api.fetch_presence(&credential) => fetched,
                };

                match fetched {
                    Ok(entries) => {
                        debug!(active = entries.len(), "presence refreshed");
                        if updates.send(entries).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(error = %err, "presence poll failed; keeping previous list"),
                }
            }
            debug!("presence poller stopped");
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// `true` until the loop has been stopped or has exited.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the timer and waits for the loop to exit. Safe to repeat.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "presence poller ended abnormally");
            }
        }
    }
}

impl Drop for PresencePoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
