//! # Live Transport
//!
//! One persistent duplex connection per session. A background task owns the
//! socket, walks the connection state machine, reconnects with bounded
//! backoff and reports everything on a single event sink.

pub mod backoff;
pub mod codec;
pub mod websocket;

use std::{fmt, pin::Pin, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use shared::{
    config::ClientConfig,
    models::{Credential, Message, Timestamp},
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use backoff::ReconnectPolicy;
pub use shared::models::ConnectionState;

use crate::error::{SessionError, SessionResult};

/// Outbound half of a live connection: accepts serialized frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = SessionError> + Send>>;

/// Inbound half of a live connection.
///
/// `Err(SessionError::Decode(_))` items are dropped frames; any other error
/// ends the connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = SessionResult<String>> + Send>>;

/// An established connection, split into its two directions.
pub struct LiveConnection {
    /// Frames to the server.
    pub sink: FrameSink,
    /// Frames from the server.
    pub stream: FrameStream,
}

impl LiveConnection {
    /// Pairs the two halves.
    #[must_use]
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

impl fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConnection").finish_non_exhaustive()
    }
}

/// Dials the live channel for a credential.
#[async_trait]
pub trait LiveChannel: Send + Sync {
    /// Opens one connection keyed to `credential`.
    async fn connect(&self, credential: &Credential) -> SessionResult<LiveConnection>;
}

/// What the transport reports to its subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection state machine moved.
    State(ConnectionState),
    /// A decoded inbound message, in arrival order.
    Incoming(Message),
    /// An inbound frame was dropped.
    DecodeFailed(String),
}

/// Deadlines and reconnect policy for a [`LiveTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    /// Upper bound on one connect attempt.
    pub connect_timeout: Duration,
    /// Upper bound on writing one frame.
    pub send_timeout: Duration,
    /// Retry schedule after a failed or dropped connection.
    pub reconnect: ReconnectPolicy,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from_config(&ClientConfig::with_defaults())
    }
}

impl TransportSettings {
    /// Reads the transport section of the client configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            send_timeout: config.send_timeout(),
            reconnect: ReconnectPolicy::from(&config.reconnect),
        }
    }
}

struct Outbound {
    frame: String,
    reply: oneshot::Sender<SessionResult<()>>,
}

/// Handle to the background connection task.
#[derive(Debug)]
pub struct LiveTransport {
    commands: mpsc::Sender<Outbound>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbound").field("frame", &self.frame).finish()
    }
}

impl LiveTransport {
    /// Starts connecting immediately and returns the handle. Events are
    /// delivered to `events` until the transport reaches `Closed`.
    pub fn spawn(
        channel: Arc<dyn LiveChannel>,
        credential: Credential,
        settings: TransportSettings,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();

        let driver = Driver {
            channel,
            credential,
            settings,
            commands: commands_rx,
            reporter: Reporter {
                state: state_tx,
                events,
            },
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run());

        Self {
            commands: commands_tx,
            state: state_rx,
            cancel,
            task: Some(task),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Transmits one message over the open connection.
    ///
    /// # Errors
    /// [`SessionError::NotConnected`] unless the transport is `Open`;
    /// [`SessionError::Connection`] if the write fails or times out.
    pub async fn send(&self, message: &Message) -> SessionResult<()> {
        if !self.state().can_send() {
            return Err(SessionError::NotConnected);
        }
        let frame = codec::encode_frame(message)?;
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Outbound { frame, reply })
            .await
            .map_err(|_| SessionError::NotConnected)?;
        response.await.map_err(|_| SessionError::NotConnected)?
    }

    /// Closes the connection and waits for the task to finish. Safe to call
    /// more than once.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(error = %err, "live transport task ended abnormally");
            }
        }
    }
}

impl Drop for LiveTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Reporter {
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Reporter {
    fn publish(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        debug!(from = %previous, to = %next, "live transport state change");
        let _ = self.events.send(TransportEvent::State(next));
    }

    fn deliver(&self, text: &str) {
        match codec::decode_frame(text, Timestamp::now()) {
            Ok(message) => {
                let _ = self.events.send(TransportEvent::Incoming(message));
            }
            Err(err) => self.dropped(err.to_string()),
        }
    }

    fn dropped(&self, reason: String) {
        warn!(%reason, "dropping undecodable live frame");
        let _ = self.events.send(TransportEvent::DecodeFailed(reason));
    }
}

enum PumpExit {
    Cancelled,
    Dropped(String),
}

struct Driver {
    channel: Arc<dyn LiveChannel>,
    credential: Credential,
    settings: TransportSettings,
    commands: mpsc::Receiver<Outbound>,
    reporter: Reporter,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        let mut attempt = 0_u32;
        loop {
            self.reporter.publish(ConnectionState::Connecting);
            let Some(connection) = self.connect().await else {
                self.shutdown(None).await;
                return;
            };

            match connection {
                Ok(connection) => {
                    attempt = 0;
                    info!(user = %self.credential.username, "live transport open");
                    self.reporter.publish(ConnectionState::Open);
                    match self.pump(connection).await {
                        PumpExit::Cancelled => return,
                        PumpExit::Dropped(reason) => {
                            warn!(%reason, "live connection dropped");
                        }
                    }
                }
                Err(err) => warn!(error = %err, "live connect failed"),
            }

            self.reporter.publish(ConnectionState::Errored);
            self.reject_pending();
            attempt += 1;
            let Some(delay) = self.settings.reconnect.delay_for(attempt) else {
                warn!(
                    attempts = attempt - 1,
                    "reconnect budget exhausted; live transport closed"
                );
                self.reporter.publish(ConnectionState::Closed);
                return;
            };
            debug!(attempt, ?delay, "scheduling reconnect");
            if !self.backoff(delay).await {
                self.shutdown(None).await;
                return;
            }
        }
    }

    /// `None` when cancelled while dialing.
    async fn connect(&mut self) -> Option<SessionResult<LiveConnection>> {
        let Self {
            channel,
            credential,
            settings,
            commands,
            cancel,
            ..
        } = self;
        let dial = timeout(settings.connect_timeout, channel.connect(credential));
        tokio::pin!(dial);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                outcome = &mut dial => {
                    return Some(outcome.unwrap_or_else(|_| {
                        Err(SessionError::Connection(format!(
                            "connect timed out after {:?}",
                            settings.connect_timeout
                        )))
                    }));
                }
                Some(outbound) = commands.recv() => {
                    let _ = outbound.reply.send(Err(SessionError::NotConnected));
                }
            }
        }
    }

    async fn pump(&mut self, connection: LiveConnection) -> PumpExit {
        let LiveConnection {
            mut sink,
            mut stream,
        } = connection;
        let send_timeout = self.settings.send_timeout;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.shutdown(Some(&mut sink)).await;
                    return PumpExit::Cancelled;
                }
                frame = stream.next() => match frame {
                    Some(Ok(text)) => self.reporter.deliver(&text),
                    Some(Err(SessionError::Decode(reason))) => self.reporter.dropped(reason),
                    Some(Err(err)) => return PumpExit::Dropped(err.to_string()),
                    None => return PumpExit::Dropped("server closed the connection".to_string()),
                },
                command = self.commands.recv() => {
                    let Some(Outbound { frame, reply }) = command else {
                        self.shutdown(Some(&mut sink)).await;
                        return PumpExit::Cancelled;
                    };
                    let result = match timeout(send_timeout, sink.send(frame)).await {
                        Ok(result) => result,
                        Err(_) => Err(SessionError::Connection(format!(
                            "send timed out after {send_timeout:?}"
                        ))),
                    };
                    let failure = result.as_ref().err().map(ToString::to_string);
                    let _ = reply.send(result);
                    if let Some(reason) = failure {
                        return PumpExit::Dropped(reason);
                    }
                }
            }
        }
    }

    /// Sleeps out a backoff delay, refusing sends meanwhile. `false` when
    /// cancelled first.
    async fn backoff(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return false,
                () = &mut sleep => return true,
                Some(outbound) = self.commands.recv() => {
                    let _ = outbound.reply.send(Err(SessionError::NotConnected));
                }
            }
        }
    }

    fn reject_pending(&mut self) {
        while let Ok(outbound) = self.commands.try_recv() {
            let _ = outbound.reply.send(Err(SessionError::NotConnected));
        }
    }

    async fn shutdown(&mut self, sink: Option<&mut FrameSink>) {
        self.reporter.publish(ConnectionState::Closing);
        if let Some(sink) = sink {
            if timeout(self.settings.send_timeout, sink.close()).await.is_err() {
                debug!("live close handshake timed out");
            }
        }
        self.reject_pending();
        self.reporter.publish(ConnectionState::Closed);
        info!("live transport closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RefusingChannel {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl LiveChannel for RefusingChannel {
        async fn connect(&self, _credential: &Credential) -> SessionResult<LiveConnection> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(SessionError::Connection("refused".to_string()))
        }
    }

    struct HangingChannel;

    #[async_trait]
    impl LiveChannel for HangingChannel {
        async fn connect(&self, _credential: &Credential) -> SessionResult<LiveConnection> {
            std::future::pending().await
        }
    }

    fn settings(max_attempts: u32) -> TransportSettings {
        TransportSettings {
            connect_timeout: Duration::from_secs(1),
            send_timeout: Duration::from_secs(1),
            reconnect: ReconnectPolicy::new(
                max_attempts,
                Duration::from_millis(100),
                Duration::from_millis(400),
            ),
        }
    }

    async fn drain_states(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> Vec<ConnectionState> {
        let mut states = Vec::new();
        while let Some(event) = rx.recv().await {
            if let TransportEvent::State(state) = event {
                states.push(state);
                if state == ConnectionState::Closed {
                    break;
                }
            }
        }
        states
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connects_retry_until_budget_is_spent() {
        let channel = Arc::new(RefusingChannel {
            attempts: AtomicUsize::new(0),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = LiveTransport::spawn(
            channel.clone(),
            Credential::new("t", "alice"),
            settings(2),
            tx,
        );

        let states = drain_states(&mut rx).await;

        assert_eq!(channel.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Errored,
                ConnectionState::Connecting,
                ConnectionState::Errored,
                ConnectionState::Connecting,
                ConnectionState::Errored,
                ConnectionState::Closed,
            ]
        );
        assert_eq!(transport.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_timeout_counts_as_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _transport = LiveTransport::spawn(
            Arc::new(HangingChannel),
            Credential::new("t", "alice"),
            settings(1),
            tx,
        );

        let states = drain_states(&mut rx).await;

        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Errored,
                ConnectionState::Connecting,
                ConnectionState::Errored,
                ConnectionState::Closed,
            ]
        );
    }

    #[tokio::test]
    async fn send_while_connecting_is_rejected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transport = LiveTransport::spawn(
            Arc::new(HangingChannel),
            Credential::new("t", "alice"),
            settings(1),
            tx,
        );

        let result = transport.send(&Message::now("alice", "hi")).await;
        assert!(matches!(result, Err(SessionError::NotConnected)));

        transport.close().await;
        transport.close().await;
        assert_eq!(transport.state(), ConnectionState::Closed);
    }
}
