//! In-memory collaborators for driving a `SessionManager` end to end.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use client::{
    ChatApi, LiveChannel, SessionError, SessionManager, SessionResult, SessionSettings,
    SessionView,
    transport::{LiveConnection, ReconnectPolicy, TransportSettings},
};
use futures::{SinkExt, channel::mpsc as frames};
use shared::models::{
    Credential, Identity, LiveFrame, Message, PresenceEntry, ProfileResponse,
};
use tokio::sync::{Semaphore, mpsc, watch};

pub const WAIT: Duration = Duration::from_secs(5);

/// Scripted backend. Every knob can be flipped while a session runs.
#[derive(Default)]
pub struct FakeApi {
    pub history: Mutex<Vec<Message>>,
    pub fail_history: AtomicBool,
    pub presence: Mutex<Vec<PresenceEntry>>,
    pub fail_presence: AtomicBool,
    pub presence_calls: AtomicUsize,
    pub avatars: Mutex<HashMap<String, String>>,
    pub profile_calls: Mutex<HashMap<String, usize>>,
    pub profile_gate: Mutex<Option<Arc<Semaphore>>>,
    pub persisted: Mutex<Vec<Message>>,
    pub fail_persist: AtomicBool,
}

impl FakeApi {
    pub fn profile_calls_for(&self, username: &str) -> usize {
        self.profile_calls
            .lock()
            .unwrap()
            .get(username)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_profile_calls(&self) -> usize {
        self.profile_calls.lock().unwrap().values().sum()
    }

    /// Holds every profile fetch until permits are added to the returned gate.
    pub fn gate_profiles(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.profile_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn fetch_history(&self, _credential: &Credential) -> SessionResult<Vec<Message>> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(SessionError::fetch_status("messages/", 500, "history down"));
        }
        Ok(self.history.lock().unwrap().clone())
    }

    async fn fetch_profile(
        &self,
        _credential: &Credential,
        username: &Identity,
    ) -> SessionResult<ProfileResponse> {
        *self
            .profile_calls
            .lock()
            .unwrap()
            .entry(username.as_str().to_string())
            .or_default() += 1;

        let gate = self.profile_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|err| SessionError::fetch("get_user_profile/", err.to_string()))?
                .forget();
        }

        Ok(ProfileResponse {
            profile_picture: self.avatars.lock().unwrap().get(username.as_str()).cloned(),
            bio: None,
        })
    }

    async fn fetch_presence(&self, _credential: &Credential) -> SessionResult<Vec<PresenceEntry>> {
        self.presence_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_presence.load(Ordering::SeqCst) {
            return Err(SessionError::fetch_status("active_users/", 503, "presence down"));
        }
        Ok(self.presence.lock().unwrap().clone())
    }

    async fn persist_message(&self, _credential: &Credential, message: &Message) -> SessionResult<()> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(SessionError::fetch_status("messages/", 500, "write failed"));
        }
        self.persisted.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dial {
    /// Hand out a connection and give the test its server end.
    Accept,
    /// Fail immediately.
    Refuse,
    /// Never finish dialing.
    Hang,
}

/// The far side of an accepted fake connection.
pub struct ServerEnd {
    /// Frames the client wrote.
    pub received: frames::UnboundedReceiver<String>,
    /// Frames to push to the client. Dropping it drops the connection.
    pub push: frames::UnboundedSender<SessionResult<String>>,
}

impl ServerEnd {
    pub fn push_message(&self, message: &Message) {
        let frame = serde_json::to_string(&LiveFrame::from(message)).unwrap();
        self.push_raw(&frame);
    }

    pub fn push_raw(&self, frame: &str) {
        self.push.unbounded_send(Ok(frame.to_string())).unwrap();
    }
}

pub struct FakeChannel {
    pub dial: Mutex<Dial>,
    pub connects: AtomicUsize,
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

impl FakeChannel {
    pub fn new(dial: Dial) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, servers) = mpsc::unbounded_channel();
        let channel = Arc::new(Self {
            dial: Mutex::new(dial),
            connects: AtomicUsize::new(0),
            accepted,
        });
        (channel, servers)
    }

    pub fn set_dial(&self, dial: Dial) {
        *self.dial.lock().unwrap() = dial;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveChannel for FakeChannel {
    async fn connect(&self, _credential: &Credential) -> SessionResult<LiveConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let dial = *self.dial.lock().unwrap();
        match dial {
            Dial::Refuse => Err(SessionError::Connection("connection refused".to_string())),
            Dial::Hang => std::future::pending().await,
            Dial::Accept => {
                let (to_server, received) = frames::unbounded::<String>();
                let (push, from_server) = frames::unbounded::<SessionResult<String>>();
                let _ = self.accepted.send(ServerEnd { received, push });
                let sink = to_server
                    .sink_map_err(|err| SessionError::Connection(err.to_string()));
                Ok(LiveConnection::new(Box::pin(sink), Box::pin(from_server)))
            }
        }
    }
}

pub fn settings() -> SessionSettings {
    SessionSettings {
        presence_interval: Duration::from_millis(50),
        transport: TransportSettings {
            connect_timeout: Duration::from_secs(2),
            send_timeout: Duration::from_secs(1),
            reconnect: ReconnectPolicy::new(
                3,
                Duration::from_millis(20),
                Duration::from_millis(100),
            ),
        },
    }
}

pub fn alice() -> Credential {
    Credential::new("alice-token", "alice")
}

pub fn manager(api: &Arc<FakeApi>, channel: &Arc<FakeChannel>) -> SessionManager {
    SessionManager::new(
        Arc::clone(api) as Arc<dyn ChatApi>,
        Arc::clone(channel) as Arc<dyn LiveChannel>,
        settings(),
    )
}

/// Waits for a snapshot satisfying `predicate`, failing the test after [`WAIT`].
pub async fn wait_for_view<F>(views: &mut watch::Receiver<SessionView>, predicate: F) -> SessionView
where
    F: FnMut(&SessionView) -> bool,
{
    tokio::time::timeout(WAIT, views.wait_for(predicate))
        .await
        .expect("timed out waiting for session view")
        .expect("session view channel closed")
        .clone()
}

pub async fn next_server(servers: &mut mpsc::UnboundedReceiver<ServerEnd>) -> ServerEnd {
    tokio::time::timeout(WAIT, servers.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("channel dropped")
}
