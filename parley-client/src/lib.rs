//! # Parley session core
//!
//! The [`session::SessionManager`] owns one live connection per login, seeds
//! its message log from history, keeps a deduplicating profile cache warm and
//! polls presence, merging everything through a single actor task.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

pub mod api;
pub mod error;
pub mod history;
pub mod presence;
pub mod profiles;
pub mod session;
pub mod transport;

pub use api::{ChatApi, HttpApi};
pub use error::{SessionError, SessionResult};
pub use session::{SessionManager, SessionSettings, SessionState, SessionView};
pub use transport::{ConnectionState, LiveChannel, LiveTransport, websocket::WebSocketChannel};
