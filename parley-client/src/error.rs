//! # Session Error Types

use shared::config::ConfigError;
use thiserror::Error;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Everything the session core can fail with.
///
/// Only [`SessionError::NotConnected`] and [`SessionError::EmptyMessage`] are
/// surfaced by `send`; collaborator failures are absorbed by the session and
/// logged.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The live transport never opened or dropped.
    #[error("connection error: {0}")]
    Connection(String),

    /// An inbound frame could not be turned into a message.
    #[error("failed to decode live frame: {0}")]
    Decode(String),

    /// A request/response collaborator call failed.
    #[error("request to {endpoint} failed: {message}")]
    Fetch {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// A send was attempted while the transport was not open.
    #[error("live transport is not connected")]
    NotConnected,

    /// `start` was called on a running session.
    #[error("session already started")]
    AlreadyStarted,

    /// No credential was available to start a session.
    #[error("no credential available; log in first")]
    Unauthenticated,

    /// The server rejected the username/password pair.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Signup collided with an existing account.
    #[error("username already taken")]
    UsernameTaken,

    /// The message body was blank.
    #[error("message text is empty")]
    EmptyMessage,

    /// Client configuration could not be resolved.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl SessionError {
    /// A collaborator failure with no HTTP status (network, decode, I/O).
    pub fn fetch<E: Into<String>, M: Into<String>>(endpoint: E, message: M) -> Self {
        Self::Fetch {
            endpoint: endpoint.into(),
            status: None,
            message: message.into(),
        }
    }

    /// A collaborator failure carrying the response status.
    pub fn fetch_status<E: Into<String>, M: Into<String>>(
        endpoint: E,
        status: u16,
        message: M,
    ) -> Self {
        Self::Fetch {
            endpoint: endpoint.into(),
            status: Some(status),
            message: message.into(),
        }
    }

    /// Whether this is a collaborator failure.
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = SessionError::fetch_status("messages/", 503, "service unavailable");
        assert_eq!(
            err.to_string(),
            "request to messages/ failed: service unavailable"
        );
        assert!(err.is_fetch());
    }

    #[test]
    fn test_not_connected_display() {
        assert_eq!(
            SessionError::NotConnected.to_string(),
            "live transport is not connected"
        );
        assert!(!SessionError::NotConnected.is_fetch());
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: SessionError = ConfigError::Invalid(vec!["a".into(), "b".into()]).into();
        assert_eq!(err.to_string(), "invalid configuration: a; b");
    }
}
