use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the live transport.
///
/// `Connecting → Open → {Closing → Closed, Errored → Closed}`; with
/// reconnection enabled `Errored` may loop back to `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Dialing the server.
    Connecting,
    /// Frames flow in both directions.
    Open,
    /// Local close requested, waiting for the socket to wind down.
    Closing,
    /// The connection failed or dropped.
    Errored,
    /// Terminal. Also the state of a session that was never started.
    #[default]
    Closed,
}

impl ConnectionState {
    /// Sends are only valid while open.
    #[must_use]
    pub const fn can_send(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Canonical lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Errored => "errored",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_open_can_send() {
        assert!(ConnectionState::Open.can_send());
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Closing,
            ConnectionState::Errored,
            ConnectionState::Closed,
        ] {
            assert!(!state.can_send(), "{state} must not allow sends");
        }
    }

    #[test]
    fn test_default_is_closed() {
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
    }
}
