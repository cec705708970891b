use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};

use super::Timestamp;

/// An opaque username. Two identities are the same user only on exact match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wraps a username.
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    /// The raw username.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the username is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A chat message in the single global room. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub sender: Identity,
    /// Message body.
    pub text: String,
    /// Server-assigned for history, send/arrival time for live traffic.
    pub timestamp: Timestamp,
}

impl Message {
    /// Builds a message with an explicit timestamp.
    pub fn new(sender: impl Into<Identity>, text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            timestamp,
        }
    }

    /// Builds a message stamped with the current time.
    pub fn now(sender: impl Into<Identity>, text: impl Into<String>) -> Self {
        Self::new(sender, text, Timestamp::now())
    }

    /// Whether `identity` authored this message.
    #[must_use]
    pub fn is_from(&self, identity: &Identity) -> bool {
        self.sender == *identity
    }
}

/// The JSON object exchanged over the live channel.
///
/// The reference server relays `{sender, text}` without a timestamp, so the
/// field is optional on the way in and always written on the way out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveFrame {
    /// Author of the frame.
    pub sender: Identity,
    /// Message body.
    pub text: String,
    /// Send time, when the peer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl LiveFrame {
    /// Converts the frame into a [`Message`], stamping `arrival` when the
    /// frame carried no timestamp of its own.
    #[must_use]
    pub fn into_message(self, arrival: Timestamp) -> Message {
        Message {
            sender: self.sender,
            text: self.text,
            timestamp: self.timestamp.unwrap_or(arrival),
        }
    }
}

impl From<&Message> for LiveFrame {
    fn from(message: &Message) -> Self {
        Self {
            sender: message.sender.clone(),
            text: message.text.clone(),
            timestamp: Some(message.timestamp),
        }
    }
}
