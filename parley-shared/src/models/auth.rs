use serde::{Deserialize, Serialize};
use std::fmt;

use super::Identity;

/// The authenticated identity a session runs under.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token; also the live channel's `token` query parameter.
    pub token: String,
    /// The username the token was issued to.
    pub username: Identity,
}

impl Credential {
    /// Pairs a token with its username.
    pub fn new(token: impl Into<String>, username: impl Into<Identity>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
        }
    }
}

// Tokens never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .finish()
    }
}

/// Response body of `POST token/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Issued bearer token.
    pub access_token: String,
    /// Always `bearer` for the reference server.
    pub token_type: String,
}

/// Request body of `POST signup/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupRequest {
    /// Desired username.
    pub username: String,
    /// Plain-text password; hashed server side.
    pub password: String,
}

/// Response body of `POST signup/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupResponse {
    /// Server-side user id.
    pub id: i64,
    /// The registered username.
    pub username: String,
    /// Human readable confirmation.
    pub message: String,
}
