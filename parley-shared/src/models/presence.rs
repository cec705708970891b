use serde::{Deserialize, Serialize};

use super::Identity;

/// One row of the presence list, replaced wholesale on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// Active user.
    pub username: Identity,
    /// Avatar URI as reported by the presence endpoint, or empty.
    pub avatar: String,
}

/// Wire shape of an element of `GET active_users/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUser {
    /// Active user.
    pub username: Identity,
    /// Avatar URI, if any.
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl From<ActiveUser> for PresenceEntry {
    fn from(user: ActiveUser) -> Self {
        Self {
            username: user.username,
            avatar: user.profile_picture.unwrap_or_default(),
        }
    }
}
