use serde::{Deserialize, Serialize};

use super::Identity;

/// A populated profile-cache entry. An empty `avatar` means the user has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// The user this entry describes.
    pub username: Identity,
    /// Avatar URI, or empty.
    pub avatar: String,
}

impl ProfileEntry {
    /// `true` when the user has an avatar.
    #[must_use]
    pub fn has_avatar(&self) -> bool {
        !self.avatar.is_empty()
    }
}

/// Response body of `GET get_user_profile/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResponse {
    /// Avatar URI; absent or null when the user never uploaded one.
    #[serde(default)]
    pub profile_picture: Option<String>,
    /// Free-form biography.
    #[serde(default)]
    pub bio: Option<String>,
}

impl ProfileResponse {
    /// The avatar reference with missing data folded to an empty string.
    #[must_use]
    pub fn avatar(&self) -> String {
        self.profile_picture.clone().unwrap_or_default()
    }
}

/// Request body of `POST update_profile/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    /// Profile owner.
    pub username: Identity,
    /// New biography.
    pub bio: String,
}

/// Response body of `POST upload_profile_picture/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadAvatarResponse {
    /// Where the uploaded picture is now served from.
    pub profile_picture_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_response_missing_fields_default() {
        let response: ProfileResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.avatar(), "");
        assert!(response.bio.is_none());
    }

    #[test]
    fn test_profile_response_null_picture_is_empty_avatar() {
        let response: ProfileResponse =
            serde_json::from_str(r#"{"profile_picture":null,"bio":"hey"}"#).unwrap();
        assert_eq!(response.avatar(), "");
        assert_eq!(response.bio.as_deref(), Some("hey"));
    }

    #[test]
    fn test_profile_entry_has_avatar() {
        let empty = ProfileEntry {
            username: Identity::from("bob"),
            avatar: String::new(),
        };
        let set = ProfileEntry {
            username: Identity::from("bob"),
            avatar: "https://cdn.example/bob.png".to_string(),
        };

        assert!(!empty.has_avatar());
        assert!(set.has_avatar());
    }
}
