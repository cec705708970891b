use std::path::Path;

use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::de::DeserializeOwned;
use shared::{
    config::ClientConfig,
    models::{
        ActiveUser, Credential, Identity, Message, PresenceEntry, ProfileResponse, SignupRequest,
        SignupResponse, TokenResponse, UpdateProfileRequest, UploadAvatarResponse,
    },
};
use tracing::debug;
use url::Url;

use super::ChatApi;
use crate::error::{SessionError, SessionResult};

const TOKEN: &str = "token/";
const SIGNUP: &str = "signup/";
const MESSAGES: &str = "messages/";
const PROFILE: &str = "get_user_profile/";
const ACTIVE_USERS: &str = "active_users/";
const UPDATE_PROFILE: &str = "update_profile/";
const UPLOAD_AVATAR: &str = "upload_profile_picture/";

/// `reqwest` implementation of the backend collaborators, plus the account
/// calls the CLI needs (login, signup, profile edits).
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    /// Wraps an existing client. A missing trailing slash on `base` is added
    /// so relative endpoints join underneath it.
    #[must_use]
    pub fn new(client: Client, mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { client, base }
    }

    /// Builds a client with the configured request deadline.
    ///
    /// # Errors
    /// Fails when the TLS backend cannot be initialised.
    pub fn from_config(config: &ClientConfig) -> SessionResult<Self> {
        let client = Client::builder()
            .user_agent("parley-cli")
            .timeout(config.connect_timeout())
            .build()
            .map_err(|err| SessionError::fetch("client", err.to_string()))?;
        Ok(Self::new(client, config.server_url.clone()))
    }

    /// The resolved base URL.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> SessionResult<Url> {
        self.base
            .join(path)
            .map_err(|err| SessionError::fetch(path, format!("invalid endpoint: {err}")))
    }

    /// Exchanges a username and password for a session credential.
    ///
    /// # Errors
    /// [`SessionError::InvalidCredentials`] on 401, otherwise a fetch error.
    pub async fn authenticate(&self, username: &str, password: &str) -> SessionResult<Credential> {
        let response = send(
            TOKEN,
            self.client
                .post(self.endpoint(TOKEN)?)
                .form(&[("username", username), ("password", password)]),
        )
        .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SessionError::InvalidCredentials);
        }
        let token: TokenResponse = decode(TOKEN, response).await?;
        debug!(username, "authenticated");
        Ok(Credential::new(token.access_token, username))
    }

    /// Registers a new account.
    ///
    /// # Errors
    /// [`SessionError::UsernameTaken`] on 400, otherwise a fetch error.
    pub async fn signup(&self, username: &str, password: &str) -> SessionResult<SignupResponse> {
        let request = SignupRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = send(
            SIGNUP,
            self.client.post(self.endpoint(SIGNUP)?).json(&request),
        )
        .await?;
        if response.status() == StatusCode::BAD_REQUEST {
            return Err(SessionError::UsernameTaken);
        }
        decode(SIGNUP, response).await
    }

    /// Replaces the biography of `username`.
    ///
    /// # Errors
    /// Any non-success response.
    pub async fn update_bio(
        &self,
        credential: &Credential,
        username: &Identity,
        bio: &str,
    ) -> SessionResult<()> {
        let request = UpdateProfileRequest {
            username: username.clone(),
            bio: bio.to_string(),
        };
        let response = send(
            UPDATE_PROFILE,
            self.client
                .post(self.endpoint(UPDATE_PROFILE)?)
                .bearer_auth(&credential.token)
                .json(&request),
        )
        .await?;
        ensure_success(UPDATE_PROFILE, response).await.map(drop)
    }

    /// Uploads a new avatar image and returns where it is served from.
    ///
    /// # Errors
    /// The file cannot be read, or the upload is rejected.
    pub async fn upload_avatar(
        &self,
        credential: &Credential,
        username: &Identity,
        path: &Path,
    ) -> SessionResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| SessionError::fetch(UPLOAD_AVATAR, format!("{}: {err}", path.display())))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("avatar")
            .to_string();
        let form = Form::new()
            .text("username", username.to_string())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let response = send(
            UPLOAD_AVATAR,
            self.client
                .post(self.endpoint(UPLOAD_AVATAR)?)
                .bearer_auth(&credential.token)
                .multipart(form),
        )
        .await?;
        let uploaded: UploadAvatarResponse = decode(UPLOAD_AVATAR, response).await?;
        Ok(uploaded.profile_picture_url)
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn fetch_history(&self, credential: &Credential) -> SessionResult<Vec<Message>> {
        let response = send(
            MESSAGES,
            self.client
                .get(self.endpoint(MESSAGES)?)
                .bearer_auth(&credential.token),
        )
        .await?;
        decode(MESSAGES, response).await
    }

    async fn fetch_profile(
        &self,
        credential: &Credential,
        username: &Identity,
    ) -> SessionResult<ProfileResponse> {
        let response = send(
            PROFILE,
            self.client
                .get(self.endpoint(PROFILE)?)
                .bearer_auth(&credential.token)
                .query(&[("username", username.as_str())]),
        )
        .await?;
        decode(PROFILE, response).await
    }

    async fn fetch_presence(&self, credential: &Credential) -> SessionResult<Vec<PresenceEntry>> {
        let response = send(
            ACTIVE_USERS,
            self.client
                .get(self.endpoint(ACTIVE_USERS)?)
                .bearer_auth(&credential.token),
        )
        .await?;
        let users: Vec<ActiveUser> = decode(ACTIVE_USERS, response).await?;
        Ok(users.into_iter().map(PresenceEntry::from).collect())
    }

    async fn persist_message(
        &self,
        credential: &Credential,
        message: &Message,
    ) -> SessionResult<()> {
        let response = send(
            MESSAGES,
            self.client
                .post(self.endpoint(MESSAGES)?)
                .bearer_auth(&credential.token)
                .json(message),
        )
        .await?;
        ensure_success(MESSAGES, response).await.map(drop)
    }
}

async fn send(endpoint: &str, request: RequestBuilder) -> SessionResult<Response> {
    request
        .send()
        .await
        .map_err(|err| SessionError::fetch(endpoint, err.to_string()))
}

async fn ensure_success(endpoint: &str, response: Response) -> SessionResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    Err(SessionError::fetch_status(endpoint, status.as_u16(), message))
}

async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> SessionResult<T> {
    ensure_success(endpoint, response)
        .await?
        .json()
        .await
        .map_err(|err| SessionError::fetch(endpoint, format!("invalid response body: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_gains_trailing_slash() {
        let api = HttpApi::new(Client::new(), Url::parse("http://chat.example/api").unwrap());
        assert_eq!(api.base().as_str(), "http://chat.example/api/");
        assert_eq!(
            api.endpoint(MESSAGES).unwrap().as_str(),
            "http://chat.example/api/messages/"
        );
    }

    #[test]
    fn test_from_config_uses_server_url() {
        let config = ClientConfig::with_defaults();
        let api = HttpApi::from_config(&config).unwrap();
        assert_eq!(api.base().as_str(), "http://127.0.0.1:8000/");
    }
}
