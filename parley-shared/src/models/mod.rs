pub mod auth;
pub mod connection;
pub mod message;
pub mod presence;
pub mod profile;
pub mod timestamp;

pub use auth::{Credential, SignupRequest, SignupResponse, TokenResponse};
pub use connection::ConnectionState;
pub use message::{Identity, LiveFrame, Message};
pub use presence::{ActiveUser, PresenceEntry};
pub use profile::{ProfileEntry, ProfileResponse, UpdateProfileRequest, UploadAvatarResponse};
pub use timestamp::Timestamp;
