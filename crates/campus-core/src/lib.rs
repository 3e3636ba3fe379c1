//! campus-core - Core types for the campus LMS client.

pub mod auth;
pub mod chat;
pub mod error;
pub mod types;
pub mod user;

pub use auth::{AccessToken, Credentials, RefreshToken, TokenPair};
pub use chat::{ChatMessage, OutgoingMessage};
pub use error::{ApiError, AuthError, Error, InvalidInputError, TransportError};
pub use types::ApiUrl;
pub use user::{Role, User};

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
