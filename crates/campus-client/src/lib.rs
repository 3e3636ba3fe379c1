//! campus-client - Authenticated HTTP pipeline and realtime chat channel
//! for the campus LMS API.
//!
//! The crate covers the session/token lifecycle: a credential store with
//! durable persistence, an HTTP pipeline with transparent single-flight
//! access token refresh, the login/register/logout facade, and the chat
//! WebSocket bootstrap.

mod chat;
pub mod endpoints;
mod http;
mod refresh;
mod session;
mod store;

pub use chat::{ChatChannel, ChatSender};
pub use http::ApiClient;
pub use refresh::RefreshCoordinator;
pub use session::Session;
pub use store::{CredentialStorage, CredentialStore, FileStorage, MemoryStorage};
