//! Endpoint paths and request/response types for the campus API.

use serde::{Deserialize, Serialize};

use campus_core::{Role, User};

// ============================================================================
// Endpoint Paths (relative to /api/v1)
// ============================================================================

/// POST: exchange email and password for a token pair.
pub const LOGIN: &str = "/auth/login";

/// POST: create an account, returning a token pair.
pub const REGISTER: &str = "/auth/register";

/// POST: exchange a refresh token for a new token pair.
pub const REFRESH: &str = "/auth/refresh";

/// POST: revoke the refresh tokens of the current session.
pub const LOGOUT: &str = "/auth/logout";

/// GET: fetch the profile for the current access token.
pub const ME: &str = "/auth/me";

/// Path for a dialog's message collection.
pub fn dialog_messages(dialog_id: i64) -> String {
    format!("/dialogs/{}/messages", dialog_id)
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for login.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Request body for register.
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
}

/// Request body for refresh.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Response from login, register and refresh.
///
/// `user` is present on login/register and absent on refresh.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<User>,
}

/// Request body for posting a message to a dialog.
#[derive(Debug, Serialize)]
pub struct MessageCreate<'a> {
    pub content: &'a str,
}

/// Error body shape: `{"detail": ...}`.
///
/// `detail` is usually a string, but validation errors carry structured
/// data; both are preserved.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Flatten `detail` into a displayable message.
    pub fn detail_message(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}
