//! Error types for the campus client.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, API, and input validation errors.

use std::fmt;
use thiserror::Error;

/// The unified error type for campus client operations.
///
/// This error type covers all possible failure modes in the library,
/// with explicit variants to allow callers to handle specific cases.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (invalid credentials, expired session).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// API errors (non-auth 4xx/5xx responses).
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// Input validation errors (invalid base URL, malformed values).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Durable credential storage failed (I/O or corrupt file).
    #[error("credential storage error: {0}")]
    Storage(String),
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Login rejected: wrong email or password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Registration rejected: the email is already taken.
    #[error("email already registered")]
    EmailTaken,

    /// Registration rejected: the server refused the submitted fields.
    #[error("validation failed: {detail}")]
    Validation { detail: String },

    /// The session could not be renewed. The credential store has been
    /// cleared and the user must log in again.
    #[error("session expired")]
    Expired,
}

/// An error response from the API (4xx/5xx other than the auth paths).
///
/// Carries the HTTP status and the server-provided `detail` message
/// when one was present in the response body.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Human-readable detail from the server, if any.
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(status: u16, detail: Option<String>) -> Self {
        Self { status, detail }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref detail) = self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
