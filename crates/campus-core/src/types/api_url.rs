//! API base URL type.

use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::{Error, InvalidInputError};

/// Path prefix for all REST endpoints.
const API_PREFIX: &str = "/api/v1";

/// A validated base URL for a campus API server.
///
/// Must use HTTPS, or HTTP for localhost during development and tests.
/// REST endpoints live under `/api/v1`; the chat WebSocket lives under
/// `/ws/chat` with the same host.
///
/// # Example
///
/// ```
/// use campus_core::ApiUrl;
///
/// let api = ApiUrl::new("https://lms.example.com").unwrap();
/// assert_eq!(api.endpoint("/auth/login"),
///            "https://lms.example.com/api/v1/auth/login");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApiUrl(Url);

impl ApiUrl {
    /// Create a new API URL from a string, validating the format.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not valid, uses a scheme other
    /// than http/https, or uses plain HTTP for a non-local host.
    pub fn new(s: impl AsRef<str>) -> Result<Self, Error> {
        let s = s.as_ref();
        let url = Url::parse(s).map_err(|e| InvalidInputError::ApiUrl {
            value: s.to_string(),
            reason: e.to_string(),
        })?;

        Self::validate(&url, s)?;

        // Normalize: remove trailing slash
        let normalized = if url.path() == "/" {
            let mut u = url.clone();
            u.set_path("");
            u
        } else {
            url
        };

        Ok(Self(normalized))
    }

    /// Returns the full URL for a REST endpoint path such as `/auth/login`.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.0.as_str().trim_end_matches('/');
        format!("{}{}{}", base, API_PREFIX, path)
    }

    /// Returns the chat WebSocket URL with the access token as a query
    /// parameter.
    ///
    /// The WebSocket handshake cannot carry custom headers from every
    /// client, so auth travels in the `token` parameter.
    pub fn ws_chat_url(&self, token: &str) -> String {
        let mut ws = self.0.clone();
        match ws.scheme() {
            "https" => ws.set_scheme("wss").expect("wss is a valid scheme"),
            _ => ws.set_scheme("ws").expect("ws is a valid scheme"),
        }
        ws.set_path("/ws/chat");
        ws.query_pairs_mut().clear().append_pair("token", token);
        ws.into()
    }

    /// Returns the base URL as a string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the host string.
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }

    fn validate(url: &Url, original: &str) -> Result<(), Error> {
        match url.scheme() {
            "https" => Ok(()),
            "http" => {
                let host = url.host_str().unwrap_or("");
                if host == "localhost" || host.starts_with("127.") || host == "[::1]" {
                    Ok(())
                } else {
                    Err(InvalidInputError::ApiUrl {
                        value: original.to_string(),
                        reason: "plain HTTP is only allowed for localhost".to_string(),
                    }
                    .into())
                }
            }
            other => Err(InvalidInputError::ApiUrl {
                value: original.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }
            .into()),
        }
    }
}

impl fmt::Display for ApiUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().trim_end_matches('/'))
    }
}

impl FromStr for ApiUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
