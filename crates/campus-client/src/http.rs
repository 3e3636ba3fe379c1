//! Authenticated HTTP pipeline for the campus API.
//!
//! One outbound request path shared by every resource call: attach the
//! bearer token from the credential store, detect a 401, drive a
//! single-flight refresh, and replay the request exactly once.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, trace, warn};

use campus_core::error::InvalidInputError;
use campus_core::{AccessToken, ApiError, ApiUrl, AuthError, Result};

use crate::endpoints::ErrorResponse;
use crate::refresh::RefreshCoordinator;
use crate::store::CredentialStore;

/// HTTP client for the campus API.
///
/// Holds its collaborators explicitly (no process-wide interceptor
/// state), so independent sessions never interfere.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: ApiUrl,
    store: Arc<CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a new client for the given API base URL and credential store.
    pub fn new(base: ApiUrl, store: Arc<CredentialStore>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("campus/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        let refresh = Arc::new(RefreshCoordinator::new(
            http.clone(),
            base.clone(),
            store.clone(),
        ));

        Self {
            http,
            base,
            store,
            refresh,
        }
    }

    /// Returns the API base URL this client is configured for.
    pub fn base(&self) -> &ApiUrl {
        &self.base
    }

    /// Returns the credential store this client reads from.
    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Make an authenticated GET request.
    #[instrument(skip(self), fields(base = %self.base))]
    pub async fn get<R>(&self, path: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let response = self.send_authed(Method::GET, path, None, None).await?;
        into_json(response).await
    }

    /// Make an authenticated GET request with query parameters.
    #[instrument(skip(self), fields(base = %self.base))]
    pub async fn get_with_query<R>(&self, path: &str, query: &[(&str, String)]) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let response = self
            .send_authed(Method::GET, path, None, Some(query))
            .await?;
        into_json(response).await
    }

    /// Make an authenticated POST request with a JSON body.
    #[instrument(skip(self, body), fields(base = %self.base))]
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let body = to_value(body)?;
        let response = self
            .send_authed(Method::POST, path, Some(&body), None)
            .await?;
        into_json(response).await
    }

    /// Make an authenticated PATCH request with a JSON body.
    #[instrument(skip(self, body), fields(base = %self.base))]
    pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let body = to_value(body)?;
        let response = self
            .send_authed(Method::PATCH, path, Some(&body), None)
            .await?;
        into_json(response).await
    }

    /// Make an authenticated DELETE request, expecting no content.
    #[instrument(skip(self), fields(base = %self.base))]
    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.send_authed(Method::DELETE, path, None, None).await?;
        expect_success(response).await
    }

    /// Make an unauthenticated POST request.
    ///
    /// Used for login, register and other endpoints reachable without a
    /// session. Never enters the 401 refresh path: a 401 here means the
    /// submitted credentials were rejected, not that a token expired.
    #[instrument(skip(self, body), fields(base = %self.base))]
    pub async fn post_public<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.base.endpoint(path);
        debug!(path, "public POST");
        let response = self.http.post(&url).json(body).send().await?;
        into_json(response).await
    }

    /// POST to an endpoint with the current access token, without the
    /// refresh/replay machinery. Used for best-effort calls such as the
    /// server-side logout.
    pub(crate) async fn post_authed_once(&self, path: &str) -> Result<()> {
        let token = self
            .store
            .get()
            .map(|pair| pair.access)
            .ok_or(AuthError::Expired)?;
        let url = self.base.endpoint(path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        expect_success(response).await
    }

    /// Issue a request with the current access token, refreshing and
    /// replaying once on 401.
    ///
    /// The replay is not a loop: the replayed response is returned
    /// directly, so a second 401 is terminal.
    async fn send_authed(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: Option<&[(&str, String)]>,
    ) -> Result<reqwest::Response> {
        let (tokens, generation) = self.store.snapshot();
        let token = tokens.map(|pair| pair.access);

        let response = self
            .build(method.clone(), path, token.as_ref(), body, query)
            .send()
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(path, "request unauthorized, refreshing session");
        let access = self.refresh.refresh(generation).await?;

        let retry = self
            .build(method, path, Some(&access), body, query)
            .send()
            .await?;

        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(path, "replayed request still unauthorized");
            return Err(AuthError::Expired.into());
        }

        Ok(retry)
    }

    fn build(
        &self,
        method: Method,
        path: &str,
        token: Option<&AccessToken>,
        body: Option<&Value>,
        query: Option<&[(&str, String)]>,
    ) -> reqwest::RequestBuilder {
        let url = self.base.endpoint(path);
        let mut req = self.http.request(method, &url);
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        if let Some(token) = token {
            req = req.bearer_auth(token.as_str());
        }
        req
    }
}

fn to_value<B: Serialize>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| {
        InvalidInputError::Other {
            message: format!("unserializable request body: {}", e),
        }
        .into()
    })
}

/// Parse a successful response body, or surface the server error.
pub(crate) async fn into_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
    let status = response.status();
    trace!(status = %status, "API response");

    if status.is_success() {
        let body = response.json::<R>().await?;
        Ok(body)
    } else {
        Err(parse_error_response(response).await.into())
    }
}

/// Discard a successful response body, or surface the server error.
pub(crate) async fn expect_success(response: reqwest::Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(parse_error_response(response).await.into())
    }
}

/// Parse an error response, surfacing the server `detail` when present.
pub(crate) async fn parse_error_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();

    match response.json::<ErrorResponse>().await {
        Ok(body) => ApiError::new(status, body.detail_message()),
        Err(_) => ApiError::new(status, None),
    }
}
