//! Session facade: login, register, logout and current-user lookup.

use std::sync::{Arc, RwLock};

use tracing::{debug, info, instrument, warn};

use campus_core::error::InvalidInputError;
use campus_core::{
    ApiUrl, AuthError, ChatMessage, Credentials, Error, Result, Role, TokenPair, User,
};

use crate::chat::ChatChannel;
use crate::endpoints::{
    self, LoginRequest, MessageCreate, RegisterRequest, TokenResponse,
};
use crate::http::ApiClient;
use crate::store::CredentialStore;

/// An authenticated (or not-yet-authenticated) connection to a campus
/// API server.
///
/// The session owns the credential store writes for login/logout and
/// keeps a cached copy of the current user profile. It is cheap to
/// clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct Session {
    client: ApiClient,
    store: Arc<CredentialStore>,
    profile: Arc<RwLock<Option<User>>>,
}

impl Session {
    /// Create a session over the given base URL and credential store.
    ///
    /// The store may already hold persisted tokens from a previous run;
    /// call [`Session::current_user`] to validate them.
    pub fn new(base: ApiUrl, store: Arc<CredentialStore>) -> Self {
        let client = ApiClient::new(base, store.clone());
        Self {
            client,
            store,
            profile: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the underlying API client, for resource calls beyond the
    /// session itself.
    pub fn api(&self) -> &ApiClient {
        &self.client
    }

    /// Returns the cached user profile, if one has been fetched.
    pub fn cached_user(&self) -> Option<User> {
        self.profile.read().expect("profile lock poisoned").clone()
    }

    /// Exchange credentials for a token pair and profile.
    ///
    /// # Errors
    ///
    /// `AuthError::InvalidCredentials` if the server rejects the email
    /// or password.
    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    pub async fn login(&self, credentials: &Credentials) -> Result<User> {
        info!("logging in");

        let request = LoginRequest {
            email: credentials.email(),
            password: credentials.password(),
        };

        let response: TokenResponse = self
            .client
            .post_public(endpoints::LOGIN, &request)
            .await
            .map_err(map_login_error)?;

        self.install(response)
    }

    /// Create an account and log straight into it.
    ///
    /// `role` must be `Student` or `Teacher`; admin accounts are not
    /// self-service.
    ///
    /// # Errors
    ///
    /// `AuthError::EmailTaken` if the email is already registered,
    /// `AuthError::Validation` if the server refuses the fields.
    #[instrument(skip(self, credentials), fields(email = %credentials.email(), %role))]
    pub async fn register(
        &self,
        credentials: &Credentials,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Result<User> {
        if role == Role::Admin {
            return Err(AuthError::Validation {
                detail: "cannot self-register an admin account".to_string(),
            }
            .into());
        }

        info!("registering account");

        let request = RegisterRequest {
            email: credentials.email(),
            password: credentials.password(),
            first_name,
            last_name,
            role,
        };

        let response: TokenResponse = self
            .client
            .post_public(endpoints::REGISTER, &request)
            .await
            .map_err(map_register_error)?;

        self.install(response)
    }

    /// End the session.
    ///
    /// Asks the server to revoke the refresh tokens (best effort, any
    /// failure is ignored), then drops the credential store contents and
    /// the cached profile. Idempotent: logging out twice is a no-op.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.store.get().is_some() {
            if let Err(err) = self.client.post_authed_once(endpoints::LOGOUT).await {
                debug!(error = %err, "server-side logout failed, discarding session anyway");
            }
        }
        self.clear_local();
        info!("logged out");
    }

    /// Fetch the profile for the current access token.
    ///
    /// Returns `None` without touching the network when no session is
    /// active. Any failure — a stale token, an expired session, even a
    /// transient network error — ends the session and returns `None`
    /// rather than propagating, so application startup never fails on a
    /// leftover token. The cause is logged.
    ///
    /// A response that settles after a logout has already torn the
    /// session down is discarded: it must not resurrect the cached
    /// profile of a session that no longer exists.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Option<User> {
        if self.store.get().is_none() {
            debug!("no active session");
            return None;
        }

        match self.client.get::<User>(endpoints::ME).await {
            Ok(user) => {
                if self.store.get().is_none() {
                    debug!("session ended while fetching profile, discarding response");
                    return None;
                }
                *self.profile.write().expect("profile lock poisoned") = Some(user.clone());
                Some(user)
            }
            Err(err) => {
                warn!(error = %err, "could not fetch current user, dropping session");
                if self.store.get().is_some() {
                    self.clear_local();
                }
                None
            }
        }
    }

    /// Open the realtime chat channel for this session.
    pub fn chat(&self) -> ChatChannel {
        ChatChannel::connect(self.client.base().clone(), self.store.clone())
    }

    /// Fetch a page of messages for a dialog.
    pub async fn messages(
        &self,
        dialog_id: i64,
        skip: u32,
        limit: u32,
    ) -> Result<Vec<ChatMessage>> {
        let query = [("skip", skip.to_string()), ("limit", limit.to_string())];
        self.client
            .get_with_query(&endpoints::dialog_messages(dialog_id), &query)
            .await
    }

    /// Post a message to a dialog over REST.
    pub async fn send_message(&self, dialog_id: i64, content: &str) -> Result<ChatMessage> {
        let request = MessageCreate { content };
        self.client
            .post(&endpoints::dialog_messages(dialog_id), &request)
            .await
    }

    /// Store the token pair and cached profile from an auth response.
    fn install(&self, response: TokenResponse) -> Result<User> {
        let user = response.user.ok_or_else(|| {
            Error::from(InvalidInputError::Other {
                message: "auth response missing user profile".to_string(),
            })
        })?;

        self.store
            .set(TokenPair::new(response.access_token, response.refresh_token))?;
        *self.profile.write().expect("profile lock poisoned") = Some(user.clone());

        debug!(user_id = user.id, "session established");
        Ok(user)
    }

    /// Drop local session state: the token pair and the cached profile.
    fn clear_local(&self) {
        self.store.clear();
        *self.profile.write().expect("profile lock poisoned") = None;
    }
}

/// A 401 on login is a credential rejection, not an expired session.
fn map_login_error(err: Error) -> Error {
    match err {
        Error::Api(api) if api.status == 401 => AuthError::InvalidCredentials.into(),
        other => other,
    }
}

/// Map registration rejections onto the auth error taxonomy.
fn map_register_error(err: Error) -> Error {
    match err {
        Error::Api(api) if api.status == 400 => {
            let detail = api.detail.unwrap_or_default();
            if detail.to_lowercase().contains("already registered") {
                AuthError::EmailTaken.into()
            } else {
                AuthError::Validation { detail }.into()
            }
        }
        Error::Api(api) if api.status == 422 => AuthError::Validation {
            detail: api.detail.unwrap_or_else(|| "invalid registration".to_string()),
        }
        .into(),
        other => other,
    }
}
