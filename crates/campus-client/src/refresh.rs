//! Single-flight token refresh.
//!
//! Any number of interleaved requests may observe a 401 at once. Without
//! coordination each would post its own refresh call, and with rotating
//! single-use refresh tokens the calls would invalidate each other and
//! spuriously end the session. The coordinator guarantees at most one
//! refresh exchange is on the wire at any time, and that every caller
//! settles with that one exchange's outcome.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use campus_core::{AccessToken, ApiUrl, AuthError, RefreshToken, Result, TokenPair};

use crate::endpoints::{self, RefreshRequest, TokenResponse};
use crate::http::parse_error_response;
use crate::store::CredentialStore;

/// Coordinates token refresh across concurrent requests.
#[derive(Debug)]
pub struct RefreshCoordinator {
    http: reqwest::Client,
    base: ApiUrl,
    store: Arc<CredentialStore>,
    gate: Mutex<()>,
}

impl RefreshCoordinator {
    pub(crate) fn new(http: reqwest::Client, base: ApiUrl, store: Arc<CredentialStore>) -> Self {
        Self {
            http,
            base,
            store,
            gate: Mutex::new(()),
        }
    }

    /// Obtain a fresh access token after a request observed a 401.
    ///
    /// `observed_generation` is the credential store generation the
    /// failing request was issued under. Callers queue on an internal
    /// lock; whoever enters first performs the one wire exchange, and
    /// every caller that queued behind it finds the store generation
    /// advanced and adopts the settled outcome without a second call.
    /// A logout that lands in between also advances the generation, so
    /// no refresh is issued for a session that no longer exists.
    ///
    /// # Errors
    ///
    /// `AuthError::Expired` if there is no refresh token, if the server
    /// rejects it, or if the exchange fails in transit. In every failure
    /// case the credential store ends cleared: the session is over.
    #[instrument(skip(self))]
    pub async fn refresh(&self, observed_generation: u64) -> Result<AccessToken> {
        let _slot = self.gate.lock().await;

        let (tokens, generation) = self.store.snapshot();
        if generation != observed_generation {
            debug!("session already settled by a concurrent refresh");
            return match tokens {
                Some(pair) => Ok(pair.access),
                None => Err(AuthError::Expired.into()),
            };
        }

        let Some(pair) = tokens else {
            return Err(AuthError::Expired.into());
        };

        match self.exchange(&pair.refresh).await {
            Ok(new_pair) => {
                let access = new_pair.access.clone();
                self.store.set(new_pair)?;
                info!("session tokens refreshed");
                Ok(access)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, ending session");
                self.store.clear();
                Err(AuthError::Expired.into())
            }
        }
    }

    /// The one wire call: POST the refresh token for a new pair.
    async fn exchange(&self, refresh: &RefreshToken) -> Result<TokenPair> {
        let url = self.base.endpoint(endpoints::REFRESH);
        let request = RefreshRequest {
            refresh_token: refresh.as_str(),
        };

        let response = self.http.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(parse_error_response(response).await.into());
        }

        let body: TokenResponse = response.json().await?;
        Ok(TokenPair::new(body.access_token, body.refresh_token))
    }
}
