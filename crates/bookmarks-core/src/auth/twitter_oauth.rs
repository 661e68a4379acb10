//! ============================================================================
//! Twitter OAuth 2.0 + PKCE Authentication
//! ============================================================================
//! Implements the OAuth 2.0 authorization code flow with PKCE for Twitter,
//! token refresh and revocation. Public clients send only the client id;
//! confidential clients add HTTP Basic credentials on token requests.
//! ============================================================================

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use super::pkce;
use super::token_store::TokenStore;
use crate::config::TwitterConfig;
use crate::error::{BookmarksError, Result};
use crate::http::{BasicAuth, HttpTransport};
use crate::reauth::TokenRefresher;
use crate::types::{AuthState, AuthorizationRequest, SessionTokens};

/// Verifier and anti-forgery state of an authorization attempt in flight
#[derive(Debug, Clone)]
struct PendingAuthorization {
    state: String,
    verifier: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

/// Twitter OAuth 2.0 client bound to one session's token store
pub struct TwitterOAuth {
    config: TwitterConfig,
    transport: Arc<dyn HttpTransport>,
    store: Arc<TokenStore>,
    pending: Mutex<Option<PendingAuthorization>>,
    state: Mutex<AuthState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TwitterOAuth {
    pub fn new(
        config: TwitterConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<TokenStore>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            pending: Mutex::new(None),
            state: Mutex::new(AuthState::Unauthenticated),
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn auth_state(&self) -> AuthState {
        *lock(&self.state)
    }

    fn set_state(&self, next: AuthState) {
        let mut state = lock(&self.state);
        if *state != next {
            debug!("Auth state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    fn basic_auth(&self) -> Option<BasicAuth<'_>> {
        self.config.client_secret.as_deref().map(|secret| BasicAuth {
            username: &self.config.client_id,
            password: secret,
        })
    }

    /// Build the authorization URL to open in a browser.
    /// A new call supersedes any attempt still pending.
    pub fn start_authorization(&self) -> AuthorizationRequest {
        let pair = pkce::generate();
        let state = pkce::generate_state();

        let url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scopes),
            &state,
            &pair.challenge
        );

        *lock(&self.pending) = Some(PendingAuthorization {
            state: state.clone(),
            verifier: pair.verifier,
        });
        self.set_state(AuthState::Authenticating);

        debug!("Generated auth URL with state: {}", state);
        AuthorizationRequest { url, state }
    }

    /// Redeem the authorization code returned to the redirect URI
    pub async fn complete_authorization(
        &self,
        code: &str,
        returned_state: &str,
    ) -> Result<SessionTokens> {
        let verifier = {
            let mut pending = lock(&self.pending);
            match pending.as_ref() {
                Some(p) if p.state == returned_state => {
                    pending.take().map(|p| p.verifier).unwrap_or_default()
                }
                Some(p) => {
                    error!("State mismatch: expected {}, got {}", p.state, returned_state);
                    return Err(BookmarksError::StateMismatch);
                }
                None => {
                    error!("Callback received with no authorization in progress");
                    return Err(BookmarksError::StateMismatch);
                }
            }
        };

        info!("Exchanging authorization code for tokens");

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", verifier.as_str()),
        ];

        match self.request_tokens(&params, None).await {
            Ok(tokens) => {
                self.store.set(tokens.clone()).await;
                self.set_state(AuthState::Authenticated);
                info!("Successfully obtained tokens");
                Ok(tokens)
            }
            Err(e) => {
                error!("Token exchange failed: {}", e);
                self.settle_state().await;
                Err(e)
            }
        }
    }

    /// Refresh the currently stored pair
    pub async fn refresh(&self) -> Result<SessionTokens> {
        let current = self
            .store
            .get()
            .await
            .ok_or(BookmarksError::NotAuthenticated)?;

        if !current.can_refresh() {
            return Err(BookmarksError::NoRefreshToken);
        }

        self.refresh_rejected(&current).await
    }

    /// Refresh after `stale` was rejected, collapsing concurrent refreshes.
    pub async fn refresh_rejected(&self, stale: &SessionTokens) -> Result<SessionTokens> {
        self.refresh_pair(stale, Some(AuthState::Unauthenticated)).await
    }

    /// Best-effort refresh of a pair past its expiry that the upstream has
    /// not rejected yet. A failure leaves the auth state as it was.
    pub async fn refresh_expired(&self, stale: &SessionTokens) -> Result<SessionTokens> {
        self.refresh_pair(stale, None).await
    }

    async fn refresh_pair(
        &self,
        stale: &SessionTokens,
        on_failure: Option<AuthState>,
    ) -> Result<SessionTokens> {
        let refreshing = RefreshingState::enter(self);

        let result = self
            .store
            .compare_and_refresh(stale, |current| self.exchange_refresh_token(current))
            .await;

        match &result {
            Ok(_) => refreshing.finish(AuthState::Authenticated),
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                if let Some(next) = on_failure {
                    refreshing.finish(next);
                }
            }
        }
        result
    }

    /// Mark the session authenticated after the upstream accepted `tokens`.
    /// Only applies while `tokens` is still the stored pair and no login or
    /// refresh is in flight.
    pub async fn confirm_accepted(&self, tokens: &SessionTokens) {
        if self.store.get().await.as_ref() != Some(tokens) {
            return;
        }
        let mut state = lock(&self.state);
        if *state == AuthState::Unauthenticated {
            debug!("Auth state {:?} -> {:?}", *state, AuthState::Authenticated);
            *state = AuthState::Authenticated;
        }
    }

    async fn exchange_refresh_token(&self, current: SessionTokens) -> Result<SessionTokens> {
        let refresh_token = current
            .refresh_token
            .ok_or(BookmarksError::NoRefreshToken)?;

        info!("Refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];

        let tokens = self.request_tokens(&params, Some(refresh_token.clone())).await?;
        info!("Successfully refreshed tokens");
        Ok(tokens)
    }

    /// POST to the token endpoint and decode the pair.
    /// `previous_refresh` is kept when the response carries no new one.
    async fn request_tokens(
        &self,
        params: &[(&str, &str)],
        previous_refresh: Option<String>,
    ) -> Result<SessionTokens> {
        let response = self
            .transport
            .post_form(&self.config.token_url(), params, self.basic_auth())
            .await
            .map_err(|e| BookmarksError::Network(e.to_string()))?;

        if !response.is_success() {
            error!("Token endpoint error: {} - {}", response.status, response.body);
            return Err(BookmarksError::UpstreamAuthError {
                status: response.status,
                body: response.body,
            });
        }

        let token_response: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| BookmarksError::ResponseMalformed(format!("token response: {}", e)))?;

        if token_response.access_token.is_empty() {
            return Err(BookmarksError::ResponseMalformed(
                "token response: empty access_token".to_string(),
            ));
        }

        if let Some(expires_in) = token_response.expires_in {
            debug!("Access token expires in {} seconds", expires_in);
        }

        Ok(SessionTokens {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token.or(previous_refresh),
            expires_at: token_response
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            scope: token_response.scope,
        })
    }

    /// Revoke the access token and forget the session.
    /// The local pair is cleared even when the upstream call fails.
    pub async fn revoke(&self) -> Result<()> {
        lock(&self.pending).take();
        let tokens = self.store.clear().await;
        self.set_state(AuthState::Unauthenticated);

        let Some(tokens) = tokens else {
            debug!("Revoke requested with no active session");
            return Ok(());
        };

        info!("Revoking access token");

        let params = [
            ("token", tokens.access_token.as_str()),
            ("token_type_hint", "access_token"),
            ("client_id", self.config.client_id.as_str()),
        ];

        let response = self
            .transport
            .post_form(&self.config.revoke_url(), &params, self.basic_auth())
            .await
            .map_err(|e| BookmarksError::Network(e.to_string()))?;

        if !response.is_success() {
            error!("Token revoke failed: {} - {}", response.status, response.body);
            return Err(BookmarksError::UpstreamAuthError {
                status: response.status,
                body: response.body,
            });
        }

        info!("Access token revoked");
        Ok(())
    }

    /// State after a failed authorization attempt
    async fn settle_state(&self) {
        let next = if self.store.get().await.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        };
        self.set_state(next);
    }
}

/// Holds `Refreshing` for the duration of a refresh. Dropped unfinished
/// (failed best-effort refresh or a canceled future), it puts back the state
/// seen on entry.
struct RefreshingState<'a> {
    oauth: &'a TwitterOAuth,
    previous: AuthState,
    finished: bool,
}

impl<'a> RefreshingState<'a> {
    fn enter(oauth: &'a TwitterOAuth) -> Self {
        let previous = match oauth.auth_state() {
            // Another refresh of the same session is in flight
            AuthState::Refreshing => AuthState::Authenticated,
            other => other,
        };
        oauth.set_state(AuthState::Refreshing);
        Self {
            oauth,
            previous,
            finished: false,
        }
    }

    fn finish(mut self, next: AuthState) {
        self.finished = true;
        self.oauth.set_state(next);
    }
}

impl Drop for RefreshingState<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.oauth.set_state(self.previous);
        }
    }
}

#[async_trait]
impl TokenRefresher for TwitterOAuth {
    async fn current(&self) -> Option<SessionTokens> {
        self.store.get().await
    }

    async fn refresh_rejected(&self, stale: &SessionTokens) -> Result<SessionTokens> {
        TwitterOAuth::refresh_rejected(self, stale).await
    }

    async fn accepted(&self, tokens: &SessionTokens) {
        self.confirm_accepted(tokens).await
    }
}
