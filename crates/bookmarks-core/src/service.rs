//! ============================================================================
//! Bookmarks Service - Composition of Auth, Client and Filters
//! ============================================================================
//! The operations the HTTP surface calls. Every upstream read runs through
//! the reauthentication decorator; expired tokens are refreshed up front
//! when a refresh token is available.
//! ============================================================================

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{TokenStore, TwitterOAuth};
use crate::bookmarks::{filter_after, UpstreamClient};
use crate::config::TwitterConfig;
use crate::error::{BookmarksError, Result};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::reauth::Reauth;
use crate::types::{AuthState, AuthorizationRequest, BookmarkPage, SessionTokens};

pub struct BookmarksService {
    oauth: Arc<TwitterOAuth>,
    client: UpstreamClient,
    reauth: Reauth<TwitterOAuth>,
    user_id: OnceCell<String>,
}

impl BookmarksService {
    /// Build the service with the production reqwest transport
    pub fn from_config(config: TwitterConfig) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn new(config: TwitterConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let user_id = OnceCell::new_with(config.user_id.clone());
        let config = Arc::new(config);
        let store = Arc::new(TokenStore::new());
        let oauth = Arc::new(TwitterOAuth::new(
            config.as_ref().clone(),
            transport.clone(),
            store,
        ));

        Self {
            client: UpstreamClient::new(config, transport),
            reauth: Reauth::new(oauth.clone()),
            oauth,
            user_id,
        }
    }

    pub fn oauth(&self) -> &Arc<TwitterOAuth> {
        &self.oauth
    }

    pub fn auth_state(&self) -> AuthState {
        self.oauth.auth_state()
    }

    pub async fn session(&self) -> Option<SessionTokens> {
        self.oauth.store().get().await
    }

    pub fn start_authorization(&self) -> AuthorizationRequest {
        self.oauth.start_authorization()
    }

    pub async fn complete_authorization(
        &self,
        code: &str,
        returned_state: &str,
    ) -> Result<SessionTokens> {
        self.oauth.complete_authorization(code, returned_state).await
    }

    pub async fn revoke(&self) -> Result<()> {
        self.oauth.revoke().await
    }

    /// One page of bookmarks, starting at `cursor` when given
    pub async fn bookmarks(
        &self,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BookmarkPage> {
        self.refresh_if_expired(cancel).await?;
        let user_id = self.user_id(cancel).await?;

        self.reauth
            .call(cancel, |tokens| async move {
                self.client
                    .fetch_bookmarks_page(&tokens.access_token, user_id, cursor, cancel)
                    .await
            })
            .await
    }

    /// One page of bookmarks keeping only those created after `after`
    pub async fn bookmarks_after(
        &self,
        after: DateTime<Utc>,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BookmarkPage> {
        let page = self.bookmarks(cursor, cancel).await?;
        Ok(filter_after(page, after))
    }

    async fn user_id(&self, cancel: &CancellationToken) -> Result<&str> {
        let id = self
            .user_id
            .get_or_try_init(|| async {
                info!("No TWITTER_USER_ID configured, resolving via users/me");
                self.reauth
                    .call(cancel, |tokens| async move {
                        self.client.fetch_me(&tokens.access_token, cancel).await
                    })
                    .await
            })
            .await?;
        Ok(id.as_str())
    }

    /// Proactively refresh a pair past its expiry. Failures here are only
    /// logged; the reauth decorator still handles a real rejection.
    async fn refresh_if_expired(&self, cancel: &CancellationToken) -> Result<()> {
        let Some(tokens) = self.oauth.store().get().await else {
            return Err(BookmarksError::NotAuthenticated);
        };
        if !tokens.is_expired() || !tokens.can_refresh() {
            return Ok(());
        }

        debug!("Stored access token expired, refreshing before request");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BookmarksError::Canceled),
            result = self.oauth.refresh_expired(&tokens) => {
                if let Err(e) = result {
                    warn!("Proactive refresh failed, continuing with current token: {}", e);
                }
                Ok(())
            }
        }
    }
}
