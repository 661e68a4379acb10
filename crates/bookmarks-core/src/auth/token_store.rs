//! ============================================================================
//! Token Store - Session Token Pair Behind a Single Lock
//! ============================================================================
//! Holds the access/refresh token pair for one logical session.
//! `compare_and_refresh` holds the lock across the refresh so that concurrent
//! callers rejected with the same stale pair issue a single refresh request.
//! ============================================================================

use std::future::Future;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{BookmarksError, Result};
use crate::types::SessionTokens;

#[derive(Debug, Default)]
pub struct TokenStore {
    current: Mutex<Option<SessionTokens>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: SessionTokens) -> Self {
        Self {
            current: Mutex::new(Some(tokens)),
        }
    }

    pub async fn get(&self) -> Option<SessionTokens> {
        self.current.lock().await.clone()
    }

    pub async fn set(&self, tokens: SessionTokens) {
        *self.current.lock().await = Some(tokens);
    }

    pub async fn clear(&self) -> Option<SessionTokens> {
        self.current.lock().await.take()
    }

    /// Run `refresh` only if the stored pair still equals `stale`.
    ///
    /// If another caller already replaced the pair, the replacement is
    /// returned and `refresh` is never invoked. If the store was cleared in
    /// the meantime the session is gone and `NotAuthenticated` is returned.
    pub async fn compare_and_refresh<F, Fut>(
        &self,
        stale: &SessionTokens,
        refresh: F,
    ) -> Result<SessionTokens>
    where
        F: FnOnce(SessionTokens) -> Fut,
        Fut: Future<Output = Result<SessionTokens>>,
    {
        let mut current = self.current.lock().await;

        match current.as_ref() {
            None => Err(BookmarksError::NotAuthenticated),
            Some(tokens) if tokens != stale => {
                debug!("Token pair already refreshed by another caller");
                Ok(tokens.clone())
            }
            Some(tokens) => {
                let fresh = refresh(tokens.clone()).await?;
                *current = Some(fresh.clone());
                Ok(fresh)
            }
        }
    }
}
