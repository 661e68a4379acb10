//! ============================================================================
//! Reauthentication Decorator - Refresh and Replay Once on 401
//! ============================================================================
//! Wraps any call that needs the session's access token. When the upstream
//! reports the token as unauthorized, the decorator refreshes the token and
//! replays the call exactly once. A second rejection is final.
//! ============================================================================

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{BookmarksError, Result};
use crate::types::SessionTokens;

/// Source of the current token pair and of refreshed pairs
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn current(&self) -> Option<SessionTokens>;

    /// Produce a fresh pair after `stale` was rejected by the upstream
    async fn refresh_rejected(&self, stale: &SessionTokens) -> Result<SessionTokens>;

    /// The upstream accepted `tokens`
    async fn accepted(&self, tokens: &SessionTokens);
}

pub struct Reauth<R: ?Sized> {
    refresher: Arc<R>,
}

impl<R: ?Sized> Clone for Reauth<R> {
    fn clone(&self) -> Self {
        Self {
            refresher: self.refresher.clone(),
        }
    }
}

impl<R: TokenRefresher + ?Sized> Reauth<R> {
    pub fn new(refresher: Arc<R>) -> Self {
        Self { refresher }
    }

    /// Invoke `call` with the current tokens, refreshing and replaying once
    /// if it fails with `Unauthorized`.
    pub async fn call<T, F, Fut>(&self, cancel: &CancellationToken, mut call: F) -> Result<T>
    where
        F: FnMut(SessionTokens) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let tokens = self
            .refresher
            .current()
            .await
            .ok_or(BookmarksError::NotAuthenticated)?;

        match call(tokens.clone()).await {
            Err(BookmarksError::Unauthorized) => {}
            Ok(value) => {
                self.refresher.accepted(&tokens).await;
                return Ok(value);
            }
            Err(e) => return Err(e),
        }

        info!("Access token rejected, refreshing before replay");

        let fresh = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BookmarksError::Canceled),
            fresh = self.refresher.refresh_rejected(&tokens) => fresh?,
        };

        match call(fresh.clone()).await {
            Err(BookmarksError::Unauthorized) => {
                warn!("Access token rejected again after refresh, giving up");
                Err(BookmarksError::ReauthFailed)
            }
            Ok(value) => {
                self.refresher.accepted(&fresh).await;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Refresher that hands out "token-N" on each refresh
    struct CountingRefresher {
        tokens: Mutex<Option<SessionTokens>>,
        refreshes: AtomicUsize,
        fail_with: Option<BookmarksError>,
        accepted: Mutex<Vec<String>>,
    }

    impl CountingRefresher {
        fn new(initial: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                tokens: Mutex::new(initial.map(token)),
                refreshes: AtomicUsize::new(0),
                fail_with: None,
                accepted: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: BookmarksError) -> Arc<Self> {
            Arc::new(Self {
                tokens: Mutex::new(Some(token("token-0"))),
                refreshes: AtomicUsize::new(0),
                fail_with: Some(error),
                accepted: Mutex::new(Vec::new()),
            })
        }

        fn refreshes(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }

        async fn accepted_tokens(&self) -> Vec<String> {
            self.accepted.lock().await.clone()
        }
    }

    fn token(access: &str) -> SessionTokens {
        SessionTokens {
            access_token: access.to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: None,
            scope: None,
        }
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn current(&self) -> Option<SessionTokens> {
            self.tokens.lock().await.clone()
        }

        async fn refresh_rejected(&self, _stale: &SessionTokens) -> Result<SessionTokens> {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            let fresh = token(&format!("token-{}", n));
            *self.tokens.lock().await = Some(fresh.clone());
            Ok(fresh)
        }

        async fn accepted(&self, tokens: &SessionTokens) {
            self.accepted.lock().await.push(tokens.access_token.clone());
        }
    }

    /// Call that answers Unauthorized for the first `rejections` invocations
    fn rejecting(
        rejections: usize,
        calls: &AtomicUsize,
    ) -> impl FnMut(SessionTokens) -> std::future::Ready<Result<String>> + '_ {
        move |tokens| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < rejections {
                Err(BookmarksError::Unauthorized)
            } else {
                Ok(tokens.access_token)
            })
        }
    }

    #[tokio::test]
    async fn test_success_needs_no_refresh() {
        let refresher = CountingRefresher::new(Some("token-0"));
        let calls = AtomicUsize::new(0);

        let result = Reauth::new(refresher.clone())
            .call(&CancellationToken::new(), rejecting(0, &calls))
            .await;

        assert_eq!(result, Ok("token-0".to_string()));
        assert_eq!(refresher.refreshes(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(refresher.accepted_tokens().await, vec!["token-0"]);
    }

    #[tokio::test]
    async fn test_unauthorized_once_then_success() {
        let refresher = CountingRefresher::new(Some("token-0"));
        let calls = AtomicUsize::new(0);

        let result = Reauth::new(refresher.clone())
            .call(&CancellationToken::new(), rejecting(1, &calls))
            .await;

        assert_eq!(result, Ok("token-1".to_string()));
        assert_eq!(refresher.refreshes(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Only the replayed pair was accepted
        assert_eq!(refresher.accepted_tokens().await, vec!["token-1"]);
    }

    #[tokio::test]
    async fn test_unauthorized_twice_is_reauth_failed() {
        let refresher = CountingRefresher::new(Some("token-0"));
        let calls = AtomicUsize::new(0);

        let result = Reauth::new(refresher.clone())
            .call(&CancellationToken::new(), rejecting(2, &calls))
            .await;

        assert_eq!(result, Err(BookmarksError::ReauthFailed));
        assert_eq!(refresher.refreshes(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(refresher.accepted_tokens().await.is_empty());
    }

    #[tokio::test]
    async fn test_always_unauthorized_is_reauth_failed() {
        let refresher = CountingRefresher::new(Some("token-0"));
        let calls = AtomicUsize::new(0);

        let result = Reauth::new(refresher.clone())
            .call(&CancellationToken::new(), rejecting(usize::MAX, &calls))
            .await;

        assert_eq!(result, Err(BookmarksError::ReauthFailed));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_replayed() {
        let refresher = CountingRefresher::new(Some("token-0"));
        let calls = AtomicUsize::new(0);

        let result: Result<String> = Reauth::new(refresher.clone())
            .call(&CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err(BookmarksError::UpstreamApiError { status: 500 }))
            })
            .await;

        assert_eq!(result, Err(BookmarksError::UpstreamApiError { status: 500 }));
        assert_eq!(refresher.refreshes(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_surfaced() {
        let refresher = CountingRefresher::failing(BookmarksError::NoRefreshToken);
        let calls = AtomicUsize::new(0);

        let result = Reauth::new(refresher.clone())
            .call(&CancellationToken::new(), rejecting(1, &calls))
            .await;

        assert_eq!(result, Err(BookmarksError::NoRefreshToken));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_session_is_not_authenticated() {
        let refresher = CountingRefresher::new(None);
        let calls = AtomicUsize::new(0);

        let result = Reauth::new(refresher)
            .call(&CancellationToken::new(), rejecting(0, &calls))
            .await;

        assert_eq!(result, Err(BookmarksError::NotAuthenticated));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_canceled_before_refresh() {
        let refresher = CountingRefresher::new(Some("token-0"));
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Reauth::new(refresher)
            .call(&cancel, rejecting(1, &calls))
            .await;

        assert_eq!(result, Err(BookmarksError::Canceled));
    }
}
