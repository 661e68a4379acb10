//! ============================================================================
//! Upstream Client - Twitter API v2 Bookmark Reads
//! ============================================================================
//! Issues bearer-authenticated GETs against the bookmarks and users/me
//! endpoints. Transport failures and 429s are retried with linear backoff;
//! 401s are returned as `Unauthorized` for the reauthentication decorator.
//! ============================================================================

use serde::Deserialize;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::normalize::normalize;
use crate::config::TwitterConfig;
use crate::error::{BookmarksError, Result};
use crate::http::{HttpResponse, HttpTransport};
use crate::retry::{backoff_delay, classify_status, Outcome};
use crate::types::BookmarkPage;

/// Field expansions needed to denormalize authors onto bookmarks
const TWEET_FIELDS: &str = "created_at,author_id,text";
const EXPANSIONS: &str = "author_id";
const USER_FIELDS: &str = "username,name";

pub struct UpstreamClient {
    config: Arc<TwitterConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl UpstreamClient {
    pub fn new(config: Arc<TwitterConfig>, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Fetch one page of the user's bookmarks
    pub async fn fetch_bookmarks_page(
        &self,
        access_token: &str,
        user_id: &str,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<BookmarkPage> {
        let mut query = vec![
            ("tweet.fields".to_string(), TWEET_FIELDS.to_string()),
            ("expansions".to_string(), EXPANSIONS.to_string()),
            ("user.fields".to_string(), USER_FIELDS.to_string()),
        ];
        if let Some(max_results) = self.config.max_results {
            query.push(("max_results".to_string(), max_results.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("pagination_token".to_string(), cursor.to_string()));
        }

        let url = self.config.bookmarks_url(user_id);
        let response = self.get_with_retry(&url, access_token, &query, cancel).await?;
        let page = normalize(&response.body)?;

        info!(
            "Fetched {} bookmarks (more pages: {})",
            page.bookmarks.len(),
            page.next_token.is_some()
        );
        Ok(page)
    }

    /// Resolve the id of the user the access token belongs to
    pub async fn fetch_me(&self, access_token: &str, cancel: &CancellationToken) -> Result<String> {
        #[derive(Deserialize)]
        struct MeResponse {
            data: MeData,
        }

        #[derive(Deserialize)]
        struct MeData {
            id: String,
        }

        let response = self
            .get_with_retry(&self.config.me_url(), access_token, &[], cancel)
            .await?;

        let me: MeResponse = serde_json::from_str(&response.body)
            .map_err(|e| BookmarksError::ResponseMalformed(format!("users/me response: {}", e)))?;

        debug!("Resolved authenticated user id: {}", me.data.id);
        Ok(me.data.id)
    }

    async fn get_with_retry(
        &self,
        url: &str,
        access_token: &str,
        query: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let retry = &self.config.retry;
        let attempts = retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = backoff_delay(attempt - 1, retry);
                debug!("Retry attempt {} after {:?} delay", attempt, delay);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(BookmarksError::Canceled),
                    _ = sleep(delay) => {}
                }
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BookmarksError::Canceled),
                result = self.transport.get(url, access_token, query) => result,
            };

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e.to_string();
                    continue;
                }
            };

            match classify_status(response.status) {
                Outcome::Success => return Ok(response),
                Outcome::RateLimited => {
                    warn!("Rate limited on attempt {}/{}", attempt, attempts);
                    last_error = "rate limit exceeded (429)".to_string();
                }
                Outcome::Unauthorized => {
                    debug!("Upstream answered 401");
                    return Err(BookmarksError::Unauthorized);
                }
                Outcome::Permanent => {
                    warn!("Twitter API error {}: {}", response.status, response.body);
                    return Err(BookmarksError::UpstreamApiError {
                        status: response.status,
                    });
                }
            }
        }

        Err(BookmarksError::RetriesExhausted { last_error })
    }
}
