//! ============================================================================
//! Twitter Client Configuration
//! ============================================================================
//! Loaded from environment variables (the binary loads `.env` first).
//! Default endpoints point at the public Twitter/X v2 API.
//! ============================================================================

use anyhow::{anyhow, Context, Result};
use std::time::Duration;

use crate::retry::RetryConfig;

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";

/// Scopes needed to read bookmarks and keep a refresh token
pub const DEFAULT_SCOPES: &str = "tweet.read users.read bookmark.read offline.access";

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub client_id: String,
    /// Only set for confidential clients
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: String,
    /// Resolved through `users/me` when absent
    pub user_id: Option<String>,
    pub api_base: String,
    pub authorize_url: String,
    pub max_results: Option<u32>,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl TwitterConfig {
    /// Minimal config with default endpoints and policies
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.to_string(),
            user_id: None,
            api_base: DEFAULT_API_BASE.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            max_results: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let client_id = required("TWITTER_CLIENT_ID")?;
        let redirect_uri = required("TWITTER_REDIRECT_URI")?;
        let mut config = Self::new(client_id, redirect_uri);

        config.client_secret = optional("TWITTER_CLIENT_SECRET");
        config.user_id = optional("TWITTER_USER_ID");
        if let Some(scopes) = optional("TWITTER_SCOPES") {
            config.scopes = scopes;
        }
        if let Some(base) = optional("TWITTER_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(url) = optional("TWITTER_AUTHORIZE_URL") {
            config.authorize_url = url;
        }
        config.max_results = parsed("TWITTER_MAX_RESULTS")?;
        if let Some(secs) = parsed::<u64>("UPSTREAM_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parsed::<u32>("UPSTREAM_MAX_ATTEMPTS")? {
            if attempts == 0 {
                return Err(anyhow!("UPSTREAM_MAX_ATTEMPTS must be at least 1"));
            }
            config.retry.max_attempts = attempts;
        }
        if let Some(secs) = parsed::<u64>("UPSTREAM_BACKOFF_SECS")? {
            config.retry.backoff_step = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn token_url(&self) -> String {
        format!("{}/2/oauth2/token", self.api_base)
    }

    pub fn revoke_url(&self) -> String {
        format!("{}/2/oauth2/revoke", self.api_base)
    }

    pub fn bookmarks_url(&self, user_id: &str) -> String {
        format!("{}/2/users/{}/bookmarks", self.api_base, user_id)
    }

    pub fn me_url(&self) -> String {
        format!("{}/2/users/me", self.api_base)
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| anyhow!("{} not set. Configure it in .env or the environment.", key))
}

fn parsed<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional(key)
        .map(|raw| raw.parse::<T>().with_context(|| format!("Invalid {}: {}", key, raw)))
        .transpose()
}
