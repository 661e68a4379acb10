// ============================================================================
// ServerConfig — inbound surface settings
// ============================================================================
// SECRET_KEY gates the bookmark routes via the X-API-KEY header.
// PORT / RATE_LIMIT_* fall back to defaults when unset.
// ============================================================================

use anyhow::{anyhow, Context, Result};
use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub api_key: String,
    pub rate_limit_requests: usize,
    pub rate_limit_window: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SECRET_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("SECRET_KEY not set. Configure it in .env or the environment."))?;

        Ok(Self {
            bind: env_or("BIND_ADDRESS", IpAddr::from([0, 0, 0, 0]))?,
            port: env_or("PORT", 8080)?,
            api_key,
            rate_limit_requests: env_or("RATE_LIMIT_REQUESTS", 60)?,
            rate_limit_window: Duration::from_secs(env_or("RATE_LIMIT_WINDOW_SECS", 60)?),
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", key, raw)),
        _ => Ok(default),
    }
}
