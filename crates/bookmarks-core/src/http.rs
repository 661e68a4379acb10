//! ============================================================================
//! HTTP Transport - Outbound Requests to the Twitter API
//! ============================================================================
//! A narrow seam over the HTTP client so the authenticator and the upstream
//! client can be exercised against scripted responses.
//! Production uses reqwest with a fixed per-request timeout.
//! ============================================================================

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Status and body of an upstream response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below the HTTP layer (no status code was received)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// HTTP Basic credentials for confidential OAuth clients
#[derive(Debug, Clone, Copy)]
pub struct BasicAuth<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `url` with a bearer token and query parameters
    async fn get(
        &self,
        url: &str,
        bearer: &str,
        query: &[(String, String)],
    ) -> Result<HttpResponse, TransportError>;

    /// POST an `application/x-www-form-urlencoded` body
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        basic_auth: Option<BasicAuth<'_>>,
    ) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport used outside of tests
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests all carry `timeout`
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bookmarks-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self { client })
    }

    async fn finish(response: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;
        Ok(HttpResponse { status, body })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        bearer: &str,
        query: &[(String, String)],
    ) -> Result<HttpResponse, TransportError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(bearer)
            .query(query)
            .send()
            .await
            .map_err(classify)?;

        Self::finish(response).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        basic_auth: Option<BasicAuth<'_>>,
    ) -> Result<HttpResponse, TransportError> {
        debug!("POST {}", url);

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(form);

        if let Some(auth) = basic_auth {
            request = request.basic_auth(auth.username, Some(auth.password));
        }

        let response = request.send().await.map_err(classify)?;
        Self::finish(response).await
    }
}
