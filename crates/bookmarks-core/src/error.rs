//! ============================================================================
//! Error Taxonomy
//! ============================================================================
//! Every failure the core can surface. Only the bounded retry and
//! reauth-and-replay policies recover from errors; everything else reaches
//! the caller unchanged.
//! ============================================================================

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookmarksError {
    #[error("OAuth state mismatch - possible CSRF attack")]
    StateMismatch,

    #[error("Token endpoint rejected the request ({status}): {body}")]
    UpstreamAuthError { status: u16, body: String },

    #[error("No refresh token held for this session")]
    NoRefreshToken,

    #[error("Not authenticated - complete the login flow first")]
    NotAuthenticated,

    /// Upstream answered 401. Consumed by the reauthentication decorator.
    #[error("Upstream rejected the access token")]
    Unauthorized,

    #[error("Upstream rejected the access token again after refresh")]
    ReauthFailed,

    #[error("Twitter API error: status={status}")]
    UpstreamApiError { status: u16 },

    #[error("Request failed after retries: {last_error}")]
    RetriesExhausted { last_error: String },

    #[error("Malformed upstream response: {0}")]
    ResponseMalformed(String),

    #[error("Invalid date format, use RFC3339: {0}")]
    InvalidDateFormat(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request canceled")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, BookmarksError>;
