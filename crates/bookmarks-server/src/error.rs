use bookmarks_core::BookmarksError;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{reject, Rejection, Reply};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] BookmarksError),
    #[error("Unauthorized")]
    InvalidApiKey,
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),
    #[error("Missing query parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Internal error")]
    Internal(String),
}

impl reject::Reject for ApiError {}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiError {
        warn!("Internal error: {}", error);
        ApiError::Internal(error.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => match e {
                BookmarksError::StateMismatch | BookmarksError::InvalidDateFormat(_) => {
                    StatusCode::BAD_REQUEST
                }
                BookmarksError::NotAuthenticated
                | BookmarksError::NoRefreshToken
                | BookmarksError::Unauthorized
                | BookmarksError::ReauthFailed => StatusCode::UNAUTHORIZED,
                BookmarksError::UpstreamAuthError { .. }
                | BookmarksError::UpstreamApiError { .. }
                | BookmarksError::ResponseMalformed(_) => StatusCode::BAD_GATEWAY,
                BookmarksError::RetriesExhausted { .. }
                | BookmarksError::Network(_)
                | BookmarksError::Canceled => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::AuthorizationDenied(_) | ApiError::MissingParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Core(e) => match e {
                BookmarksError::StateMismatch => "state_mismatch",
                BookmarksError::UpstreamAuthError { .. } => "upstream_auth_error",
                BookmarksError::NoRefreshToken => "no_refresh_token",
                BookmarksError::NotAuthenticated => "not_authenticated",
                BookmarksError::Unauthorized => "unauthorized",
                BookmarksError::ReauthFailed => "reauth_failed",
                BookmarksError::UpstreamApiError { .. } => "upstream_api_error",
                BookmarksError::RetriesExhausted { .. } => "retries_exhausted",
                BookmarksError::ResponseMalformed(_) => "response_malformed",
                BookmarksError::InvalidDateFormat(_) => "invalid_date_format",
                BookmarksError::Network(_) => "network_error",
                BookmarksError::Canceled => "canceled",
            },
            ApiError::InvalidApiKey => "invalid_api_key",
            ApiError::RateLimited => "rate_limited",
            ApiError::AuthorizationDenied(_) => "authorization_denied",
            ApiError::MissingParameter(_) => "missing_parameter",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Message shown to the caller. Internal details stay in the logs.
    fn message(&self) -> String {
        match self {
            ApiError::Core(BookmarksError::UpstreamAuthError { status, .. }) => {
                format!("Token endpoint rejected the request ({})", status)
            }
            ApiError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

pub fn rejection(error: impl Into<ApiError>) -> Rejection {
    reject::custom(error.into())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

pub async fn recover_error(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(api_error) = err.find::<ApiError>() {
        let status = api_error.status();
        if status.is_server_error() {
            error!("Request failed: {}", api_error);
        }
        (
            status,
            ErrorBody {
                error: api_error.code(),
                message: api_error.message(),
            },
        )
    } else if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            ErrorBody {
                error: "not_found",
                message: "Not found".to_string(),
            },
        )
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorBody {
                error: "method_not_allowed",
                message: "Method not allowed".to_string(),
            },
        )
    } else {
        warn!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                error: "internal_error",
                message: "Internal error".to_string(),
            },
        )
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BookmarksError::StateMismatch, StatusCode::BAD_REQUEST),
            (
                BookmarksError::InvalidDateFormat("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (BookmarksError::NoRefreshToken, StatusCode::UNAUTHORIZED),
            (BookmarksError::ReauthFailed, StatusCode::UNAUTHORIZED),
            (
                BookmarksError::UpstreamApiError { status: 500 },
                StatusCode::BAD_GATEWAY,
            ),
            (
                BookmarksError::RetriesExhausted {
                    last_error: "timeout".to_string(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (BookmarksError::Canceled, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error.clone()).status(), status, "{:?}", error);
        }
    }

    #[test]
    fn test_upstream_auth_body_not_leaked() {
        let error = ApiError::from(BookmarksError::UpstreamAuthError {
            status: 400,
            body: "client secret details".to_string(),
        });
        assert_eq!(error.code(), "upstream_auth_error");
        assert!(!error.message().contains("secret"));
    }
}
