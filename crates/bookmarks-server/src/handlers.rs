use bookmarks_core::bookmarks::parse_after;
use bookmarks_core::{AuthState, BookmarksService};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};
use warp::http::Uri;
use warp::Reply;

use crate::error::{rejection, ApiError};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub pagination_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub after: Option<String>,
    pub pagination_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Serialize)]
struct CallbackResponse {
    authenticated: bool,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    state: AuthState,
    expires_at: Option<DateTime<Utc>>,
    can_refresh: bool,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

/// Cancellation token that fires if the handler future is dropped,
/// e.g. when the client disconnects mid-request.
fn request_cancellation() -> (CancellationToken, DropGuard) {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    (cancel, guard)
}

pub async fn login(service: Arc<BookmarksService>) -> Result<impl Reply, warp::Rejection> {
    let request = service.start_authorization();
    let uri: Uri = request.url.parse().map_err(|e| rejection(ApiError::internal(e)))?;

    info!("Redirecting to Twitter authorization");
    Ok(warp::redirect::found(uri))
}

pub async fn callback(
    query: CallbackQuery,
    service: Arc<BookmarksService>,
) -> Result<impl Reply, warp::Rejection> {
    if let Some(error) = query.error {
        let desc = query
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!("Twitter OAuth error: {} - {}", error, desc);
        return Err(rejection(ApiError::AuthorizationDenied(format!(
            "{} - {}",
            error, desc
        ))));
    }

    let state = query
        .state
        .ok_or_else(|| rejection(ApiError::MissingParameter("state")))?;
    let code = query
        .code
        .ok_or_else(|| rejection(ApiError::MissingParameter("code")))?;

    let tokens = service
        .complete_authorization(&code, &state)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&CallbackResponse {
        authenticated: true,
        expires_at: tokens.expires_at,
    }))
}

pub async fn bookmarks(
    query: PageQuery,
    service: Arc<BookmarksService>,
) -> Result<impl Reply, warp::Rejection> {
    let (cancel, _guard) = request_cancellation();

    let page = service
        .bookmarks(query.pagination_token.as_deref(), &cancel)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&page))
}

pub async fn filtered_bookmarks(
    query: FilterQuery,
    service: Arc<BookmarksService>,
) -> Result<impl Reply, warp::Rejection> {
    let after = parse_after(query.after.as_deref().unwrap_or_default()).map_err(rejection)?;
    let (cancel, _guard) = request_cancellation();

    let page = service
        .bookmarks_after(after, query.pagination_token.as_deref(), &cancel)
        .await
        .map_err(rejection)?;

    Ok(warp::reply::json(&page))
}

pub async fn revoke(service: Arc<BookmarksService>) -> Result<impl Reply, warp::Rejection> {
    service.revoke().await.map_err(rejection)?;

    Ok(warp::reply::json(&MessageResponse {
        message: "Token revoked",
    }))
}

pub async fn auth_status(service: Arc<BookmarksService>) -> Result<impl Reply, warp::Rejection> {
    let session = service.session().await;

    Ok(warp::reply::json(&StatusResponse {
        state: service.auth_state(),
        expires_at: session.as_ref().and_then(|s| s.expires_at),
        can_refresh: session.as_ref().is_some_and(|s| s.can_refresh()),
    }))
}
