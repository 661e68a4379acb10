use bookmarks_core::BookmarksService;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::info;
use warp::{reject, Filter};

use crate::config::ServerConfig;
use crate::error::{recover_error, ApiError};
use crate::handlers;
use crate::rate_limit::RateLimiter;

pub fn routes(
    service: Arc<BookmarksService>,
    config: &ServerConfig,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_requests,
        config.rate_limit_window,
    ));
    let api_key = with_api_key(config.api_key.clone());

    // Opened in a browser, so not behind the API key
    let login = warp::get()
        .and(warp::path!("login"))
        .and(with(service.clone()))
        .and_then(handlers::login);

    let callback = warp::get()
        .and(warp::path!("callback"))
        .and(warp::query::<handlers::CallbackQuery>())
        .and(with(service.clone()))
        .and_then(handlers::callback);

    let bookmarks = warp::get()
        .and(warp::path!("bookmarks"))
        .and(api_key.clone())
        .and(warp::query::<handlers::PageQuery>())
        .and(with(service.clone()))
        .and_then(handlers::bookmarks);

    let filtered = warp::get()
        .and(warp::path!("bookmarks" / "filter"))
        .and(api_key.clone())
        .and(warp::query::<handlers::FilterQuery>())
        .and(with(service.clone()))
        .and_then(handlers::filtered_bookmarks);

    let revoke = warp::post()
        .and(warp::path!("revoke"))
        .and(api_key.clone())
        .and(with(service.clone()))
        .and_then(handlers::revoke);

    let status = warp::get()
        .and(warp::path!("auth" / "status"))
        .and(api_key)
        .and(with(service))
        .and_then(handlers::auth_status);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type", "x-api-key"]);

    let log = warp::log::custom(|request| {
        info!(
            "{} {} {} {:?}",
            request.method(),
            request.path(),
            request.status().as_u16(),
            request.elapsed()
        );
    });

    with_rate_limit(limiter)
        .and(
            login
                .or(callback)
                .or(bookmarks)
                .or(filtered)
                .or(revoke)
                .or(status),
        )
        .recover(recover_error)
        .with(cors)
        .with(log)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_api_key(expected: String) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("x-api-key")
        .and_then(move |key: Option<String>| {
            let expected = expected.clone();
            async move {
                if key.is_some_and(|key| api_key_matches(&key, &expected)) {
                    Ok(())
                } else {
                    Err(reject::custom(ApiError::InvalidApiKey))
                }
            }
        })
        .untuple_one()
}

/// Constant-time comparison of the presented key with the configured one
fn api_key_matches(presented: &str, expected: &str) -> bool {
    bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

fn with_rate_limit(
    limiter: Arc<RateLimiter>,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::addr::remote()
        .and_then(move |addr: Option<SocketAddr>| {
            let limiter = limiter.clone();
            async move {
                match addr {
                    Some(addr) if !limiter.check(addr.ip()) => {
                        Err(reject::custom(ApiError::RateLimited))
                    }
                    _ => Ok(()),
                }
            }
        })
        .untuple_one()
}
