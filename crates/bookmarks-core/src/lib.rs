//! ============================================================================
//! BOOKMARKS-CORE: Token-Lifecycle-Aware Twitter Client
//! ============================================================================
//! This crate handles all upstream logic for the bookmarks relay:
//! - OAuth 2.0 + PKCE authorization, refresh and revocation
//! - Single-session token store with collapsed concurrent refreshes
//! - Bookmark reads with retry/backoff and refresh-and-replay on 401
//! - Normalization of tweets + included users into flat bookmarks
//! ============================================================================

pub mod auth;
pub mod bookmarks;
pub mod config;
pub mod error;
pub mod http;
pub mod reauth;
pub mod retry;
pub mod service;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use config::TwitterConfig;
pub use error::BookmarksError;
pub use service::BookmarksService;
