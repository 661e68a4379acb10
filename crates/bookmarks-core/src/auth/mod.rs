//! ============================================================================
//! Auth Module - OAuth and Session Tokens
//! ============================================================================
//! Handles authentication against the Twitter API:
//! - Twitter OAuth 2.0 + PKCE (authorize, exchange, refresh, revoke)
//! - Single-session token store with compare-and-refresh
//! ============================================================================

pub mod pkce;
mod token_store;
mod twitter_oauth;

pub use pkce::PkcePair;
pub use token_store::TokenStore;
pub use twitter_oauth::TwitterOAuth;
