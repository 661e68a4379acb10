//! ============================================================================
//! Bookmarks Module - Fetch, Normalize, Filter
//! ============================================================================
//! - UpstreamClient: bookmark reads with retry/backoff
//! - normalize: Twitter v2 payload -> BookmarkPage
//! - filter_after: created-at threshold over a page
//! ============================================================================

mod client;
mod filter;
mod normalize;

pub use client::UpstreamClient;
pub use filter::{filter_after, parse_after};
pub use normalize::normalize;
