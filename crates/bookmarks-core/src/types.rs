//! ============================================================================
//! Core Types for the Bookmarks Relay
//! ============================================================================
//! Domain objects returned to callers and the session token pair shared
//! between the authenticator and the upstream client.
//! These types are serialized to JSON by the HTTP surface.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds before the real expiry at which a token is treated as expired
const EXPIRY_BUFFER_SECS: i64 = 300;

/// OAuth 2.0 tokens for a single logical session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// None when the token endpoint did not report `expires_in`
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
}

impl SessionTokens {
    /// Check if tokens are expired (with 5 min buffer).
    /// Unknown expiry is never treated as expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at.timestamp() <= now.timestamp() + EXPIRY_BUFFER_SECS,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

/// Author of a bookmarked tweet, denormalized at read time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    /// Empty when the upstream `includes.users` payload omits the author
    pub username: String,
    pub name: String,
}

/// A single bookmarked tweet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: Author,
}

/// One page of bookmarks plus the opaque upstream cursor for the next page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkPage {
    pub bookmarks: Vec<Bookmark>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

/// Authorization lifecycle of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Where to send the user's browser to begin the authorization-code flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn tokens(expires_at: Option<DateTime<Utc>>) -> SessionTokens {
        SessionTokens {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at,
            scope: Some("bookmark.read".to_string()),
        }
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();

        assert!(!tokens(Some(now + Duration::seconds(3600))).is_expired_at(now));
        assert!(tokens(Some(now - Duration::seconds(100))).is_expired_at(now));
        // Inside the 5 minute buffer
        assert!(tokens(Some(now + Duration::seconds(120))).is_expired_at(now));
    }

    #[test]
    fn test_unknown_expiry_is_not_expired() {
        assert!(!tokens(None).is_expired());
    }

    #[test]
    fn test_page_serialization_omits_missing_cursor() {
        let page = BookmarkPage {
            bookmarks: vec![Bookmark {
                id: "1".to_string(),
                text: "hi".to_string(),
                created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                author: Author {
                    id: "u1".to_string(),
                    username: "bob".to_string(),
                    name: "Bob".to_string(),
                },
            }],
            next_token: None,
        };

        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("next_token").is_none());
        assert_eq!(json["bookmarks"][0]["created_at"], "2024-01-01T00:00:00Z");
        assert_eq!(json["bookmarks"][0]["author"]["username"], "bob");
    }

    #[test]
    fn test_auth_state_serializes_snake_case() {
        let json = serde_json::to_string(&AuthState::Unauthenticated).unwrap();
        assert_eq!(json, "\"unauthenticated\"");
    }
}
