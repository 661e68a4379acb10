//! Maps the Twitter v2 bookmarks payload (tweets + included users + meta
//! cursor) onto the flat [`BookmarkPage`] model.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{BookmarksError, Result};
use crate::types::{Author, Bookmark, BookmarkPage};

// ============================================================================
// Twitter API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct BookmarksResponse {
    /// Omitted entirely when the account has no bookmarks
    #[serde(default)]
    data: Vec<TweetData>,
    #[serde(default)]
    includes: Includes,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    text: String,
    created_at: DateTime<Utc>,
    author_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<UserData>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    next_token: Option<String>,
}

/// Decode an upstream bookmarks body into a page, preserving tweet order
pub fn normalize(body: &str) -> Result<BookmarkPage> {
    let response: BookmarksResponse = serde_json::from_str(body)
        .map_err(|e| BookmarksError::ResponseMalformed(format!("bookmarks response: {}", e)))?;

    let users: HashMap<&str, &UserData> = response
        .includes
        .users
        .iter()
        .map(|user| (user.id.as_str(), user))
        .collect();

    let bookmarks = response
        .data
        .iter()
        .map(|tweet| {
            let mut author = Author {
                id: tweet.author_id.clone(),
                ..Default::default()
            };
            if let Some(user) = users.get(tweet.author_id.as_str()) {
                author.username = user.username.clone();
                author.name = user.name.clone();
            }

            Bookmark {
                id: tweet.id.clone(),
                text: tweet.text.clone(),
                created_at: tweet.created_at,
                author,
            }
        })
        .collect();

    Ok(BookmarkPage {
        bookmarks,
        next_token: response.meta.next_token,
    })
}
