use chrono::{DateTime, Utc};

use crate::error::{BookmarksError, Result};
use crate::types::BookmarkPage;

/// Keep bookmarks created strictly after `threshold`.
///
/// `next_token` still describes the upstream page, not the filtered view, so
/// the next page may contain entries this page's filter never saw.
pub fn filter_after(page: BookmarkPage, threshold: DateTime<Utc>) -> BookmarkPage {
    BookmarkPage {
        bookmarks: page
            .bookmarks
            .into_iter()
            .filter(|b| b.created_at > threshold)
            .collect(),
        next_token: page.next_token,
    }
}

/// Parse a caller-supplied RFC 3339 threshold
pub fn parse_after(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BookmarksError::InvalidDateFormat(format!("{:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Author, Bookmark};
    use chrono::TimeZone;

    fn bookmark(id: &str, day: u32) -> Bookmark {
        Bookmark {
            id: id.to_string(),
            text: format!("tweet {}", id),
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            author: Author {
                id: "u1".to_string(),
                ..Default::default()
            },
        }
    }

    fn page() -> BookmarkPage {
        BookmarkPage {
            bookmarks: vec![bookmark("a", 5), bookmark("b", 1), bookmark("c", 10)],
            next_token: Some("cursor".to_string()),
        }
    }

    #[test]
    fn test_keeps_strictly_after() {
        let threshold = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let filtered = filter_after(page(), threshold);

        let ids: Vec<&str> = filtered.bookmarks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
        assert_eq!(filtered.next_token.as_deref(), Some("cursor"));
    }

    #[test]
    fn test_idempotent() {
        let threshold = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let once = filter_after(page(), threshold);
        let twice = filter_after(once.clone(), threshold);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let threshold = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let filtered = filter_after(page(), threshold);
        assert!(filtered.bookmarks.is_empty());
        assert_eq!(filtered.next_token.as_deref(), Some("cursor"));
    }

    #[test]
    fn test_parse_after() {
        assert_eq!(
            parse_after("2024-01-01T02:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(matches!(
            parse_after("2024-01-01"),
            Err(BookmarksError::InvalidDateFormat(_))
        ));
        assert!(matches!(
            parse_after(""),
            Err(BookmarksError::InvalidDateFormat(_))
        ));
    }
}
