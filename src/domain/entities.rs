//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use shelfrate_api_types::{BookSummary, RatingView};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{ratings::Score, types::TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookRecord {
    pub id: i64,
    pub title: String,
    pub summary: String,
}

/// A book joined with the number of users who bookmarked it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookWithBookmarkCount {
    pub id: i64,
    pub title: String,
    pub bookmarks_count: u64,
}

impl From<BookWithBookmarkCount> for BookSummary {
    fn from(value: BookWithBookmarkCount) -> Self {
        Self {
            id: value.id,
            title: value.title,
            bookmarks_count: value.bookmarks_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingRecord {
    pub id: i64,
    pub user_id: i64,
    pub book_id: i64,
    pub score: Option<Score>,
    pub review: Option<String>,
}

impl RatingRecord {
    /// Reviews count only when they carry text.
    pub fn has_review(&self) -> bool {
        self.review.as_deref().is_some_and(|text| !text.is_empty())
    }
}

impl From<&RatingRecord> for RatingView {
    fn from(record: &RatingRecord) -> Self {
        Self {
            user: record.user_id,
            book: record.book_id,
            score: record.score.map(Score::get),
            review: record.review.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokenRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub kind: TokenKind,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}
