//! Request and response shapes for the shelfrate REST API.
//!
//! The server serializes these types directly, and the cached book views are stored in the same
//! JSON form, so a cache hit and a fresh computation are byte-compatible.

use serde::{Deserialize, Serialize};

/// Sentinel reported in `is_bookmark` for anonymous callers.
pub const LOGIN_REQUIRED: &str = "Login Required";

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookmarkRequest {
    /// Book id.
    pub book: i64,
}

/// Outer `None` means the field was omitted, `Some(None)` means an explicit `null`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RatingRequest {
    /// Book id.
    pub book: i64,
    /// Score from 1 to 5. Kept wide so out-of-range values surface as validation errors.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub score: Option<Option<i64>>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub review: Option<Option<String>>,
}

/// Only called when the key is present, so a `null` becomes `Some(None)`.
fn present_or_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DetailResponse {
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RegisterLoginResponse {
    pub user_id: i64,
    pub email: String,
    pub created: bool,
    pub refresh: String,
    pub access: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RefreshResponse {
    pub access: String,
}

/// A rating as exposed by the API (both the upsert response and the detail listing).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RatingView {
    pub user: i64,
    pub book: i64,
    pub score: Option<u8>,
    pub review: Option<String>,
}

/// Actor-independent part of a book list entry. This is what gets cached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub bookmarks_count: u64,
}

/// `true`/`false` for authenticated callers, `"Login Required"` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkFlag {
    Known(bool),
    LoginRequired,
}

impl Serialize for BookmarkFlag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BookmarkFlag::Known(value) => serializer.serialize_bool(*value),
            BookmarkFlag::LoginRequired => serializer.serialize_str(LOGIN_REQUIRED),
        }
    }
}

impl<'de> Deserialize<'de> for BookmarkFlag {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(value) => Ok(BookmarkFlag::Known(value)),
            Raw::Text(text) if text == LOGIN_REQUIRED => Ok(BookmarkFlag::LoginRequired),
            Raw::Text(other) => Err(serde::de::Error::custom(format!(
                "unexpected bookmark flag `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BookListItem {
    pub id: i64,
    pub title: String,
    pub bookmarks_count: u64,
    pub is_bookmark: BookmarkFlag,
}

impl BookListItem {
    pub fn from_summary(summary: BookSummary, is_bookmark: BookmarkFlag) -> Self {
        Self {
            id: summary.id,
            title: summary.title,
            bookmarks_count: summary.bookmarks_count,
            is_bookmark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScoreCount {
    pub score: u8,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BookDetail {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub reviews_count: u64,
    pub scores_count: u64,
    pub scores_mean: Option<f64>,
    pub scores_count_group_by_number: Vec<ScoreCount>,
    pub ratings: Vec<RatingView>,
}
