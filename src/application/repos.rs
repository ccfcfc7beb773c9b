//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{
    AuthTokenRecord, BookRecord, BookWithBookmarkCount, RatingRecord, UserRecord,
};
use crate::domain::ratings::{FieldUpdate, Score};
use crate::domain::types::TokenKind;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait BooksRepo: Send + Sync {
    /// Every book with its bookmark count, ordered by id.
    async fn list_books_with_bookmark_counts(
        &self,
    ) -> Result<Vec<BookWithBookmarkCount>, RepoError>;

    async fn find_book(&self, id: i64) -> Result<Option<BookRecord>, RepoError>;

    /// Ratings of one book ordered by id.
    async fn list_ratings_for_book(&self, book_id: i64) -> Result<Vec<RatingRecord>, RepoError>;

    async fn bookmarked_book_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleBookmarkOutcome {
    Added,
    Removed,
    BookMissing,
    /// The user already rated the book, so it cannot be bookmarked.
    AlreadyRated,
}

#[derive(Debug, Clone)]
pub struct UpsertRatingParams {
    pub user_id: i64,
    pub book_id: i64,
    /// `Keep` leaves the stored score alone; `Set(None)` clears it.
    pub score: FieldUpdate<Score>,
    pub review: FieldUpdate<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertRatingOutcome {
    Saved(RatingRecord),
    BookMissing,
}

/// Writes touching bookmarks and ratings. Each call is one transaction holding the book row lock.
#[async_trait]
pub trait EngagementRepo: Send + Sync {
    async fn toggle_bookmark(
        &self,
        user_id: i64,
        book_id: i64,
    ) -> Result<ToggleBookmarkOutcome, RepoError>;

    /// Used to order validation errors; writes do their own check under the row lock.
    async fn book_exists(&self, book_id: i64) -> Result<bool, RepoError>;

    /// Insert or merge the rating and drop any bookmark the user holds on the book.
    async fn upsert_rating(
        &self,
        params: UpsertRatingParams,
    ) -> Result<UpsertRatingOutcome, RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Returns `None` when the email is already registered.
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<UserRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateAuthTokenParams {
    pub user_id: i64,
    pub kind: TokenKind,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait TokensRepo: Send + Sync {
    async fn create_token(
        &self,
        params: CreateAuthTokenParams,
    ) -> Result<AuthTokenRecord, RepoError>;

    async fn find_token_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<AuthTokenRecord>, RepoError>;

    /// Remove the user's tokens that expired before `now`; returns how many were removed.
    async fn delete_expired_tokens(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> Result<u64, RepoError>;
}

#[derive(Debug, Clone)]
pub struct SeedBook {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub struct SeedUser {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct SeedRating {
    /// Index into [`SeedPlan::users`].
    pub user: usize,
    /// Index into [`SeedPlan::books`].
    pub book: usize,
    pub score: Option<Score>,
    pub review: Option<String>,
}

/// Validated fixture, ready to be written.
#[derive(Debug, Clone, Default)]
pub struct SeedPlan {
    pub books: Vec<SeedBook>,
    pub users: Vec<SeedUser>,
    pub ratings: Vec<SeedRating>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Loaded {
        books: u64,
        users: u64,
        ratings: u64,
    },
    AlreadyPresent,
}

#[async_trait]
pub trait SeedRepo: Send + Sync {
    /// Write the plan in one transaction unless books already exist.
    async fn seed_if_empty(&self, plan: &SeedPlan) -> Result<SeedOutcome, RepoError>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
