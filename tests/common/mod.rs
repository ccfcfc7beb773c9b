//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use shelfrate::application::catalog::CatalogService;
use shelfrate::application::engagement::EngagementService;
use shelfrate::application::identity::{AuthPolicy, IdentityService};
use shelfrate::application::repos::{
    BooksRepo, CreateAuthTokenParams, EngagementRepo, RepoError, SeedOutcome, SeedPlan, SeedRepo,
    StoreHealth, ToggleBookmarkOutcome, TokensRepo, UpsertRatingOutcome, UpsertRatingParams,
    UsersRepo,
};
use shelfrate::cache::{CacheConfig, CacheError, CacheStore, MemoryCacheStore, ViewCache};
use shelfrate::domain::entities::{
    AuthTokenRecord, BookRecord, BookWithBookmarkCount, RatingRecord, UserRecord,
};
use shelfrate::domain::ratings::FieldUpdate;
use shelfrate::domain::types::TokenKind;
use shelfrate::infra::http::ApiState;

#[derive(Default)]
struct Tables {
    books: BTreeMap<i64, BookRecord>,
    users: BTreeMap<i64, UserRecord>,
    ratings: BTreeMap<i64, RatingRecord>,
    bookmarks: BTreeSet<(i64, i64)>,
    tokens: Vec<AuthTokenRecord>,
    next_book: i64,
    next_user: i64,
    next_rating: i64,
}

/// Single store implementing every repository trait, guarded by one lock like a serializable
/// transaction would be.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    healthy: AtomicBool,
    book_reads: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        let store = Self::default();
        store.healthy.store(true, Ordering::SeqCst);
        Arc::new(store)
    }

    pub async fn add_book(&self, title: &str, summary: &str) -> i64 {
        let mut tables = self.tables.lock().await;
        tables.next_book += 1;
        let id = tables.next_book;
        tables.books.insert(
            id,
            BookRecord {
                id,
                title: title.to_string(),
                summary: summary.to_string(),
            },
        );
        id
    }

    pub async fn bookmark_count(&self, book_id: i64) -> usize {
        let tables = self.tables.lock().await;
        tables
            .bookmarks
            .iter()
            .filter(|(_, book)| *book == book_id)
            .count()
    }

    pub async fn token_count(&self) -> usize {
        self.tables.lock().await.tokens.len()
    }

    pub async fn expire_tokens(&self) {
        let mut tables = self.tables.lock().await;
        let past = OffsetDateTime::now_utc() - Duration::from_secs(60);
        for token in &mut tables.tokens {
            token.expires_at = past;
        }
    }

    pub async fn expire_tokens_of_kind(&self, kind: TokenKind) {
        let mut tables = self.tables.lock().await;
        let past = OffsetDateTime::now_utc() - Duration::from_secs(60);
        for token in tables.tokens.iter_mut().filter(|token| token.kind == kind) {
            token.expires_at = past;
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of times the book list or a book row was read from the store.
    pub fn book_reads(&self) -> usize {
        self.book_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BooksRepo for InMemoryStore {
    async fn list_books_with_bookmark_counts(
        &self,
    ) -> Result<Vec<BookWithBookmarkCount>, RepoError> {
        self.book_reads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().await;
        Ok(tables
            .books
            .values()
            .map(|book| BookWithBookmarkCount {
                id: book.id,
                title: book.title.clone(),
                bookmarks_count: tables
                    .bookmarks
                    .iter()
                    .filter(|(_, b)| *b == book.id)
                    .count() as u64,
            })
            .collect())
    }

    async fn find_book(&self, id: i64) -> Result<Option<BookRecord>, RepoError> {
        self.book_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.lock().await.books.get(&id).cloned())
    }

    async fn list_ratings_for_book(&self, book_id: i64) -> Result<Vec<RatingRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ratings
            .values()
            .filter(|rating| rating.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn bookmarked_book_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookmarks
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, book)| *book)
            .collect())
    }
}

#[async_trait]
impl EngagementRepo for InMemoryStore {
    async fn toggle_bookmark(
        &self,
        user_id: i64,
        book_id: i64,
    ) -> Result<ToggleBookmarkOutcome, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables.books.contains_key(&book_id) {
            return Ok(ToggleBookmarkOutcome::BookMissing);
        }
        let rated = tables
            .ratings
            .values()
            .any(|rating| rating.user_id == user_id && rating.book_id == book_id);
        if rated {
            return Ok(ToggleBookmarkOutcome::AlreadyRated);
        }
        if tables.bookmarks.remove(&(user_id, book_id)) {
            Ok(ToggleBookmarkOutcome::Removed)
        } else {
            tables.bookmarks.insert((user_id, book_id));
            Ok(ToggleBookmarkOutcome::Added)
        }
    }

    async fn book_exists(&self, book_id: i64) -> Result<bool, RepoError> {
        Ok(self.tables.lock().await.books.contains_key(&book_id))
    }

    async fn upsert_rating(
        &self,
        params: UpsertRatingParams,
    ) -> Result<UpsertRatingOutcome, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables.books.contains_key(&params.book_id) {
            return Ok(UpsertRatingOutcome::BookMissing);
        }

        let existing = tables
            .ratings
            .values()
            .find(|rating| rating.user_id == params.user_id && rating.book_id == params.book_id)
            .map(|rating| rating.id);
        let record = match existing {
            Some(id) => {
                let rating = tables
                    .ratings
                    .get_mut(&id)
                    .ok_or(RepoError::NotFound)?;
                if let FieldUpdate::Set(score) = params.score {
                    rating.score = score;
                }
                if let FieldUpdate::Set(review) = params.review {
                    rating.review = review;
                }
                rating.clone()
            }
            None => {
                tables.next_rating += 1;
                let record = RatingRecord {
                    id: tables.next_rating,
                    user_id: params.user_id,
                    book_id: params.book_id,
                    score: params.score.into_value(),
                    review: params.review.into_value(),
                };
                tables.ratings.insert(record.id, record.clone());
                record
            }
        };

        tables.bookmarks.remove(&(params.user_id, params.book_id));
        Ok(UpsertRatingOutcome::Saved(record))
    }
}

#[async_trait]
impl UsersRepo for InMemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|user| user.email == email) {
            return Ok(None);
        }
        tables.next_user += 1;
        let user = UserRecord {
            id: tables.next_user,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(Some(user))
    }
}

#[async_trait]
impl TokensRepo for InMemoryStore {
    async fn create_token(
        &self,
        params: CreateAuthTokenParams,
    ) -> Result<AuthTokenRecord, RepoError> {
        let record = AuthTokenRecord {
            id: Uuid::new_v4(),
            user_id: params.user_id,
            kind: params.kind,
            prefix: params.prefix,
            hashed_secret: params.hashed_secret,
            expires_at: params.expires_at,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tables.lock().await.tokens.push(record.clone());
        Ok(record)
    }

    async fn find_token_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<AuthTokenRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tokens
            .iter()
            .find(|token| token.prefix == prefix)
            .cloned())
    }

    async fn delete_expired_tokens(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> Result<u64, RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.tokens.len();
        tables
            .tokens
            .retain(|token| token.user_id != user_id || token.expires_at >= now);
        Ok((before - tables.tokens.len()) as u64)
    }
}

#[async_trait]
impl SeedRepo for InMemoryStore {
    async fn seed_if_empty(&self, plan: &SeedPlan) -> Result<SeedOutcome, RepoError> {
        let mut tables = self.tables.lock().await;
        if !tables.books.is_empty() {
            return Ok(SeedOutcome::AlreadyPresent);
        }

        let mut book_ids = Vec::with_capacity(plan.books.len());
        for book in &plan.books {
            tables.next_book += 1;
            let id = tables.next_book;
            tables.books.insert(
                id,
                BookRecord {
                    id,
                    title: book.title.clone(),
                    summary: book.summary.clone(),
                },
            );
            book_ids.push(id);
        }

        let mut user_ids = Vec::with_capacity(plan.users.len());
        let mut users_created = 0_u64;
        for user in &plan.users {
            let existing = tables
                .users
                .values()
                .find(|u| u.email == user.email)
                .map(|u| u.id);
            let id = match existing {
                Some(id) => id,
                None => {
                    users_created += 1;
                    tables.next_user += 1;
                    let id = tables.next_user;
                    tables.users.insert(
                        id,
                        UserRecord {
                            id,
                            email: user.email.clone(),
                            password_hash: user.password_hash.clone(),
                            created_at: OffsetDateTime::now_utc(),
                        },
                    );
                    id
                }
            };
            user_ids.push(id);
        }

        for rating in &plan.ratings {
            tables.next_rating += 1;
            let id = tables.next_rating;
            tables.ratings.insert(
                id,
                RatingRecord {
                    id,
                    user_id: user_ids[rating.user],
                    book_id: book_ids[rating.book],
                    score: rating.score,
                    review: rating.review.clone(),
                },
            );
        }

        Ok(SeedOutcome::Loaded {
            books: plan.books.len() as u64,
            users: users_created,
            ratings: plan.ratings.len() as u64,
        })
    }
}

#[async_trait]
impl StoreHealth for InMemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepoError::Timeout)
        }
    }
}

/// Cache backend whose every call fails.
#[derive(Default)]
pub struct BrokenCacheStore {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CacheStore for BrokenCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

pub fn test_policy() -> AuthPolicy {
    AuthPolicy {
        min_password_length: 8,
        ..AuthPolicy::default()
    }
}

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub cache_store: Arc<MemoryCacheStore>,
    pub cache: ViewCache,
    pub catalog: Arc<CatalogService>,
    pub engagement: Arc<EngagementService>,
    pub identity: Arc<IdentityService>,
}

impl Harness {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let config = CacheConfig::default();
        let cache_store = Arc::new(MemoryCacheStore::new(&config));
        let cache = ViewCache::new(cache_store.clone(), &config);
        Self::assemble(store, cache_store, cache)
    }

    pub fn with_cache(cache: ViewCache) -> Self {
        let store = InMemoryStore::new();
        let cache_store = Arc::new(MemoryCacheStore::new(&CacheConfig::default()));
        Self::assemble(store, cache_store, cache)
    }

    fn assemble(
        store: Arc<InMemoryStore>,
        cache_store: Arc<MemoryCacheStore>,
        cache: ViewCache,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(store.clone(), cache.clone()));
        let engagement = Arc::new(EngagementService::new(store.clone(), cache.clone()));
        let identity = Arc::new(IdentityService::new(
            store.clone(),
            store.clone(),
            test_policy(),
        ));
        Self {
            store,
            cache_store,
            cache,
            catalog,
            engagement,
            identity,
        }
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            catalog: self.catalog.clone(),
            engagement: self.engagement.clone(),
            identity: self.identity.clone(),
            health: self.store.clone(),
        }
    }

    /// Register a user through the identity service and return `(user_id, access, refresh)`.
    pub async fn register(&self, email: &str) -> (i64, String, String) {
        let session = self
            .identity
            .register_or_login(email, "correct horse battery")
            .await
            .expect("register user");
        (session.user.id, session.access, session.refresh)
    }
}
