//! Read side: book list and book detail, served cache-first.

use std::collections::HashSet;
use std::sync::Arc;

use shelfrate_api_types::{BookDetail, BookListItem, BookSummary, BookmarkFlag};
use thiserror::Error;
use tracing::debug;

use crate::application::identity::Actor;
use crate::application::repos::{BooksRepo, RepoError};
use crate::cache::{CacheKey, ViewCache};
use crate::domain::error::DomainError;
use crate::domain::ratings::book_detail;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BooksRepo>,
    cache: ViewCache,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BooksRepo>, cache: ViewCache) -> Self {
        Self { books, cache }
    }

    /// Book list with a per-actor bookmark flag.
    ///
    /// Only the actor-independent summaries are cached; flags are looked up per call.
    pub async fn list_books(&self, actor: Actor) -> Result<Vec<BookListItem>, CatalogError> {
        let summaries = self.book_summaries().await?;

        let items = match actor {
            Actor::Anonymous => summaries
                .into_iter()
                .map(|summary| BookListItem::from_summary(summary, BookmarkFlag::LoginRequired))
                .collect(),
            Actor::User(user_id) => {
                let bookmarked: HashSet<i64> = self
                    .books
                    .bookmarked_book_ids(user_id)
                    .await?
                    .into_iter()
                    .collect();
                summaries
                    .into_iter()
                    .map(|summary| {
                        let flag = BookmarkFlag::Known(bookmarked.contains(&summary.id));
                        BookListItem::from_summary(summary, flag)
                    })
                    .collect()
            }
        };

        Ok(items)
    }

    pub async fn book_detail(&self, id: i64) -> Result<BookDetail, CatalogError> {
        let key = CacheKey::BookDetail(id);
        let ticket = self.cache.ticket();
        if let Some(detail) = self.cache.get::<BookDetail>(key).await {
            return Ok(detail);
        }

        let book = self
            .books
            .find_book(id)
            .await?
            .ok_or(DomainError::not_found("book"))?;
        let ratings = self.books.list_ratings_for_book(id).await?;
        let detail = book_detail(book, &ratings);

        debug!(
            target: "shelfrate::application::catalog",
            book_id = id,
            ratings = ratings.len(),
            "computed book detail"
        );
        self.cache.put(key, &detail, ticket).await;
        Ok(detail)
    }

    async fn book_summaries(&self) -> Result<Vec<BookSummary>, CatalogError> {
        let ticket = self.cache.ticket();
        if let Some(cached) = self.cache.get::<Vec<BookSummary>>(CacheKey::AllBooks).await {
            return Ok(cached);
        }

        let summaries: Vec<BookSummary> = self
            .books
            .list_books_with_bookmark_counts()
            .await?
            .into_iter()
            .map(BookSummary::from)
            .collect();

        debug!(
            target: "shelfrate::application::catalog",
            books = summaries.len(),
            "computed book list"
        );
        self.cache.put(CacheKey::AllBooks, &summaries, ticket).await;
        Ok(summaries)
    }
}
