use async_trait::async_trait;
use sqlx::{query_as, query_scalar};

use crate::application::repos::{BooksRepo, RepoError};
use crate::domain::entities::{BookRecord, BookWithBookmarkCount, RatingRecord};
use crate::domain::ratings::Score;

use super::util::convert_count;
use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: i64,
    title: String,
    summary: String,
}

impl From<BookRow> for BookRecord {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            summary: row.summary,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookCountRow {
    id: i64,
    title: String,
    bookmarks_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct RatingRow {
    pub(super) id: i64,
    pub(super) user_id: i64,
    pub(super) book_id: i64,
    pub(super) score: Option<i16>,
    pub(super) review: Option<String>,
}

impl TryFrom<RatingRow> for RatingRecord {
    type Error = RepoError;

    fn try_from(row: RatingRow) -> Result<Self, Self::Error> {
        let score = row
            .score
            .map(Score::try_from)
            .transpose()
            .map_err(|err| RepoError::Integrity {
                message: format!("rating {} holds an invalid score: {err}", row.id),
            })?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            book_id: row.book_id,
            score,
            review: row.review,
        })
    }
}

#[async_trait]
impl BooksRepo for PostgresRepositories {
    async fn list_books_with_bookmark_counts(
        &self,
    ) -> Result<Vec<BookWithBookmarkCount>, RepoError> {
        let rows = query_as::<_, BookCountRow>(
            r#"
            SELECT b.id, b.title, COUNT(bm.user_id) AS bookmarks_count
            FROM books b
            LEFT JOIN bookmarks bm ON bm.book_id = b.id
            GROUP BY b.id, b.title
            ORDER BY b.id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(BookWithBookmarkCount {
                    id: row.id,
                    title: row.title,
                    bookmarks_count: convert_count(row.bookmarks_count)?,
                })
            })
            .collect()
    }

    async fn find_book(&self, id: i64) -> Result<Option<BookRecord>, RepoError> {
        let row = query_as::<_, BookRow>("SELECT id, title, summary FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(BookRecord::from))
    }

    async fn list_ratings_for_book(&self, book_id: i64) -> Result<Vec<RatingRecord>, RepoError> {
        let rows = query_as::<_, RatingRow>(
            r#"
            SELECT id, user_id, book_id, score, review
            FROM ratings
            WHERE book_id = $1
            ORDER BY id
            "#,
        )
        .bind(book_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(RatingRecord::try_from).collect()
    }

    async fn bookmarked_book_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        query_scalar("SELECT book_id FROM bookmarks WHERE user_id = $1 ORDER BY book_id")
            .bind(user_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
