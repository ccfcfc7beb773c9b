use async_trait::async_trait;
use sqlx::{query, query_as, query_scalar};

use crate::application::repos::{
    EngagementRepo, RepoError, ToggleBookmarkOutcome, UpsertRatingOutcome, UpsertRatingParams,
};
use crate::domain::entities::RatingRecord;

use super::books::RatingRow;
use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl EngagementRepo for PostgresRepositories {
    async fn toggle_bookmark(
        &self,
        user_id: i64,
        book_id: i64,
    ) -> Result<ToggleBookmarkOutcome, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        if !Self::lock_book(&mut tx, book_id).await? {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(ToggleBookmarkOutcome::BookMissing);
        }

        let rated: bool = query_scalar(
            "SELECT EXISTS (SELECT 1 FROM ratings WHERE user_id = $1 AND book_id = $2)",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        if rated {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(ToggleBookmarkOutcome::AlreadyRated);
        }

        let removed = query("DELETE FROM bookmarks WHERE user_id = $1 AND book_id = $2")
            .bind(user_id)
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        let outcome = if removed > 0 {
            ToggleBookmarkOutcome::Removed
        } else {
            query(
                r#"
                INSERT INTO bookmarks (user_id, book_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, book_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            ToggleBookmarkOutcome::Added
        };

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(outcome)
    }

    async fn book_exists(&self, book_id: i64) -> Result<bool, RepoError> {
        query_scalar("SELECT EXISTS (SELECT 1 FROM books WHERE id = $1)")
            .bind(book_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn upsert_rating(
        &self,
        params: UpsertRatingParams,
    ) -> Result<UpsertRatingOutcome, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        if !Self::lock_book(&mut tx, params.book_id).await? {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(UpsertRatingOutcome::BookMissing);
        }

        let row = query_as::<_, RatingRow>(
            r#"
            INSERT INTO ratings (user_id, book_id, score, review)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, book_id) DO UPDATE
            SET score = CASE WHEN $5 THEN EXCLUDED.score ELSE ratings.score END,
                review = CASE WHEN $6 THEN EXCLUDED.review ELSE ratings.review END
            RETURNING id, user_id, book_id, score, review
            "#,
        )
        .bind(params.user_id)
        .bind(params.book_id)
        .bind(params.score.value().map(|score| i16::from(score.get())))
        .bind(params.review.value().map(String::as_str))
        .bind(params.score.is_supplied())
        .bind(params.review.is_supplied())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        query("DELETE FROM bookmarks WHERE user_id = $1 AND book_id = $2")
            .bind(params.user_id)
            .bind(params.book_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        RatingRecord::try_from(row).map(UpsertRatingOutcome::Saved)
    }
}
