use async_trait::async_trait;
use sqlx::{query, query_scalar};

use crate::application::repos::{RepoError, SeedOutcome, SeedPlan, SeedRepo};

use super::util::convert_count;
use super::{PostgresRepositories, map_sqlx_error};

/// Serializes concurrent seeders (several replicas starting at once).
const SEED_LOCK_KEY: i64 = 0x5348_454c_4652_4154;

#[async_trait]
impl SeedRepo for PostgresRepositories {
    async fn seed_if_empty(&self, plan: &SeedPlan) -> Result<SeedOutcome, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        query("SELECT pg_advisory_xact_lock($1)")
            .bind(SEED_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let existing: i64 = query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if convert_count(existing)? > 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(SeedOutcome::AlreadyPresent);
        }

        let mut book_ids = Vec::with_capacity(plan.books.len());
        for book in &plan.books {
            let id: i64 =
                query_scalar("INSERT INTO books (title, summary) VALUES ($1, $2) RETURNING id")
                    .bind(&book.title)
                    .bind(&book.summary)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
            book_ids.push(id);
        }

        let mut user_ids = Vec::with_capacity(plan.users.len());
        let mut users_created = 0_u64;
        for user in &plan.users {
            let inserted: Option<i64> = query_scalar(
                r#"
                INSERT INTO users (email, password_hash)
                VALUES ($1, $2)
                ON CONFLICT (email) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            let id = match inserted {
                Some(id) => {
                    users_created += 1;
                    id
                }
                // registered before the catalog was seeded; keep their password
                None => query_scalar("SELECT id FROM users WHERE email = $1")
                    .bind(&user.email)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?,
            };
            user_ids.push(id);
        }

        let mut ratings_created = 0_u64;
        for rating in &plan.ratings {
            let (Some(&user_id), Some(&book_id)) =
                (user_ids.get(rating.user), book_ids.get(rating.book))
            else {
                return Err(RepoError::InvalidInput {
                    message: format!(
                        "seed rating references user #{} / book #{} outside the plan",
                        rating.user, rating.book
                    ),
                });
            };

            let result = query(
                r#"
                INSERT INTO ratings (user_id, book_id, score, review)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id, book_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(book_id)
            .bind(rating.score.map(|score| i16::from(score.get())))
            .bind(rating.review.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            ratings_created += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(SeedOutcome::Loaded {
            books: book_ids.len() as u64,
            users: users_created,
            ratings: ratings_created,
        })
    }
}
