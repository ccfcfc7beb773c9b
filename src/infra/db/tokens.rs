use async_trait::async_trait;
use sqlx::{query, query_as};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateAuthTokenParams, RepoError, TokensRepo};
use crate::domain::entities::AuthTokenRecord;
use crate::domain::types::TokenKind;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, sqlx::FromRow)]
struct AuthTokenRow {
    id: Uuid,
    user_id: i64,
    kind: String,
    prefix: String,
    hashed_secret: Vec<u8>,
    expires_at: OffsetDateTime,
    created_at: OffsetDateTime,
}

impl TryFrom<AuthTokenRow> for AuthTokenRecord {
    type Error = RepoError;

    fn try_from(row: AuthTokenRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<TokenKind>()
            .map_err(|_| RepoError::Integrity {
                message: format!("token {} has unknown kind `{}`", row.id, row.kind),
            })?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            kind,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl TokensRepo for PostgresRepositories {
    async fn create_token(
        &self,
        params: CreateAuthTokenParams,
    ) -> Result<AuthTokenRecord, RepoError> {
        let row = query_as::<_, AuthTokenRow>(
            r#"
            INSERT INTO auth_tokens (id, user_id, kind, prefix, hashed_secret, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, kind, prefix, hashed_secret, expires_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.user_id)
        .bind(params.kind.as_str())
        .bind(params.prefix)
        .bind(params.hashed_secret)
        .bind(params.expires_at)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        AuthTokenRecord::try_from(row)
    }

    async fn find_token_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<AuthTokenRecord>, RepoError> {
        let row = query_as::<_, AuthTokenRow>(
            r#"
            SELECT id, user_id, kind, prefix, hashed_secret, expires_at, created_at
            FROM auth_tokens
            WHERE prefix = $1
            "#,
        )
        .bind(prefix)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(AuthTokenRecord::try_from).transpose()
    }

    async fn delete_expired_tokens(
        &self,
        user_id: i64,
        now: OffsetDateTime,
    ) -> Result<u64, RepoError> {
        let result = query("DELETE FROM auth_tokens WHERE user_id = $1 AND expires_at <= $2")
            .bind(user_id)
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
