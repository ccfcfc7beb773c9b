//! Register-or-login, bearer token issuance and authentication.

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::repos::{CreateAuthTokenParams, RepoError, TokensRepo, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::types::TokenKind;
use crate::domain::users::{INVALID_CREDENTIALS, check_password, normalize_email};

const PREFIX_LEN: usize = 12;
const MIN_SECRET_LEN: usize = 32;

/// Who is calling. Read and write operations receive this instead of a request object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User(i64),
}

impl Actor {
    pub fn user_id(self) -> Option<i64> {
        match self {
            Actor::Anonymous => None,
            Actor::User(id) => Some(id),
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token")]
    Invalid,
    #[error("expired token")]
    Expired,
    #[error("token lookup failed")]
    Unavailable(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub min_password_length: usize,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(300),
            refresh_ttl: Duration::from_secs(86_400),
            min_password_length: 8,
        }
    }
}

impl From<&crate::config::AuthSettings> for AuthPolicy {
    fn from(settings: &crate::config::AuthSettings) -> Self {
        Self {
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
            min_password_length: settings.min_password_length.get() as usize,
        }
    }
}

/// Result of a successful register-or-login.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserRecord,
    pub created: bool,
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UsersRepo>,
    tokens: Arc<dyn TokensRepo>,
    policy: AuthPolicy,
}

impl IdentityService {
    pub fn new(users: Arc<dyn UsersRepo>, tokens: Arc<dyn TokensRepo>, policy: AuthPolicy) -> Self {
        Self {
            users,
            tokens,
            policy,
        }
    }

    /// Log in when the email is known, register otherwise. Both paths issue a fresh token pair.
    pub async fn register_or_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let email = normalize_email(email)?;
        check_password(password, self.policy.min_password_length)?;

        let (user, created) = match self.users.find_user_by_email(&email).await? {
            Some(user) => (self.login(user, password).await?, false),
            None => {
                let password_hash = hash_password(password.to_owned()).await?;
                match self.users.create_user(&email, &password_hash).await? {
                    Some(user) => (user, true),
                    None => {
                        // lost a concurrent registration for the same email
                        let user = self
                            .users
                            .find_user_by_email(&email)
                            .await?
                            .ok_or(RepoError::NotFound)?;
                        (self.login(user, password).await?, false)
                    }
                }
            }
        };

        let now = OffsetDateTime::now_utc();
        let pruned = self.tokens.delete_expired_tokens(user.id, now).await?;
        let refresh = self.issue(user.id, TokenKind::Refresh, now).await?;
        let access = self.issue(user.id, TokenKind::Access, now).await?;

        info!(
            target: "shelfrate::application::identity",
            user_id = user.id,
            created,
            pruned_tokens = pruned,
            "session issued"
        );
        Ok(Session {
            user,
            created,
            access,
            refresh,
        })
    }

    /// Resolve an optional bearer token. No token means an anonymous caller.
    pub async fn resolve_actor(&self, token: Option<&str>) -> Result<Actor, AuthError> {
        match token {
            None => Ok(Actor::Anonymous),
            Some(token) => self
                .verify(token, TokenKind::Access)
                .await
                .map(Actor::User),
        }
    }

    /// Exchange a refresh token for a new access token, dropping the user's expired tokens.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let user_id = self.verify(refresh_token, TokenKind::Refresh).await?;
        let now = OffsetDateTime::now_utc();
        let pruned = self.tokens.delete_expired_tokens(user_id, now).await?;
        let access = self.issue(user_id, TokenKind::Access, now).await?;
        debug!(
            target: "shelfrate::application::identity",
            user_id,
            pruned_tokens = pruned,
            "access token refreshed"
        );
        Ok(access)
    }

    async fn login(&self, user: UserRecord, password: &str) -> Result<UserRecord, IdentityError> {
        let matches = verify_password(password.to_owned(), user.password_hash.clone()).await?;
        if !matches {
            return Err(DomainError::validation(INVALID_CREDENTIALS).into());
        }
        Ok(user)
    }

    async fn issue(
        &self,
        user_id: i64,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> Result<String, RepoError> {
        let ttl = match kind {
            TokenKind::Access => self.policy.access_ttl,
            TokenKind::Refresh => self.policy.refresh_ttl,
        };
        let expires_at = now + ttl;

        let prefix = generate_prefix();
        let secret = generate_secret();
        let token = format!("{}_{prefix}_{secret}", kind.token_tag());

        self.tokens
            .create_token(CreateAuthTokenParams {
                user_id,
                kind,
                prefix,
                hashed_secret: hash_secret(&secret),
                expires_at,
            })
            .await?;
        Ok(token)
    }

    async fn verify(&self, token: &str, expected: TokenKind) -> Result<i64, AuthError> {
        let parsed = parse_token(token).ok_or(AuthError::Invalid)?;
        if parsed.kind != expected {
            return Err(AuthError::Invalid);
        }

        let record = self
            .tokens
            .find_token_by_prefix(&parsed.prefix)
            .await?
            .ok_or(AuthError::Invalid)?;
        if record.kind != expected {
            return Err(AuthError::Invalid);
        }

        let hashed_input = hash_secret(&parsed.secret);
        if record.hashed_secret.ct_eq(&hashed_input).unwrap_u8() == 0 {
            return Err(AuthError::Invalid);
        }
        if record.expires_at <= OffsetDateTime::now_utc() {
            return Err(AuthError::Expired);
        }

        Ok(record.user_id)
    }
}

/// Argon2id PHC string with a random salt. Runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, IdentityError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| IdentityError::PasswordHash(err.to_string()))
    })
    .await
    .map_err(|err| IdentityError::PasswordHash(err.to_string()))?
}

async fn verify_password(password: String, hash: String) -> Result<bool, IdentityError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|err| IdentityError::PasswordHash(format!("stored hash is invalid: {err}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|err| IdentityError::PasswordHash(err.to_string()))?
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_prefix() -> String {
    Uuid::new_v4().simple().to_string()[..PREFIX_LEN].to_string()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

#[derive(Debug, PartialEq, Eq)]
struct ParsedToken {
    kind: TokenKind,
    prefix: String,
    secret: String,
}

fn parse_token(token: &str) -> Option<ParsedToken> {
    let mut parts = token.splitn(3, '_');
    let kind = TokenKind::from_token_tag(parts.next()?)?;
    let prefix = parts.next()?;
    let secret = parts.next()?;
    if prefix.is_empty() || secret.len() < MIN_SECRET_LEN {
        return None;
    }
    Some(ParsedToken {
        kind,
        prefix: prefix.to_string(),
        secret: secret.to_string(),
    })
}
