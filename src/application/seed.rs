//! Idempotent fixture loading for an empty catalog.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::application::identity::{IdentityError, hash_password};
use crate::application::repos::{
    RepoError, SeedBook, SeedOutcome, SeedPlan, SeedRating, SeedRepo, SeedUser,
};
use crate::domain::error::DomainError;
use crate::domain::ratings::RatingDraft;
use crate::domain::users::normalize_email;

const BUILTIN_FIXTURE: &str = include_str!("../../fixtures/initial_data.json");
const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read fixture `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fixture is not valid JSON")]
    Parse(#[from] serde_json::Error),
    #[error("fixture is invalid: {0}")]
    Invalid(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub books: Vec<FixtureBook>,
    #[serde(default)]
    pub users: Vec<FixtureUser>,
    #[serde(default)]
    pub ratings: Vec<FixtureRating>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureBook {
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureUser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRating {
    /// Email of one of the fixture users.
    pub user: String,
    /// Position of the book in `books`.
    pub book: usize,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub review: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureSource {
    /// The fixture compiled into the binary.
    Builtin,
    File(PathBuf),
}

impl FixtureSource {
    pub fn from_path(path: Option<&Path>) -> Self {
        path.map_or(Self::Builtin, |path| Self::File(path.to_path_buf()))
    }
}

pub fn parse_fixture(json: &str) -> Result<Fixture, SeedError> {
    Ok(serde_json::from_str(json)?)
}

#[derive(Clone)]
pub struct SeedService {
    repo: Arc<dyn SeedRepo>,
}

impl SeedService {
    pub fn new(repo: Arc<dyn SeedRepo>) -> Self {
        Self { repo }
    }

    pub async fn load(&self, source: &FixtureSource) -> Result<SeedOutcome, SeedError> {
        let fixture = match source {
            FixtureSource::Builtin => parse_fixture(BUILTIN_FIXTURE)?,
            FixtureSource::File(path) => {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| SeedError::Read {
                        path: path.clone(),
                        source,
                    })?;
                parse_fixture(&raw)?
            }
        };

        let plan = build_plan(fixture).await?;
        let outcome = self.repo.seed_if_empty(&plan).await?;

        match outcome {
            SeedOutcome::Loaded {
                books,
                users,
                ratings,
            } => info!(
                target: "shelfrate::application::seed",
                source = ?source,
                books,
                users,
                ratings,
                "fixture loaded"
            ),
            SeedOutcome::AlreadyPresent => info!(
                target: "shelfrate::application::seed",
                source = ?source,
                "books already present; fixture skipped"
            ),
        }
        Ok(outcome)
    }
}

/// Validate a fixture and hash its passwords.
pub async fn build_plan(fixture: Fixture) -> Result<SeedPlan, SeedError> {
    let mut books = Vec::with_capacity(fixture.books.len());
    for (index, book) in fixture.books.into_iter().enumerate() {
        let title = book.title.trim().to_string();
        if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            return Err(SeedError::Invalid(format!(
                "book #{index} needs a title of 1 to {MAX_TITLE_CHARS} characters"
            )));
        }
        books.push(SeedBook {
            title,
            summary: book.summary,
        });
    }

    let mut users = Vec::with_capacity(fixture.users.len());
    let mut user_index = HashMap::new();
    for user in fixture.users {
        let email = normalize_email(&user.email).map_err(|err| invalid(&user.email, err))?;
        if user_index.insert(email.clone(), users.len()).is_some() {
            return Err(SeedError::Invalid(format!("user `{email}` is listed twice")));
        }
        let password_hash = hash_password(user.password).await?;
        users.push(SeedUser {
            email,
            password_hash,
        });
    }

    let mut ratings = Vec::with_capacity(fixture.ratings.len());
    for rating in fixture.ratings {
        let user = normalize_email(&rating.user)
            .ok()
            .and_then(|email| user_index.get(&email).copied())
            .ok_or_else(|| {
                SeedError::Invalid(format!("rating references unknown user `{}`", rating.user))
            })?;
        if rating.book >= books.len() {
            return Err(SeedError::Invalid(format!(
                "rating references book #{} but only {} books are listed",
                rating.book,
                books.len()
            )));
        }
        let draft = RatingDraft::parse(Some(rating.score), Some(rating.review))
            .and_then(|draft| draft.require_content().map(|()| draft))
            .map_err(|err| invalid(&rating.user, err))?;
        ratings.push(SeedRating {
            user,
            book: rating.book,
            score: draft.score.into_value(),
            review: draft.review.into_value(),
        });
    }

    let mut pairs = std::collections::HashSet::new();
    if let Some(duplicate) = ratings.iter().find(|r| !pairs.insert((r.user, r.book))) {
        return Err(SeedError::Invalid(format!(
            "book #{} is rated twice by the same user",
            duplicate.book
        )));
    }

    Ok(SeedPlan {
        books,
        users,
        ratings,
    })
}

fn invalid(subject: &str, err: DomainError) -> SeedError {
    SeedError::Invalid(format!("`{subject}`: {err}"))
}
