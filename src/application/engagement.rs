//! Write side: bookmark toggles and rating upserts.

use std::sync::Arc;

use shelfrate_api_types::RatingView;
use thiserror::Error;
use tracing::info;

use crate::application::identity::Actor;
use crate::application::repos::{
    EngagementRepo, RepoError, ToggleBookmarkOutcome, UpsertRatingOutcome, UpsertRatingParams,
};
use crate::cache::{CacheKey, ViewCache};
use crate::domain::error::DomainError;
use crate::domain::ratings::RatingDraft;
use crate::domain::types::BookmarkChange;

#[derive(Debug, Error)]
pub enum EngagementError {
    #[error("authentication required")]
    Unauthorized,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct EngagementService {
    repo: Arc<dyn EngagementRepo>,
    cache: ViewCache,
}

impl EngagementService {
    pub fn new(repo: Arc<dyn EngagementRepo>, cache: ViewCache) -> Self {
        Self { repo, cache }
    }

    pub async fn toggle_bookmark(
        &self,
        actor: Actor,
        book_id: i64,
    ) -> Result<BookmarkChange, EngagementError> {
        let user_id = actor.user_id().ok_or(EngagementError::Unauthorized)?;

        let change = match self.repo.toggle_bookmark(user_id, book_id).await? {
            ToggleBookmarkOutcome::Added => BookmarkChange::Added,
            ToggleBookmarkOutcome::Removed => BookmarkChange::Removed,
            ToggleBookmarkOutcome::BookMissing => return Err(missing_book(book_id).into()),
            ToggleBookmarkOutcome::AlreadyRated => {
                return Err(DomainError::validation(format!(
                    "Book With ID '{book_id}' Is Have a Rating!"
                ))
                .into());
            }
        };

        self.cache
            .invalidate(&CacheKey::affected_by_write(book_id))
            .await;

        info!(
            target: "shelfrate::application::engagement",
            user_id,
            book_id,
            change = ?change,
            "bookmark toggled"
        );
        Ok(change)
    }

    /// Supplied fields overwrite (an explicit `null` clears), omitted fields keep their stored
    /// value. The outer `Option` of each field tells omitted from `null`.
    ///
    /// Field errors (score range, unknown book) are reported before the score-or-review check.
    pub async fn upsert_rating(
        &self,
        actor: Actor,
        book_id: i64,
        score: Option<Option<i64>>,
        review: Option<Option<String>>,
    ) -> Result<RatingView, EngagementError> {
        let user_id = actor.user_id().ok_or(EngagementError::Unauthorized)?;
        let draft = RatingDraft::parse(score, review)?;
        if let Err(err) = draft.require_content() {
            if !self.repo.book_exists(book_id).await? {
                return Err(missing_book(book_id).into());
            }
            return Err(err.into());
        }

        let params = UpsertRatingParams {
            user_id,
            book_id,
            score: draft.score,
            review: draft.review,
        };
        let record = match self.repo.upsert_rating(params).await? {
            UpsertRatingOutcome::Saved(record) => record,
            UpsertRatingOutcome::BookMissing => return Err(missing_book(book_id).into()),
        };

        self.cache
            .invalidate(&CacheKey::affected_by_write(book_id))
            .await;

        info!(
            target: "shelfrate::application::engagement",
            user_id,
            book_id,
            rating_id = record.id,
            "rating saved"
        );
        Ok(RatingView::from(&record))
    }
}

fn missing_book(book_id: i64) -> DomainError {
    DomainError::validation(format!("Book With ID '{book_id}' Does Not Exist!"))
}
