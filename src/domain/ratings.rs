//! Rating scores, rating input validation and per-book statistics.

use std::collections::BTreeMap;

use serde::Serialize;
use shelfrate_api_types::{BookDetail, RatingView, ScoreCount};

use crate::domain::entities::{BookRecord, RatingRecord};
use crate::domain::error::DomainError;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

pub const MISSING_SCORE_AND_REVIEW: &str = "At Least One of Score or Review Must Be Filled!";

/// A score in `MIN_SCORE..=MAX_SCORE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if (i64::from(MIN_SCORE)..=i64::from(MAX_SCORE)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DomainError::validation(format!(
                "Score must be an integer between {MIN_SCORE} and {MAX_SCORE}."
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i16> for Score {
    type Error = DomainError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

/// One field of a partial rating update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Omitted by the client; an existing rating keeps its stored value.
    Keep,
    /// Supplied by the client; `None` clears the stored value.
    Set(Option<T>),
}

impl<T> FieldUpdate<T> {
    /// Outer `None` is an omitted field, inner `None` an explicit `null`.
    pub fn from_request(value: Option<Option<T>>) -> Self {
        value.map_or(Self::Keep, Self::Set)
    }

    pub fn is_supplied(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// The supplied non-null value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Set(Some(value)) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Set(value) => value,
            Self::Keep => None,
        }
    }
}

/// Rating fields with a valid score range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingDraft {
    pub score: FieldUpdate<Score>,
    pub review: FieldUpdate<String>,
}

impl RatingDraft {
    /// Checks the score range only; see [`RatingDraft::require_content`].
    pub fn parse(
        score: Option<Option<i64>>,
        review: Option<Option<String>>,
    ) -> Result<Self, DomainError> {
        let score = match score {
            Some(Some(value)) => FieldUpdate::Set(Some(Score::new(value)?)),
            Some(None) => FieldUpdate::Set(None),
            None => FieldUpdate::Keep,
        };
        Ok(Self {
            score,
            review: FieldUpdate::from_request(review),
        })
    }

    /// At least a score or a non-empty review must be given. An empty review is still written
    /// when a score accompanies it.
    pub fn require_content(&self) -> Result<(), DomainError> {
        let has_review = self.review.value().is_some_and(|text| !text.is_empty());
        if self.score.value().is_none() && !has_review {
            return Err(DomainError::validation(MISSING_SCORE_AND_REVIEW));
        }
        Ok(())
    }
}

/// Aggregates over the ratings of one book.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingStats {
    pub reviews_count: u64,
    pub scores_count: u64,
    pub scores_mean: Option<f64>,
    pub by_score: Vec<ScoreCount>,
}

impl RatingStats {
    pub fn from_ratings(ratings: &[RatingRecord]) -> Self {
        let reviews_count = ratings.iter().filter(|r| r.has_review()).count() as u64;

        let mut histogram: BTreeMap<u8, u64> = BTreeMap::new();
        let mut total: u64 = 0;
        for score in ratings.iter().filter_map(|r| r.score) {
            *histogram.entry(score.get()).or_default() += 1;
            total += u64::from(score.get());
        }

        let scores_count: u64 = histogram.values().sum();
        let scores_mean = (scores_count > 0).then(|| total as f64 / scores_count as f64);
        let by_score = histogram
            .into_iter()
            .map(|(score, count)| ScoreCount { score, count })
            .collect();

        Self {
            reviews_count,
            scores_count,
            scores_mean,
            by_score,
        }
    }
}

/// Assemble the detail view of a book from its row and its ratings.
pub fn book_detail(book: BookRecord, ratings: &[RatingRecord]) -> BookDetail {
    let stats = RatingStats::from_ratings(ratings);
    BookDetail {
        id: book.id,
        title: book.title,
        summary: book.summary,
        reviews_count: stats.reviews_count,
        scores_count: stats.scores_count,
        scores_mean: stats.scores_mean,
        scores_count_group_by_number: stats.by_score,
        ratings: ratings.iter().map(RatingView::from).collect(),
    }
}
