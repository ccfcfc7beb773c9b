use std::error::Error as StdError;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shelfrate_api_types::ErrorResponse;

use crate::application::catalog::CatalogError;
use crate::application::engagement::EngagementError;
use crate::application::error::ErrorReport;
use crate::application::identity::{AuthError, IdentityError};
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

pub mod codes {
    pub const VALIDATION: &str = "validation_error";
    pub const PARSE: &str = "parse_error";
    pub const NOT_AUTHENTICATED: &str = "not_authenticated";
    pub const TOKEN_NOT_VALID: &str = "token_not_valid";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const INTERNAL: &str = "internal_error";
}

const SOURCE: &str = "infra::http::api";
const NOT_AUTHENTICATED_DETAIL: &str = "Authentication credentials were not provided.";
const TOKEN_NOT_VALID_DETAIL: &str = "Given token not valid for any token type.";
const NOT_FOUND_DETAIL: &str = "Not found.";
const SERVER_ERROR_DETAIL: &str = "A server error occurred.";

/// JSON `{detail, code}` error with a diagnostic report for the logging middleware.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    detail: String,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let report = ErrorReport::from_message(SOURCE, status, format!("{code}: {detail}"));
        Self {
            status,
            code,
            detail,
            report,
        }
    }

    /// Public detail stays generic; the error chain only goes to the logs.
    pub fn from_error(
        status: StatusCode,
        code: &'static str,
        detail: impl Into<String>,
        error: &dyn StdError,
    ) -> Self {
        Self {
            status,
            code,
            detail: detail.into(),
            report: ErrorReport::from_error(SOURCE, status, error),
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::VALIDATION, detail)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::NOT_AUTHENTICATED,
            NOT_AUTHENTICATED_DETAIL,
        )
    }

    pub fn token_not_valid(reason: &AuthError) -> Self {
        Self::from_error(
            StatusCode::UNAUTHORIZED,
            codes::TOKEN_NOT_VALID,
            TOKEN_NOT_VALID_DETAIL,
            reason,
        )
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, NOT_FOUND_DETAIL)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            detail: self.detail,
            code: self.code.to_string(),
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { .. } => Self::not_found(),
            DomainError::Validation { message } => Self::validation(message),
        }
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match &err {
            RepoError::NotFound => Self::not_found(),
            RepoError::Duplicate { constraint } => Self::new(
                StatusCode::CONFLICT,
                codes::DUPLICATE,
                format!("Duplicate record ({constraint})."),
            ),
            RepoError::InvalidInput { message } => {
                Self::new(StatusCode::BAD_REQUEST, codes::INVALID_INPUT, message.clone())
            }
            RepoError::Integrity { .. } => Self::from_error(
                StatusCode::CONFLICT,
                codes::INTEGRITY,
                "Integrity constraint violated.",
                &err,
            ),
            RepoError::Timeout => Self::from_error(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout.",
                &err,
            ),
            RepoError::Persistence(_) => Self::from_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::REPO,
                SERVER_ERROR_DETAIL,
                &err,
            ),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Domain(domain) => domain.into(),
            CatalogError::Repo(repo) => repo.into(),
        }
    }
}

impl From<EngagementError> for ApiError {
    fn from(err: EngagementError) -> Self {
        match err {
            EngagementError::Unauthorized => Self::unauthorized(),
            EngagementError::Domain(domain) => domain.into(),
            EngagementError::Repo(repo) => repo.into(),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Domain(domain) => domain.into(),
            IdentityError::Repo(repo) => repo.into(),
            IdentityError::PasswordHash(_) => Self::from_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                SERVER_ERROR_DETAIL,
                &err,
            ),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Invalid | AuthError::Expired => Self::token_not_valid(&err),
            AuthError::Unavailable(_) => Self::from_error(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::REPO,
                "Service temporarily unavailable.",
                &err,
            ),
        }
    }
}

impl From<JsonRejection> for ApiError {
    /// Malformed and incomplete bodies are both client errors; only a wrong media type keeps 415.
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection {
            JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, codes::PARSE, rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::from_error(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            NOT_FOUND_DETAIL,
            &rejection,
        )
    }
}
