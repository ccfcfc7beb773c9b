use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shelfrate_api_types::{
    BookDetail, BookListItem, BookmarkRequest, DetailResponse, RatingRequest, RatingView,
    RefreshRequest, RefreshResponse, RegisterLoginRequest, RegisterLoginResponse,
};

use crate::application::error::ErrorReport;
use crate::application::identity::Actor;

use super::error::ApiError;
use super::state::ApiState;

pub async fn list_books(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<BookListItem>>, ApiError> {
    let books = state.catalog.list_books(actor).await?;
    Ok(Json(books))
}

pub async fn book_detail(
    State(state): State<ApiState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<BookDetail>, ApiError> {
    let Path(id) = path?;
    let detail = state.catalog.book_detail(id).await?;
    Ok(Json(detail))
}

pub async fn toggle_bookmark(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<BookmarkRequest>, JsonRejection>,
) -> Result<Json<DetailResponse>, ApiError> {
    if actor == Actor::Anonymous {
        return Err(ApiError::unauthorized());
    }
    let Json(payload) = payload?;

    let change = state.engagement.toggle_bookmark(actor, payload.book).await?;
    Ok(Json(DetailResponse {
        detail: change.detail().to_string(),
    }))
}

pub async fn upsert_rating(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<RatingRequest>, JsonRejection>,
) -> Result<Json<RatingView>, ApiError> {
    if actor == Actor::Anonymous {
        return Err(ApiError::unauthorized());
    }
    let Json(payload) = payload?;

    let rating = state
        .engagement
        .upsert_rating(actor, payload.book, payload.score, payload.review)
        .await?;
    Ok(Json(rating))
}

pub async fn register_login(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterLoginRequest>, JsonRejection>,
) -> Result<Json<RegisterLoginResponse>, ApiError> {
    let Json(payload) = payload?;

    let session = state
        .identity
        .register_or_login(&payload.email, &payload.password)
        .await?;
    Ok(Json(RegisterLoginResponse {
        user_id: session.user.id,
        email: session.user.email,
        created: session.created,
        refresh: session.refresh,
        access: session.access,
    }))
}

pub async fn refresh_token(
    State(state): State<ApiState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let Json(payload) = payload?;

    let access = state.identity.refresh(&payload.refresh).await?;
    Ok(Json(RefreshResponse { access }))
}

pub async fn db_health(State(state): State<ApiState>) -> Response {
    match state.health.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
