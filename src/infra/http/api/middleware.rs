use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::application::identity::{Actor, AuthError};

use super::error::ApiError;
use super::state::ApiState;

/// Resolve the bearer token into an [`Actor`]. A missing header means anonymous; a header that
/// does not carry a valid access token is rejected outright.
pub async fn resolve_actor(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match extract_token(request.headers().get(header::AUTHORIZATION)) {
        Ok(token) => token,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let actor = match state.identity.resolve_actor(token.as_deref()).await {
        Ok(actor) => actor,
        Err(err) => return ApiError::from(err).into_response(),
    };

    request.extensions_mut().insert(actor);
    let mut response = next.run(request).await;
    response.extensions_mut().insert(actor);
    response
}

fn extract_token(header: Option<&HeaderValue>) -> Result<Option<String>, AuthError> {
    let Some(header) = header else {
        return Ok(None);
    };
    let raw = header.to_str().map_err(|_| AuthError::Invalid)?;
    let bearer = raw.strip_prefix("Bearer ").ok_or(AuthError::Invalid)?;
    let bearer = bearer.trim();
    if bearer.is_empty() {
        return Err(AuthError::Invalid);
    }
    Ok(Some(bearer.to_string()))
}
