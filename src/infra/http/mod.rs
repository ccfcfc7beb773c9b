pub mod api;
mod middleware;

pub use api::ApiState;
pub use middleware::RequestContext;

use axum::{Router, middleware as axum_middleware, routing::get};

use self::middleware::{log_responses, set_request_context};

/// Full HTTP surface: the JSON API plus the database health probe.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .merge(api::build_api_router(state.clone()))
        .route("/_health/db", get(api::handlers::db_health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
