pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

pub fn build_api_router(state: ApiState) -> Router<ApiState> {
    Router::new()
        .route("/books/", get(handlers::list_books))
        .route("/books/{id}/", get(handlers::book_detail))
        .route("/bookmarks/", post(handlers::toggle_bookmark))
        .route("/ratings/", post(handlers::upsert_rating))
        .route("/register-login/", post(handlers::register_login))
        .route("/token/refresh/", post(handlers::refresh_token))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::resolve_actor,
        ))
}
