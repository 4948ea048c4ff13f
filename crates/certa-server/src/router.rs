use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with every certa endpoint.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_bytes;
    Router::new()
        .route("/v1/health", get(handler::health))
        .route("/v1/users", post(handler::upsert_user))
        .route("/v1/items", post(handler::register_item))
        .route("/v1/mints", post(handler::start_mint))
        .route("/v1/mints/:id", get(handler::get_mint))
        .route("/v1/mints/:id/retry", post(handler::retry_mint))
        .route("/v1/mints/:id/cancel", post(handler::cancel_mint))
        .route("/v1/objects/:bucket/*path", get(handler::get_object))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
