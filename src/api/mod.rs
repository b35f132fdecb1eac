//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health`,
//! `/config/catalog` and the WebSocket feed at `/ws` sit at the root.

pub mod dto;
pub mod handlers;
pub mod openapi;

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Upper bound on a single REST request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket feed, API docs and the
/// HTTP middleware stack.
pub fn build_app(state: AppState) -> Router {
    let router = build_router().route("/ws", get(ws_handler));
    #[cfg(feature = "swagger-ui")]
    let router = router.merge(openapi::swagger_routes());
    router
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
