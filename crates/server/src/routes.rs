//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/ping", get(handlers::ping))
        .route(
            "/express/api/get-all-documents",
            get(handlers::list_requests),
        )
        .route(
            "/express/api/signing-request",
            post(handlers::create_request),
        )
        .route("/api/skribble/webhook", post(handlers::skribble_webhook));

    // Unauthenticated; restrict to the scraper network at the edge.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Browser front ends call the intake routes from other origins.
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
