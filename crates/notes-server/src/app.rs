//! The fully layered application.

use axum::{Router, http::HeaderValue, middleware};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::request_id::{make_span, propagate_request_id, request_id_layer};
use crate::routes;
use crate::state::AppState;

/// Router with request IDs, tracing and CORS applied.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config().cors_allowed_origins);

    routes::build_router(state)
        .layer(middleware::from_fn(propagate_request_id))
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(cors)
        .layer(request_id_layer())
}

/// Build CORS layer from configuration.
///
/// Origins that are not valid header values are skipped with a warning.
pub fn build_cors_layer(allowed_origins: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.trim() == "*" {
        return cors.allow_origin(Any);
    }

    // Parse comma-separated origins
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(origins)
}
