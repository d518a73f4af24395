//! Axum router construction.

use axum::http::{header, HeaderName};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::{request_id_middleware, X_REQUEST_ID};
use crate::routes;

/// Build the complete axum router.
pub fn build_router(ctx: AppContext) -> Router {
    // Browsers' media elements need the range headers exposed.
    let exposed: [HeaderName; 5] = [
        header::CONTENT_RANGE,
        header::ACCEPT_RANGES,
        header::CONTENT_LENGTH,
        header::CONTENT_DISPOSITION,
        X_REQUEST_ID.clone(),
    ];
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(exposed);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // `get` also answers HEAD; the handler skips the body for it.
        .route("/{container_id}/{name}", get(routes::stream::stream_object))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
