//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        // Job submission proxied to Core
        .route("/v1/jobs", post(handlers::submit_job))
        // Published result retrieval
        .route("/v1/jobs/{job_id}/result", get(handlers::get_result));

    // Result delivery from compute workers; path shape is part of the
    // contract with Core
    let upload_routes = Router::new().route("/{job_id}/upload", put(handlers::upload_result));

    Router::new()
        .merge(api_routes)
        .merge(upload_routes)
        // Auth middleware (resolves upload grants and sets extensions)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
