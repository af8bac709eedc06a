//! Route table.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::{handlers, AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/jobs",
            post(handlers::submit_job).get(handlers::list_jobs),
        )
        .route("/api/jobs/:job_id", get(handlers::get_job))
        .route("/api/records", get(handlers::list_records))
        .route("/api/stats", get(handlers::stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
