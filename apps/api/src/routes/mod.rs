pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::simulation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Simulation lifecycle
        .route(
            "/api/v1/simulations",
            post(handlers::handle_create).get(handlers::handle_status),
        )
        .route(
            "/api/v1/simulations/:id/pause",
            post(handlers::handle_pause),
        )
        .route(
            "/api/v1/simulations/:id/resume",
            post(handlers::handle_resume),
        )
        // Dashboard metrics
        .route(
            "/api/v1/simulations/:id/metrics",
            get(handlers::handle_metrics),
        )
        // Manual sweep trigger (also driven by the scheduler)
        .route("/api/v1/simulations/sweep", post(handlers::handle_sweep))
        // Retention, callable out of band
        .route(
            "/api/v1/admin/metrics/cleanup",
            post(handlers::handle_metrics_cleanup),
        )
        .route(
            "/api/v1/admin/simulations/cleanup",
            post(handlers::handle_simulations_cleanup),
        )
        .with_state(state)
}
