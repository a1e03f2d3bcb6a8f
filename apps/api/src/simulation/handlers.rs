use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::simulation::{MetricSnapshotRow, SimulationRow};
use crate::simulation::progress::SweepReport;
use crate::state::AppState;

/// Default page size for dashboard metric reads.
const DEFAULT_HISTORY_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct CreateSimulationRequest {
    pub resume_id: Uuid,
    pub subscription_id: Uuid,
    pub country_code: String,
}

/// POST /api/v1/simulations
pub async fn handle_create(
    State(state): State<AppState>,
    Json(req): Json<CreateSimulationRequest>,
) -> Result<(StatusCode, Json<SimulationRow>), AppError> {
    if req.country_code.trim().is_empty() {
        return Err(AppError::Validation(
            "country_code must not be empty".to_string(),
        ));
    }
    let simulation = state
        .lifecycle
        .create(req.resume_id, req.subscription_id, req.country_code.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(simulation)))
}

/// POST /api/v1/simulations/:id/pause
pub async fn handle_pause(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SimulationRow>, AppError> {
    Ok(Json(state.lifecycle.pause(id).await?))
}

/// POST /api/v1/simulations/:id/resume
pub async fn handle_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SimulationRow>, AppError> {
    Ok(Json(state.lifecycle.resume(id).await?))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub resume_id: Uuid,
    pub country_code: Option<String>,
}

/// GET /api/v1/simulations?resume_id=&country_code=
pub async fn handle_status(
    State(state): State<AppState>,
    Query(params): Query<StatusQuery>,
) -> Result<Json<Vec<SimulationRow>>, AppError> {
    let simulations = state
        .lifecycle
        .status_for_resume(params.resume_id, params.country_code.as_deref())
        .await?;
    Ok(Json(simulations))
}

#[derive(Deserialize)]
pub struct MetricsQuery {
    pub limit: Option<i64>,
}

/// GET /api/v1/simulations/:id/metrics?limit=
/// Snapshots are returned oldest-to-newest, ready for charting.
pub async fn handle_metrics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<MetricsQuery>,
) -> Result<Json<Vec<MetricSnapshotRow>>, AppError> {
    state
        .store
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Simulation {id} not found")))?;

    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(state.recorder.history(id, limit).await?))
}

/// POST /api/v1/simulations/sweep
/// Manual trigger of the same sweep the scheduler runs; cycles are
/// serialized, so this can never overlap a scheduled pass.
pub async fn handle_sweep(State(state): State<AppState>) -> Json<SweepReport> {
    Json(state.updater.sweep().await)
}

#[derive(Deserialize)]
pub struct MetricsCleanupRequest {
    pub retention_days: Option<i64>,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub deleted: u64,
}

/// POST /api/v1/admin/metrics/cleanup
pub async fn handle_metrics_cleanup(
    State(state): State<AppState>,
    Json(req): Json<MetricsCleanupRequest>,
) -> Result<Json<CleanupResponse>, AppError> {
    let retention_days = req
        .retention_days
        .unwrap_or(state.config.simulation.retention_days);
    let deleted = state.recorder.prune(retention_days).await?;
    Ok(Json(CleanupResponse { deleted }))
}

/// POST /api/v1/admin/simulations/cleanup
pub async fn handle_simulations_cleanup(
    State(state): State<AppState>,
) -> Result<Json<CleanupResponse>, AppError> {
    let cutoff = Utc::now() - Duration::days(state.config.simulation.completed_ttl_days);
    let deleted = state.store.delete_completed_before(cutoff).await?;
    Ok(Json(CleanupResponse { deleted }))
}
