#![allow(dead_code)]

//! Persistence seam for the simulation engine.
//!
//! Trait-based so the storage backend can be swapped without touching the
//! engine: `PgStore` (PostgreSQL via sqlx) in production, `MemoryStore` in
//! tests. Carried in `AppState` as `Arc<dyn SimulationStore>`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::market::CountryMarket;
use crate::models::resume::ResumeScores;
use crate::models::simulation::{MetricSnapshotRow, SimulationRow, SimulationStatus};

pub use memory::{MemoryCountryRepository, MemoryResumeRepository, MemoryStore};
pub use postgres::{PgCountryRepository, PgResumeRepository, PgStore};

// ────────────────────────────────────────────────────────────────────────────
// Collaborator repositories (read-only contracts)
// ────────────────────────────────────────────────────────────────────────────

/// Read access to resume quality signals. Fails with `NotFound` if the
/// resume has never been scored.
#[async_trait]
pub trait ResumeRepository: Send + Sync {
    async fn get_scores(&self, resume_id: Uuid) -> Result<ResumeScores, AppError>;
}

/// Read access to country market sizes. Fails with `NotFound` for unknown
/// country codes.
#[async_trait]
pub trait CountryRepository: Send + Sync {
    async fn get_market(&self, country_code: &str) -> Result<CountryMarket, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Simulation store
// ────────────────────────────────────────────────────────────────────────────

/// One atomic progress write produced by a sweep step: the simulation's new
/// current values plus the status it lands in (`Running` for an ordinary
/// update, `Completed` for finalization).
#[derive(Debug, Clone, Copy)]
pub struct ProgressWrite {
    pub simulation_id: Uuid,
    pub current_opens: i64,
    pub current_shortlists: i64,
    pub status: SimulationStatus,
    pub last_updated: DateTime<Utc>,
}

/// Storage contract for simulations and their metric snapshots.
///
/// Write methods that touch both tables are transactional: a snapshot is
/// never recorded without its matching state update, or vice versa.
#[async_trait]
pub trait SimulationStore: Send + Sync {
    /// Inserts a new simulation together with its all-zero initial snapshot,
    /// all-or-nothing.
    async fn insert_with_initial_snapshot(
        &self,
        simulation: &SimulationRow,
        initial: &MetricSnapshotRow,
    ) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<SimulationRow>, AppError>;

    /// Simulations for a resume, optionally narrowed to one country,
    /// newest first.
    async fn list_for_resume(
        &self,
        resume_id: Uuid,
        country_code: Option<&str>,
    ) -> Result<Vec<SimulationRow>, AppError>;

    /// Conditional status flip: applies only if the row currently holds
    /// `from`. Returns whether a row was updated, so callers can distinguish
    /// a lost race / illegal transition from success. Serializes pause/resume
    /// against a concurrent sweep touching the same row.
    async fn transition_status(
        &self,
        id: Uuid,
        from: SimulationStatus,
        to: SimulationStatus,
    ) -> Result<bool, AppError>;

    /// Running simulations whose end lies in the future.
    async fn fetch_running(&self, now: DateTime<Utc>) -> Result<Vec<SimulationRow>, AppError>;

    /// Running simulations whose end has passed (due for finalization).
    async fn fetch_expired(&self, now: DateTime<Utc>) -> Result<Vec<SimulationRow>, AppError>;

    /// Applies one sweep step atomically: updates current values, status and
    /// `last_updated`, and appends the snapshot, in a single transaction.
    /// Conditioned on the row still being `running`; returns false (and
    /// writes nothing) if it no longer is.
    async fn apply_progress(
        &self,
        write: &ProgressWrite,
        snapshot: &MetricSnapshotRow,
    ) -> Result<bool, AppError>;

    /// Appends one snapshot row. Duplicate timestamps are fine; insertion
    /// order is preserved.
    async fn append_snapshot(&self, snapshot: &MetricSnapshotRow) -> Result<(), AppError>;

    /// Up to `limit` most recent snapshots for a simulation, newest first
    /// (callers re-order; see `MetricsRecorder::history`).
    async fn recent_snapshots(
        &self,
        simulation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MetricSnapshotRow>, AppError>;

    /// Deletes snapshots recorded before `cutoff`, except each simulation's
    /// most recent snapshot, which always survives. Returns the count
    /// deleted.
    async fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;

    /// Deletes completed simulations whose completion (`last_updated`)
    /// predates `cutoff`, along with their snapshots. Running and paused
    /// rows are never touched. Returns the count of simulations deleted.
    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}
