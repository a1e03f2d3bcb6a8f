#![allow(dead_code)]

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle state of a simulation.
///
/// Legal transitions: running -> paused, paused -> running,
/// running -> completed. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    Running,
    Paused,
    Completed,
}

impl SimulationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SimulationStatus::Running => "running",
            SimulationStatus::Paused => "paused",
            SimulationStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One engagement run for a (resume, country) pair.
///
/// Targets, duration, and market size are fixed at creation and never change;
/// only `current_opens`, `current_shortlists`, `status`, and `last_updated`
/// mutate afterwards, and the current values are monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SimulationRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub subscription_id: Uuid,
    pub country_code: String,
    /// Market size snapshot taken at creation.
    pub total_employers: i64,
    pub simulation_start: DateTime<Utc>,
    pub simulation_end: DateTime<Utc>,
    pub duration_hours: i64,
    pub target_opens: i64,
    pub target_shortlists: i64,
    pub current_opens: i64,
    pub current_shortlists: i64,
    pub status: String,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SimulationRow {
    pub fn status_is(&self, status: SimulationStatus) -> bool {
        self.status == status.as_str()
    }
}

/// One immutable observation in a simulation's metric time series.
/// Append-only; duplicate timestamps are permitted and keep insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MetricSnapshotRow {
    pub simulation_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub opens_count: i64,
    pub shortlists_count: i64,
    pub employers_reached: i64,
    /// 0-100.
    pub progress_percentage: i32,
}

impl MetricSnapshotRow {
    /// The all-zero snapshot written alongside a freshly created simulation.
    pub fn initial(simulation_id: Uuid, at: DateTime<Utc>) -> Self {
        MetricSnapshotRow {
            simulation_id,
            recorded_at: at,
            opens_count: 0,
            shortlists_count: 0,
            employers_reached: 0,
            progress_percentage: 0,
        }
    }
}
