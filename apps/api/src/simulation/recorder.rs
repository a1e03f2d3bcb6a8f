#![allow(dead_code)]

//! Metrics recorder — the dashboard-facing view over the append-only
//! snapshot time series, plus retention pruning.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::simulation::MetricSnapshotRow;
use crate::store::SimulationStore;

pub struct MetricsRecorder {
    store: Arc<dyn SimulationStore>,
}

impl MetricsRecorder {
    pub fn new(store: Arc<dyn SimulationStore>) -> Self {
        Self { store }
    }

    /// Appends one immutable observation. Duplicate timestamps are fine and
    /// keep insertion order.
    pub async fn append(&self, snapshot: &MetricSnapshotRow) -> Result<(), AppError> {
        self.store.append_snapshot(snapshot).await
    }

    /// Up to `limit` most recent snapshots, restored to ascending
    /// chronological order. Callers must not rely on storage order;
    /// this is the only read dashboards go through.
    pub async fn history(
        &self,
        simulation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MetricSnapshotRow>, AppError> {
        if limit <= 0 {
            return Ok(vec![]);
        }
        let mut rows = self.store.recent_snapshots(simulation_id, limit).await?;
        rows.reverse(); // store returns newest first
        Ok(rows)
    }

    /// Deletes snapshots older than `retention_days`. Each simulation's most
    /// recent snapshot always survives, so there is always at least one
    /// observable data point.
    pub async fn prune(&self, retention_days: i64) -> Result<u64, AppError> {
        self.prune_at(retention_days, Utc::now()).await
    }

    /// `prune` with an explicit clock, for tests.
    pub async fn prune_at(
        &self,
        retention_days: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        if retention_days < 1 {
            return Err(AppError::Validation(format!(
                "retention_days must be >= 1 (got {retention_days})"
            )));
        }
        let cutoff = now - Duration::days(retention_days);
        let deleted = self.store.prune_snapshots(cutoff).await?;
        info!(retention_days, deleted, "metric snapshots pruned");
        Ok(deleted)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn snap(
        simulation_id: Uuid,
        at: DateTime<Utc>,
        opens: i64,
        shortlists: i64,
    ) -> MetricSnapshotRow {
        MetricSnapshotRow {
            simulation_id,
            recorded_at: at,
            opens_count: opens,
            shortlists_count: shortlists,
            employers_reached: opens,
            progress_percentage: 0,
        }
    }

    #[tokio::test]
    async fn test_history_ascending_regardless_of_insertion_order() {
        let store = Arc::new(MemoryStore::new());
        let recorder = MetricsRecorder::new(store);
        let id = Uuid::new_v4();
        let now = Utc::now();

        // Inserted newest-first on purpose.
        recorder
            .append(&snap(id, now, 30, 3))
            .await
            .unwrap();
        recorder
            .append(&snap(id, now - Duration::hours(4), 10, 1))
            .await
            .unwrap();
        recorder
            .append(&snap(id, now - Duration::hours(2), 20, 2))
            .await
            .unwrap();

        let history = recorder.history(id, 10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].opens_count, 10);
        assert_eq!(history[1].opens_count, 20);
        assert_eq!(history[2].opens_count, 30);
    }

    #[tokio::test]
    async fn test_history_limit_takes_most_recent() {
        let store = Arc::new(MemoryStore::new());
        let recorder = MetricsRecorder::new(store);
        let id = Uuid::new_v4();
        let now = Utc::now();

        for i in 0..5 {
            recorder
                .append(&snap(id, now - Duration::hours(5 - i), i * 10, i))
                .await
                .unwrap();
        }

        let history = recorder.history(id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        // The two newest, still ascending.
        assert_eq!(history[0].opens_count, 30);
        assert_eq!(history[1].opens_count, 40);
    }

    #[tokio::test]
    async fn test_duplicate_timestamps_keep_insertion_order() {
        let store = Arc::new(MemoryStore::new());
        let recorder = MetricsRecorder::new(store);
        let id = Uuid::new_v4();
        let now = Utc::now();

        recorder.append(&snap(id, now, 5, 1)).await.unwrap();
        recorder.append(&snap(id, now, 7, 2)).await.unwrap();

        let history = recorder.history(id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].opens_count, 5);
        assert_eq!(history[1].opens_count, 7);
    }

    #[tokio::test]
    async fn test_nonpositive_limit_yields_empty() {
        let store = Arc::new(MemoryStore::new());
        let recorder = MetricsRecorder::new(store);
        let id = Uuid::new_v4();

        recorder.append(&snap(id, Utc::now(), 5, 1)).await.unwrap();
        assert!(recorder.history(id, 0).await.unwrap().is_empty());
        assert!(recorder.history(id, -3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prune_keeps_latest_snapshot_per_simulation() {
        let store = Arc::new(MemoryStore::new());
        let recorder = MetricsRecorder::new(store.clone());
        let now = Utc::now();

        // Simulation whose entire history predates the cutoff.
        let stale = Uuid::new_v4();
        recorder
            .append(&snap(stale, now - Duration::days(200), 10, 1))
            .await
            .unwrap();
        recorder
            .append(&snap(stale, now - Duration::days(150), 20, 2))
            .await
            .unwrap();

        // Simulation with both old and recent snapshots.
        let fresh = Uuid::new_v4();
        recorder
            .append(&snap(fresh, now - Duration::days(120), 5, 0))
            .await
            .unwrap();
        recorder
            .append(&snap(fresh, now - Duration::days(1), 15, 1))
            .await
            .unwrap();

        let deleted = recorder.prune_at(90, now).await.unwrap();
        assert_eq!(deleted, 2); // stale's older row + fresh's old row

        // Stale simulation keeps exactly its most recent snapshot.
        let stale_history = recorder.history(stale, 10).await.unwrap();
        assert_eq!(stale_history.len(), 1);
        assert_eq!(stale_history[0].opens_count, 20);

        let fresh_history = recorder.history(fresh, 10).await.unwrap();
        assert_eq!(fresh_history.len(), 1);
        assert_eq!(fresh_history[0].opens_count, 15);
    }

    #[tokio::test]
    async fn test_prune_rejects_nonpositive_retention() {
        let store = Arc::new(MemoryStore::new());
        let recorder = MetricsRecorder::new(store);
        assert!(matches!(
            recorder.prune(0).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }
}
