#![allow(dead_code)]

//! Progress sweep — recomputes every running simulation's current metrics
//! from elapsed wall-clock time, applies bounded jitter, and finalizes
//! expired simulations.
//!
//! Monotonicity is carried by the `max(current, min(target, candidate))`
//! clamp, not by the jitter distribution: a negative draw can pull the
//! candidate below the previously persisted value, and the clamp is what
//! stops it from ever going backwards.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::simulation::{MetricSnapshotRow, SimulationRow, SimulationStatus};
use crate::store::{ProgressWrite, SimulationStore};

/// Jitter amplitude relative to the progress-derived base value.
const JITTER_SCALE: f64 = 0.10;

/// Employers-reached multiplier over opens (some employers open twice,
/// some reach the listing without opening).
const REACH_MULTIPLIER: f64 = 1.2;

/// Deadline for one simulation's storage write. On expiry the simulation is
/// skipped for this cycle and picked up again by the next sweep.
const SWEEP_STEP_TIMEOUT: Duration = Duration::from_secs(30);

// ────────────────────────────────────────────────────────────────────────────
// Jitter source
// ────────────────────────────────────────────────────────────────────────────

/// Source of the bounded random factor in `[-0.5, 0.5)`.
///
/// Injected so tests can script exact draws and assert monotonicity and
/// clamping behavior; production uses `ThreadRngJitter`.
pub trait JitterSource: Send + Sync {
    fn draw(&self) -> f64;
}

/// Default jitter source backed by the thread-local RNG.
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn draw(&self) -> f64 {
        rand::thread_rng().gen_range(-0.5..0.5)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sweep
// ────────────────────────────────────────────────────────────────────────────

/// Outcome counts for one sweep cycle. Per-item failures never propagate;
/// they land in `failed` and the cycle always completes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepReport {
    pub updated: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct ProgressUpdater {
    store: Arc<dyn SimulationStore>,
    jitter: Arc<dyn JitterSource>,
    /// Serializes sweep cycles: a new sweep (scheduled or manual) must not
    /// start while a previous one is still running.
    cycle: Mutex<()>,
}

impl ProgressUpdater {
    pub fn new(store: Arc<dyn SimulationStore>, jitter: Arc<dyn JitterSource>) -> Self {
        Self {
            store,
            jitter,
            cycle: Mutex::new(()),
        }
    }

    /// One sweep pass over all running simulations, at the current wall
    /// clock.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// One sweep pass with an explicit clock, for tests and backfills.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let _cycle = self.cycle.lock().await;
        let mut report = SweepReport::default();

        match self.store.fetch_running(now).await {
            Ok(running) => {
                for sim in running {
                    match self.advance_one(&sim, now).await {
                        Ok(true) => report.updated += 1,
                        // Paused or completed mid-cycle; nothing written.
                        Ok(false) => {}
                        Err(e) => {
                            warn!(simulation_id = %sim.id, "sweep step failed: {e}");
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(e) => error!("sweep: listing running simulations failed: {e}"),
        }

        match self.store.fetch_expired(now).await {
            Ok(expired) => {
                for sim in expired {
                    match self.finalize_one(&sim, now).await {
                        Ok(true) => report.completed += 1,
                        Ok(false) => {}
                        Err(e) => {
                            warn!(simulation_id = %sim.id, "finalization failed: {e}");
                            report.failed += 1;
                        }
                    }
                }
            }
            Err(e) => error!("sweep: listing expired simulations failed: {e}"),
        }

        info!(
            updated = report.updated,
            completed = report.completed,
            failed = report.failed,
            "sweep finished"
        );
        report
    }

    /// Recomputes one running simulation's metrics and persists them together
    /// with a snapshot, atomically.
    async fn advance_one(&self, sim: &SimulationRow, now: DateTime<Utc>) -> Result<bool, AppError> {
        let progress = elapsed_fraction(sim, now);

        let new_opens = self.jittered_value(sim.current_opens, sim.target_opens, progress);
        let new_shortlists =
            self.jittered_value(sim.current_shortlists, sim.target_shortlists, progress);

        let write = ProgressWrite {
            simulation_id: sim.id,
            current_opens: new_opens,
            current_shortlists: new_shortlists,
            status: SimulationStatus::Running,
            last_updated: now,
        };
        let snapshot = MetricSnapshotRow {
            simulation_id: sim.id,
            recorded_at: now,
            opens_count: new_opens,
            shortlists_count: new_shortlists,
            employers_reached: employers_reached(new_opens, sim.total_employers),
            progress_percentage: (progress * 100.0).round() as i32,
        };

        self.apply_with_deadline(&write, &snapshot).await
    }

    /// Snaps an expired simulation to its targets and marks it completed,
    /// with a terminal 100% snapshot.
    async fn finalize_one(&self, sim: &SimulationRow, now: DateTime<Utc>) -> Result<bool, AppError> {
        let write = ProgressWrite {
            simulation_id: sim.id,
            current_opens: sim.target_opens,
            current_shortlists: sim.target_shortlists,
            status: SimulationStatus::Completed,
            last_updated: now,
        };
        let snapshot = MetricSnapshotRow {
            simulation_id: sim.id,
            recorded_at: now,
            opens_count: sim.target_opens,
            shortlists_count: sim.target_shortlists,
            employers_reached: employers_reached(sim.target_opens, sim.total_employers),
            progress_percentage: 100,
        };

        let applied = self.apply_with_deadline(&write, &snapshot).await?;
        if applied {
            info!(simulation_id = %sim.id, "simulation completed");
        }
        Ok(applied)
    }

    async fn apply_with_deadline(
        &self,
        write: &ProgressWrite,
        snapshot: &MetricSnapshotRow,
    ) -> Result<bool, AppError> {
        timeout(SWEEP_STEP_TIMEOUT, self.store.apply_progress(write, snapshot))
            .await
            .map_err(|_| {
                AppError::Internal(anyhow!(
                    "progress write for simulation {} timed out",
                    write.simulation_id
                ))
            })?
    }

    /// Base value from linear progress, perturbed by bounded jitter, then
    /// clamped into `[current, target]`. The lower clamp is the
    /// correctness-critical step: it makes the series monotonic no matter
    /// what the jitter draws.
    fn jittered_value(&self, current: i64, target: i64, progress: f64) -> i64 {
        let base = ((target as f64) * progress).floor();
        let jitter = self.jitter.draw() * JITTER_SCALE * base;
        let candidate = (base + jitter).round() as i64;
        current.max(candidate.min(target))
    }
}

/// Fraction of the simulation window elapsed at `now`, clamped to [0, 1].
///
/// Deliberately wall-clock: pausing does not shift `simulation_end`, so time
/// spent paused still counts as elapsed and a long pause jumps progress on
/// resume. Flagged as a possibly unintended product behavior; do not
/// "fix" it here without a product decision.
fn elapsed_fraction(sim: &SimulationRow, now: DateTime<Utc>) -> f64 {
    let span = (sim.simulation_end - sim.simulation_start).num_seconds();
    if span <= 0 {
        return 1.0;
    }
    let elapsed = (now - sim.simulation_start).num_seconds();
    (elapsed as f64 / span as f64).clamp(0.0, 1.0)
}

fn employers_reached(opens: i64, total_employers: i64) -> i64 {
    (((opens as f64) * REACH_MULTIPLIER).floor() as i64).min(total_employers)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    use crate::store::MemoryStore;

    /// Scripted jitter source: always returns the same draw.
    struct FixedJitter(f64);

    impl JitterSource for FixedJitter {
        fn draw(&self) -> f64 {
            self.0
        }
    }

    fn make_sim(
        start_offset_hours: i64,
        duration_hours: i64,
        now: DateTime<Utc>,
    ) -> SimulationRow {
        let start = now - ChronoDuration::hours(start_offset_hours);
        SimulationRow {
            id: Uuid::new_v4(),
            resume_id: Uuid::new_v4(),
            subscription_id: Uuid::new_v4(),
            country_code: "DE".to_string(),
            total_employers: 1000,
            simulation_start: start,
            simulation_end: start + ChronoDuration::hours(duration_hours),
            duration_hours,
            target_opens: 800,
            target_shortlists: 200,
            current_opens: 0,
            current_shortlists: 0,
            status: SimulationStatus::Running.as_str().to_string(),
            last_updated: start,
            created_at: start,
        }
    }

    fn updater(store: Arc<MemoryStore>, jitter: f64) -> ProgressUpdater {
        ProgressUpdater::new(store, Arc::new(FixedJitter(jitter)))
    }

    #[tokio::test]
    async fn test_sweep_advances_running_simulation() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let sim = make_sim(24, 48, now); // halfway through
        store.insert_raw(sim.clone()).await;

        let report = updater(store.clone(), 0.0).sweep_at(now).await;
        assert_eq!(report.updated, 1);
        assert_eq!(report.completed, 0);
        assert_eq!(report.failed, 0);

        let row = store.get(sim.id).await.unwrap().unwrap();
        assert_eq!(row.current_opens, 400); // 800 * 0.5, zero jitter
        assert_eq!(row.current_shortlists, 100);
        assert!(row.status_is(SimulationStatus::Running));

        let snaps = store.recent_snapshots(sim.id, 10).await.unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].opens_count, 400);
        assert_eq!(snaps[0].employers_reached, 480); // 400 * 1.2
        assert_eq!(snaps[0].progress_percentage, 50);
    }

    #[tokio::test]
    async fn test_monotonic_under_negative_jitter() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let sim = make_sim(24, 48, now);
        store.insert_raw(sim.clone()).await;

        // Most positive draw first, then the most negative possible draws.
        let up = updater(store.clone(), 0.49);
        up.sweep_at(now).await;
        let after_first = store.get(sim.id).await.unwrap().unwrap();

        let down = updater(store.clone(), -0.5);
        down.sweep_at(now).await;
        down.sweep_at(now).await;
        let after_negative = store.get(sim.id).await.unwrap().unwrap();

        assert!(after_negative.current_opens >= after_first.current_opens);
        assert!(after_negative.current_shortlists >= after_first.current_shortlists);

        // Snapshot series mirrors the monotonic current values.
        let mut history = store.recent_snapshots(sim.id, 10).await.unwrap();
        history.reverse();
        for pair in history.windows(2) {
            assert!(pair[1].opens_count >= pair[0].opens_count);
            assert!(pair[1].shortlists_count >= pair[0].shortlists_count);
        }
    }

    #[tokio::test]
    async fn test_values_never_exceed_targets() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let sim = make_sim(47, 48, now); // 98% through, max positive jitter
        store.insert_raw(sim.clone()).await;

        updater(store.clone(), 0.49).sweep_at(now).await;

        let row = store.get(sim.id).await.unwrap().unwrap();
        assert!(row.current_opens <= row.target_opens);
        assert!(row.current_shortlists <= row.target_shortlists);
    }

    #[tokio::test]
    async fn test_expired_simulation_is_finalized() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let sim = make_sim(72, 48, now); // ended a day ago
        store.insert_raw(sim.clone()).await;

        let report = updater(store.clone(), 0.0).sweep_at(now).await;
        assert_eq!(report.updated, 0);
        assert_eq!(report.completed, 1);

        let row = store.get(sim.id).await.unwrap().unwrap();
        assert!(row.status_is(SimulationStatus::Completed));
        assert_eq!(row.current_opens, row.target_opens);
        assert_eq!(row.current_shortlists, row.target_shortlists);

        let snaps = store.recent_snapshots(sim.id, 10).await.unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].progress_percentage, 100);
        assert_eq!(snaps[0].employers_reached, 960); // 800 * 1.2 <= 1000
    }

    #[tokio::test]
    async fn test_completion_is_idempotent() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let sim = make_sim(72, 48, now);
        store.insert_raw(sim.clone()).await;

        let up = updater(store.clone(), 0.0);
        up.sweep_at(now).await;
        let first = store.get(sim.id).await.unwrap().unwrap();
        let count_after_first = store.snapshot_count(sim.id).await;

        // Repeated sweeps leave a completed simulation untouched.
        up.sweep_at(now).await;
        up.sweep_at(now + ChronoDuration::hours(2)).await;
        let second = store.get(sim.id).await.unwrap().unwrap();

        assert_eq!(second.current_opens, first.current_opens);
        assert_eq!(second.current_shortlists, first.current_shortlists);
        assert_eq!(second.status, first.status);
        assert_eq!(second.last_updated, first.last_updated);
        assert_eq!(store.snapshot_count(sim.id).await, count_after_first);
    }

    #[tokio::test]
    async fn test_paused_simulations_are_skipped() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let mut sim = make_sim(24, 48, now);
        sim.status = SimulationStatus::Paused.as_str().to_string();
        sim.current_opens = 123;
        store.insert_raw(sim.clone()).await;

        let report = updater(store.clone(), 0.0).sweep_at(now).await;
        assert_eq!(report.updated, 0);
        assert_eq!(report.completed, 0);

        let row = store.get(sim.id).await.unwrap().unwrap();
        assert!(row.status_is(SimulationStatus::Paused));
        assert_eq!(row.current_opens, 123);
        assert_eq!(store.snapshot_count(sim.id).await, 0);
    }

    #[test]
    fn test_employers_reached_capped_by_market() {
        assert_eq!(employers_reached(800, 1000), 960);
        assert_eq!(employers_reached(900, 1000), 1000); // 1080 capped
        assert_eq!(employers_reached(0, 1000), 0);
    }

    #[test]
    fn test_elapsed_fraction_clamps() {
        let now = Utc::now();
        let sim = make_sim(24, 48, now);
        let f = elapsed_fraction(&sim, now);
        assert!((f - 0.5).abs() < 0.001);

        assert_eq!(elapsed_fraction(&sim, sim.simulation_start), 0.0);
        assert_eq!(
            elapsed_fraction(&sim, sim.simulation_end + ChronoDuration::hours(5)),
            1.0
        );
        // Time before start never yields negative progress.
        assert_eq!(
            elapsed_fraction(&sim, sim.simulation_start - ChronoDuration::hours(5)),
            0.0
        );
    }

    /// Store wrapper that refuses `apply_progress` for one simulation,
    /// standing in for a transient storage failure mid-sweep.
    struct FailingStore {
        inner: Arc<MemoryStore>,
        broken: Uuid,
    }

    #[async_trait::async_trait]
    impl SimulationStore for FailingStore {
        async fn insert_with_initial_snapshot(
            &self,
            simulation: &SimulationRow,
            initial: &MetricSnapshotRow,
        ) -> Result<(), AppError> {
            self.inner
                .insert_with_initial_snapshot(simulation, initial)
                .await
        }

        async fn get(&self, id: Uuid) -> Result<Option<SimulationRow>, AppError> {
            self.inner.get(id).await
        }

        async fn list_for_resume(
            &self,
            resume_id: Uuid,
            country_code: Option<&str>,
        ) -> Result<Vec<SimulationRow>, AppError> {
            self.inner.list_for_resume(resume_id, country_code).await
        }

        async fn transition_status(
            &self,
            id: Uuid,
            from: SimulationStatus,
            to: SimulationStatus,
        ) -> Result<bool, AppError> {
            self.inner.transition_status(id, from, to).await
        }

        async fn fetch_running(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<SimulationRow>, AppError> {
            self.inner.fetch_running(now).await
        }

        async fn fetch_expired(
            &self,
            now: DateTime<Utc>,
        ) -> Result<Vec<SimulationRow>, AppError> {
            self.inner.fetch_expired(now).await
        }

        async fn apply_progress(
            &self,
            write: &ProgressWrite,
            snapshot: &MetricSnapshotRow,
        ) -> Result<bool, AppError> {
            if write.simulation_id == self.broken {
                return Err(AppError::Internal(anyhow!("storage write refused")));
            }
            self.inner.apply_progress(write, snapshot).await
        }

        async fn append_snapshot(&self, snapshot: &MetricSnapshotRow) -> Result<(), AppError> {
            self.inner.append_snapshot(snapshot).await
        }

        async fn recent_snapshots(
            &self,
            simulation_id: Uuid,
            limit: i64,
        ) -> Result<Vec<MetricSnapshotRow>, AppError> {
            self.inner.recent_snapshots(simulation_id, limit).await
        }

        async fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
            self.inner.prune_snapshots(cutoff).await
        }

        async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
            self.inner.delete_completed_before(cutoff).await
        }
    }

    #[tokio::test]
    async fn test_failed_step_is_counted_and_isolated() {
        let now = Utc::now();
        let inner = Arc::new(MemoryStore::new());
        let healthy = make_sim(24, 48, now);
        let broken = make_sim(24, 48, now);
        inner.insert_raw(healthy.clone()).await;
        inner.insert_raw(broken.clone()).await;

        let store = Arc::new(FailingStore {
            inner: inner.clone(),
            broken: broken.id,
        });
        let up = ProgressUpdater::new(store, Arc::new(FixedJitter(0.0)));

        let report = up.sweep_at(now).await;
        assert_eq!(report.updated, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 0);

        // The healthy simulation advanced normally.
        let ok_row = inner.get(healthy.id).await.unwrap().unwrap();
        assert_eq!(ok_row.current_opens, 400);
        assert_eq!(inner.snapshot_count(healthy.id).await, 1);

        // The failing one is untouched: no partial write, no snapshot.
        let bad_row = inner.get(broken.id).await.unwrap().unwrap();
        assert_eq!(bad_row.current_opens, 0);
        assert_eq!(bad_row.last_updated, broken.last_updated);
        assert_eq!(inner.snapshot_count(broken.id).await, 0);

        // The next sweep retries the failed simulation; with the fault
        // cleared (direct memory store) it catches up.
        let retried = updater(inner.clone(), 0.0).sweep_at(now).await;
        assert_eq!(retried.updated, 2);
        assert_eq!(retried.failed, 0);
        assert_eq!(
            inner.get(broken.id).await.unwrap().unwrap().current_opens,
            400
        );
    }

    #[test]
    fn test_thread_rng_jitter_in_bounds() {
        let jitter = ThreadRngJitter;
        for _ in 0..1000 {
            let draw = jitter.draw();
            assert!((-0.5..0.5).contains(&draw));
        }
    }
}
