#![allow(dead_code)]

//! In-memory store implementations.
//!
//! Back the engine in tests (no live PostgreSQL in CI) and double as the
//! reference semantics for `PgStore`: every guarantee the SQL layer makes is
//! spelled out here in plain Rust.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::market::CountryMarket;
use crate::models::resume::ResumeScores;
use crate::models::simulation::{MetricSnapshotRow, SimulationRow, SimulationStatus};
use crate::store::{CountryRepository, ProgressWrite, ResumeRepository, SimulationStore};

// ────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    simulations: HashMap<Uuid, SimulationRow>,
    /// Snapshots per simulation, in insertion order.
    snapshots: HashMap<Uuid, Vec<MetricSnapshotRow>>,
}

/// In-memory `SimulationStore`. A single `RwLock` over both maps makes every
/// multi-table write trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: inserts a simulation row without the initial snapshot.
    pub async fn insert_raw(&self, simulation: SimulationRow) {
        let mut inner = self.inner.write().await;
        inner.simulations.insert(simulation.id, simulation);
    }

    /// Test helper: number of snapshots stored for a simulation.
    pub async fn snapshot_count(&self, simulation_id: Uuid) -> usize {
        let inner = self.inner.read().await;
        inner
            .snapshots
            .get(&simulation_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SimulationStore for MemoryStore {
    async fn insert_with_initial_snapshot(
        &self,
        simulation: &SimulationRow,
        initial: &MetricSnapshotRow,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner
            .simulations
            .insert(simulation.id, simulation.clone());
        inner
            .snapshots
            .entry(simulation.id)
            .or_default()
            .push(initial.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SimulationRow>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.simulations.get(&id).cloned())
    }

    async fn list_for_resume(
        &self,
        resume_id: Uuid,
        country_code: Option<&str>,
    ) -> Result<Vec<SimulationRow>, AppError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<SimulationRow> = inner
            .simulations
            .values()
            .filter(|s| s.resume_id == resume_id)
            .filter(|s| country_code.map_or(true, |c| s.country_code == c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: SimulationStatus,
        to: SimulationStatus,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        match inner.simulations.get_mut(&id) {
            Some(sim) if sim.status_is(from) => {
                sim.status = to.as_str().to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fetch_running(&self, now: DateTime<Utc>) -> Result<Vec<SimulationRow>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .simulations
            .values()
            .filter(|s| s.status_is(SimulationStatus::Running) && s.simulation_end > now)
            .cloned()
            .collect())
    }

    async fn fetch_expired(&self, now: DateTime<Utc>) -> Result<Vec<SimulationRow>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .simulations
            .values()
            .filter(|s| s.status_is(SimulationStatus::Running) && s.simulation_end <= now)
            .cloned()
            .collect())
    }

    async fn apply_progress(
        &self,
        write: &ProgressWrite,
        snapshot: &MetricSnapshotRow,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        let applied = match inner.simulations.get_mut(&write.simulation_id) {
            Some(sim) if sim.status_is(SimulationStatus::Running) => {
                sim.current_opens = write.current_opens;
                sim.current_shortlists = write.current_shortlists;
                sim.status = write.status.as_str().to_string();
                sim.last_updated = write.last_updated;
                true
            }
            _ => false,
        };
        if applied {
            inner
                .snapshots
                .entry(write.simulation_id)
                .or_default()
                .push(snapshot.clone());
        }
        Ok(applied)
    }

    async fn append_snapshot(&self, snapshot: &MetricSnapshotRow) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        inner
            .snapshots
            .entry(snapshot.simulation_id)
            .or_default()
            .push(snapshot.clone());
        Ok(())
    }

    async fn recent_snapshots(
        &self,
        simulation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MetricSnapshotRow>, AppError> {
        if limit <= 0 {
            return Ok(vec![]);
        }
        let inner = self.inner.read().await;
        let mut rows = inner
            .snapshots
            .get(&simulation_id)
            .cloned()
            .unwrap_or_default();
        // Stable sort keeps insertion order for duplicate timestamps.
        rows.sort_by_key(|s| s.recorded_at);
        Ok(rows.into_iter().rev().take(limit as usize).collect())
    }

    async fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut inner = self.inner.write().await;
        let mut deleted = 0u64;
        for rows in inner.snapshots.values_mut() {
            // Latest = max timestamp, last insertion winning ties.
            let latest = rows
                .iter()
                .enumerate()
                .max_by(|(ia, a), (ib, b)| {
                    a.recorded_at.cmp(&b.recorded_at).then(ia.cmp(ib))
                })
                .map(|(i, _)| i);
            let before = rows.len();
            let mut idx = 0;
            rows.retain(|s| {
                let keep = s.recorded_at >= cutoff || Some(idx) == latest;
                idx += 1;
                keep
            });
            deleted += (before - rows.len()) as u64;
        }
        Ok(deleted)
    }

    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut inner = self.inner.write().await;
        let doomed: Vec<Uuid> = inner
            .simulations
            .values()
            .filter(|s| s.status_is(SimulationStatus::Completed) && s.last_updated < cutoff)
            .map(|s| s.id)
            .collect();
        for id in &doomed {
            inner.simulations.remove(id);
            inner.snapshots.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator fakes
// ────────────────────────────────────────────────────────────────────────────

/// In-memory `ResumeRepository` preloaded with fixed scores.
#[derive(Default)]
pub struct MemoryResumeRepository {
    scores: HashMap<Uuid, ResumeScores>,
}

impl MemoryResumeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resume_id: Uuid, scores: ResumeScores) -> Self {
        self.scores.insert(resume_id, scores);
        self
    }
}

#[async_trait]
impl ResumeRepository for MemoryResumeRepository {
    async fn get_scores(&self, resume_id: Uuid) -> Result<ResumeScores, AppError> {
        self.scores
            .get(&resume_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))
    }
}

/// In-memory `CountryRepository` preloaded with fixed market sizes.
#[derive(Default)]
pub struct MemoryCountryRepository {
    markets: HashMap<String, CountryMarket>,
}

impl MemoryCountryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, country_code: &str, total_employers: i64) -> Self {
        self.markets
            .insert(country_code.to_string(), CountryMarket { total_employers });
        self
    }
}

#[async_trait]
impl CountryRepository for MemoryCountryRepository {
    async fn get_market(&self, country_code: &str) -> Result<CountryMarket, AppError> {
        self.markets
            .get(country_code)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Country {country_code} not found")))
    }
}
