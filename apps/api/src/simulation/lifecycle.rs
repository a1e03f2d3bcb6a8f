#![allow(dead_code)]

//! Simulation lifecycle — creation and the running/paused/completed state
//! machine.
//!
//! Creation is the only place resume scores and market sizes are consulted;
//! the resulting targets and duration are frozen into the row. Pause and
//! resume flip status and nothing else — in particular `simulation_end` does
//! not shift, so elapsed wall-clock time keeps accruing while paused (see
//! the note at `progress::elapsed_fraction`).

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::simulation::{MetricSnapshotRow, SimulationRow, SimulationStatus};
use crate::simulation::params::{self, DurationBounds};
use crate::store::{CountryRepository, ResumeRepository, SimulationStore};

pub struct LifecycleManager {
    store: Arc<dyn SimulationStore>,
    resumes: Arc<dyn ResumeRepository>,
    countries: Arc<dyn CountryRepository>,
    bounds: DurationBounds,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn SimulationStore>,
        resumes: Arc<dyn ResumeRepository>,
        countries: Arc<dyn CountryRepository>,
        bounds: DurationBounds,
    ) -> Self {
        Self {
            store,
            resumes,
            countries,
            bounds,
        }
    }

    /// Creates a simulation for a (resume, country) pair: fetches quality
    /// signals and market size, derives the immutable parameters, and inserts
    /// the row plus its all-zero initial snapshot in one transaction.
    pub async fn create(
        &self,
        resume_id: Uuid,
        subscription_id: Uuid,
        country_code: &str,
    ) -> Result<SimulationRow, AppError> {
        let scores = self.resumes.get_scores(resume_id).await?;
        let market = self.countries.get_market(country_code).await?;

        let now = Utc::now();
        let p = params::compute(scores.into(), market.total_employers, self.bounds, now);

        let simulation = SimulationRow {
            id: Uuid::new_v4(),
            resume_id,
            subscription_id,
            country_code: country_code.to_string(),
            total_employers: market.total_employers,
            simulation_start: now,
            simulation_end: p.end_time,
            duration_hours: p.duration_hours,
            target_opens: p.target_opens,
            target_shortlists: p.target_shortlists,
            current_opens: 0,
            current_shortlists: 0,
            status: SimulationStatus::Running.as_str().to_string(),
            last_updated: now,
            created_at: now,
        };
        let initial = MetricSnapshotRow::initial(simulation.id, now);

        self.store
            .insert_with_initial_snapshot(&simulation, &initial)
            .await?;

        info!(
            simulation_id = %simulation.id,
            resume_id = %resume_id,
            country = %country_code,
            duration_hours = p.duration_hours,
            target_opens = p.target_opens,
            target_shortlists = p.target_shortlists,
            "simulation created"
        );
        Ok(simulation)
    }

    /// Pauses a running simulation. Leaves `simulation_end` and the current
    /// values untouched, so resuming picks up exactly where it left off.
    pub async fn pause(&self, id: Uuid) -> Result<SimulationRow, AppError> {
        self.transition(id, SimulationStatus::Running, SimulationStatus::Paused)
            .await
    }

    /// Resumes a paused simulation.
    pub async fn resume(&self, id: Uuid) -> Result<SimulationRow, AppError> {
        self.transition(id, SimulationStatus::Paused, SimulationStatus::Running)
            .await
    }

    /// All simulations for a resume, optionally narrowed to one country.
    pub async fn status_for_resume(
        &self,
        resume_id: Uuid,
        country_code: Option<&str>,
    ) -> Result<Vec<SimulationRow>, AppError> {
        self.store.list_for_resume(resume_id, country_code).await
    }

    async fn transition(
        &self,
        id: Uuid,
        from: SimulationStatus,
        to: SimulationStatus,
    ) -> Result<SimulationRow, AppError> {
        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Simulation {id} not found")))?;

        // Conditional flip at the storage layer; the pre-read above is only
        // for error reporting, so a lost race still surfaces as InvalidState.
        let flipped = self.store.transition_status(id, from, to).await?;
        if !flipped {
            return Err(AppError::InvalidState(format!(
                "Simulation {id} is {}, cannot transition to {to}",
                existing.status
            )));
        }

        info!(simulation_id = %id, from = %from, to = %to, "simulation status changed");

        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Simulation {id} not found")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
