#![allow(dead_code)]

//! PostgreSQL store implementations (see `schema.sql` for the tables).
//!
//! All multi-table writes go through a transaction so a snapshot is never
//! recorded without its matching simulation update. Status-sensitive writes
//! are conditional `UPDATE ... WHERE status = $n`, which rides PostgreSQL's
//! row locks to serialize pause/resume against a concurrent sweep.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::market::CountryMarket;
use crate::models::resume::ResumeScores;
use crate::models::simulation::{MetricSnapshotRow, SimulationRow, SimulationStatus};
use crate::store::{CountryRepository, ProgressWrite, ResumeRepository, SimulationStore};

// ────────────────────────────────────────────────────────────────────────────
// PgStore
// ────────────────────────────────────────────────────────────────────────────

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SNAPSHOT_COLUMNS: &str = "simulation_id, recorded_at, opens_count, shortlists_count, \
                                employers_reached, progress_percentage";

async fn insert_snapshot<'e, E>(executor: E, snapshot: &MetricSnapshotRow) -> Result<(), AppError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO metric_snapshots
            (simulation_id, recorded_at, opens_count, shortlists_count,
             employers_reached, progress_percentage)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(snapshot.simulation_id)
    .bind(snapshot.recorded_at)
    .bind(snapshot.opens_count)
    .bind(snapshot.shortlists_count)
    .bind(snapshot.employers_reached)
    .bind(snapshot.progress_percentage)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl SimulationStore for PgStore {
    async fn insert_with_initial_snapshot(
        &self,
        simulation: &SimulationRow,
        initial: &MetricSnapshotRow,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO simulations
                (id, resume_id, subscription_id, country_code, total_employers,
                 simulation_start, simulation_end, duration_hours,
                 target_opens, target_shortlists, current_opens, current_shortlists,
                 status, last_updated, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(simulation.id)
        .bind(simulation.resume_id)
        .bind(simulation.subscription_id)
        .bind(&simulation.country_code)
        .bind(simulation.total_employers)
        .bind(simulation.simulation_start)
        .bind(simulation.simulation_end)
        .bind(simulation.duration_hours)
        .bind(simulation.target_opens)
        .bind(simulation.target_shortlists)
        .bind(simulation.current_opens)
        .bind(simulation.current_shortlists)
        .bind(&simulation.status)
        .bind(simulation.last_updated)
        .bind(simulation.created_at)
        .execute(&mut *tx)
        .await?;

        insert_snapshot(&mut *tx, initial).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SimulationRow>, AppError> {
        let row = sqlx::query_as::<_, SimulationRow>("SELECT * FROM simulations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_for_resume(
        &self,
        resume_id: Uuid,
        country_code: Option<&str>,
    ) -> Result<Vec<SimulationRow>, AppError> {
        let rows = match country_code {
            Some(code) => {
                sqlx::query_as::<_, SimulationRow>(
                    "SELECT * FROM simulations \
                     WHERE resume_id = $1 AND country_code = $2 \
                     ORDER BY created_at DESC",
                )
                .bind(resume_id)
                .bind(code)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SimulationRow>(
                    "SELECT * FROM simulations WHERE resume_id = $1 ORDER BY created_at DESC",
                )
                .bind(resume_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: SimulationStatus,
        to: SimulationStatus,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE simulations SET status = $1 WHERE id = $2 AND status = $3")
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_running(&self, now: DateTime<Utc>) -> Result<Vec<SimulationRow>, AppError> {
        let rows = sqlx::query_as::<_, SimulationRow>(
            "SELECT * FROM simulations WHERE status = 'running' AND simulation_end > $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn fetch_expired(&self, now: DateTime<Utc>) -> Result<Vec<SimulationRow>, AppError> {
        let rows = sqlx::query_as::<_, SimulationRow>(
            "SELECT * FROM simulations WHERE status = 'running' AND simulation_end <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn apply_progress(
        &self,
        write: &ProgressWrite,
        snapshot: &MetricSnapshotRow,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE simulations
            SET current_opens = $1, current_shortlists = $2, status = $3, last_updated = $4
            WHERE id = $5 AND status = 'running'
            "#,
        )
        .bind(write.current_opens)
        .bind(write.current_shortlists)
        .bind(write.status.as_str())
        .bind(write.last_updated)
        .bind(write.simulation_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Paused or completed since the sweep read it; write nothing.
            return Ok(false);
        }

        insert_snapshot(&mut *tx, snapshot).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn append_snapshot(&self, snapshot: &MetricSnapshotRow) -> Result<(), AppError> {
        insert_snapshot(&self.pool, snapshot).await
    }

    async fn recent_snapshots(
        &self,
        simulation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MetricSnapshotRow>, AppError> {
        if limit <= 0 {
            return Ok(vec![]);
        }
        let rows = sqlx::query_as::<_, MetricSnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM metric_snapshots \
             WHERE simulation_id = $1 \
             ORDER BY recorded_at DESC, seq DESC \
             LIMIT $2"
        ))
        .bind(simulation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn prune_snapshots(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        // `seq NOT IN (...)` pins each simulation's most recent snapshot
        // (latest insertion wins timestamp ties), so every simulation keeps
        // at least one observable data point.
        let result = sqlx::query(
            r#"
            DELETE FROM metric_snapshots
            WHERE recorded_at < $1
              AND seq NOT IN (
                  SELECT DISTINCT ON (simulation_id) seq
                  FROM metric_snapshots
                  ORDER BY simulation_id, recorded_at DESC, seq DESC
              )
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_completed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM metric_snapshots
            WHERE simulation_id IN (
                SELECT id FROM simulations
                WHERE status = 'completed' AND last_updated < $1
            )
            "#,
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "DELETE FROM simulations WHERE status = 'completed' AND last_updated < $1",
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator repositories
// ────────────────────────────────────────────────────────────────────────────

/// Reads resume quality signals from the scoring pipeline's table.
pub struct PgResumeRepository {
    pool: PgPool,
}

impl PgResumeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeRepository for PgResumeRepository {
    async fn get_scores(&self, resume_id: Uuid) -> Result<ResumeScores, AppError> {
        let row = sqlx::query_as::<_, ResumeScores>(
            "SELECT quality_score, skill_match_percentage, overall_score \
             FROM resume_scores WHERE resume_id = $1",
        )
        .bind(resume_id)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))
    }
}

/// Reads country market sizes from the market-data importer's table.
pub struct PgCountryRepository {
    pool: PgPool,
}

impl PgCountryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CountryRepository for PgCountryRepository {
    async fn get_market(&self, country_code: &str) -> Result<CountryMarket, AppError> {
        let row = sqlx::query_as::<_, CountryMarket>(
            "SELECT total_employers FROM countries WHERE code = $1",
        )
        .bind(country_code)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| AppError::NotFound(format!("Country {country_code} not found")))
    }
}
