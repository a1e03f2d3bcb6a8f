#![allow(dead_code)]

//! Interval scheduler — owns the background cadence of the engine: the
//! progress sweep and the daily retention job.
//!
//! An explicit object with `start()`/`stop()` rather than a process-wide
//! singleton, so the application wires exactly one in at startup and tests
//! can run as many independent instances as they like. No sweep work happens
//! before `start()` or after `stop()` resolves.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::config::SimulationConfig;
use crate::errors::AppError;
use crate::simulation::progress::ProgressUpdater;
use crate::simulation::recorder::MetricsRecorder;
use crate::store::SimulationStore;

/// Cadence of the retention job.
const RETENTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct Scheduler {
    updater: Arc<ProgressUpdater>,
    recorder: Arc<MetricsRecorder>,
    store: Arc<dyn SimulationStore>,
    config: SimulationConfig,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(
        updater: Arc<ProgressUpdater>,
        recorder: Arc<MetricsRecorder>,
        store: Arc<dyn SimulationStore>,
        config: SimulationConfig,
    ) -> Self {
        Self {
            updater,
            recorder,
            store,
            config,
            shutdown: None,
            tasks: Vec::new(),
        }
    }

    /// Validates configuration and spawns the sweep and retention loops.
    /// Fails fast on a malformed config, before any sweep runs. Calling
    /// `start` on an already running scheduler is a no-op.
    pub fn start(&mut self) -> Result<(), AppError> {
        self.config.validate()?;
        if self.shutdown.is_some() {
            return Ok(());
        }

        let (tx, rx) = watch::channel(false);

        let sweep_every = Duration::from_secs(self.config.update_interval_hours as u64 * 3600);
        self.tasks
            .push(spawn_sweep_loop(self.updater.clone(), sweep_every, rx.clone()));
        self.tasks.push(spawn_retention_loop(
            self.recorder.clone(),
            self.store.clone(),
            self.config.clone(),
            rx,
        ));

        self.shutdown = Some(tx);
        info!(
            interval_hours = self.config.update_interval_hours,
            retention_days = self.config.retention_days,
            "scheduler started"
        );
        Ok(())
    }

    /// Signals both loops to stop and waits for them to finish. A sweep
    /// already in flight runs to completion first.
    pub async fn stop(&mut self) {
        let Some(tx) = self.shutdown.take() else {
            return;
        };
        let _ = tx.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }
}

fn spawn_sweep_loop(
    updater: Arc<ProgressUpdater>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // ProgressUpdater serializes cycles internally, so even a
                    // manual trigger racing this tick cannot overlap it.
                    updater.sweep().await;
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

fn spawn_retention_loop(
    recorder: Arc<MetricsRecorder>,
    store: Arc<dyn SimulationStore>,
    config: SimulationConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(RETENTION_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = recorder.prune(config.retention_days).await {
                        error!("retention: snapshot pruning failed: {e}");
                    }
                    let cutoff = Utc::now() - chrono::Duration::days(config.completed_ttl_days);
                    match store.delete_completed_before(cutoff).await {
                        Ok(deleted) if deleted > 0 => {
                            info!(deleted, "retention: old completed simulations deleted");
                        }
                        Ok(_) => {}
                        Err(e) => error!("retention: simulation cleanup failed: {e}"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
