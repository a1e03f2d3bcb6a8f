mod config;
mod db;
mod errors;
mod models;
mod routes;
mod simulation;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::simulation::{
    LifecycleManager, MetricsRecorder, ProgressUpdater, Scheduler, ThreadRngJitter,
};
use crate::state::AppState;
use crate::store::{PgCountryRepository, PgResumeRepository, PgStore, SimulationStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Outreach API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Wire the simulation engine: Postgres-backed stores, thread RNG jitter
    let sim_store: Arc<dyn SimulationStore> = Arc::new(PgStore::new(db.clone()));
    let resumes = Arc::new(PgResumeRepository::new(db.clone()));
    let countries = Arc::new(PgCountryRepository::new(db.clone()));

    let lifecycle = Arc::new(LifecycleManager::new(
        sim_store.clone(),
        resumes,
        countries,
        config.simulation.duration_bounds(),
    ));
    let updater = Arc::new(ProgressUpdater::new(
        sim_store.clone(),
        Arc::new(ThreadRngJitter),
    ));
    let recorder = Arc::new(MetricsRecorder::new(sim_store.clone()));

    // Background cadence: progress sweeps + retention. Fails fast on a
    // malformed config, before any sweep runs.
    let mut scheduler = Scheduler::new(
        updater.clone(),
        recorder.clone(),
        sim_store.clone(),
        config.simulation.clone(),
    );
    scheduler.start()?;

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        store: sim_store,
        lifecycle,
        updater,
        recorder,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // internal service; fronted by the gateway

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Serve has drained; stop the sweep/retention loops before exiting so an
    // in-flight sweep runs to completion.
    scheduler.stop().await;
    Ok(())
}

/// Resolves on ctrl-c.
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
