use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::simulation::{LifecycleManager, MetricsRecorder, ProgressUpdater};
use crate::store::SimulationStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    #[allow(dead_code)]
    pub db: PgPool,
    pub config: Config,
    /// Storage seam; handlers only touch it for existence checks and the
    /// retention endpoints. Swapped for `MemoryStore` in tests.
    pub store: Arc<dyn SimulationStore>,
    pub lifecycle: Arc<LifecycleManager>,
    pub updater: Arc<ProgressUpdater>,
    pub recorder: Arc<MetricsRecorder>,
}
