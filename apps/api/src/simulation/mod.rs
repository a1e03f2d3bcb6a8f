// Engagement simulation engine.
// Implements: parameter derivation, lifecycle state machine, sweep algorithm,
// metric time series with retention, and the interval scheduler driving it.
// No real employer interaction happens anywhere in here.

pub mod handlers;
pub mod lifecycle;
pub mod params;
pub mod progress;
pub mod recorder;
pub mod scheduler;

pub use lifecycle::LifecycleManager;
pub use progress::{ProgressUpdater, SweepReport, ThreadRngJitter};
pub use recorder::MetricsRecorder;
pub use scheduler::Scheduler;
