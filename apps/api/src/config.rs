use anyhow::{Context, Result};

use crate::errors::AppError;
use crate::simulation::params::DurationBounds;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub simulation: SimulationConfig,
}

/// Tunables for the engagement simulation engine.
///
/// All thresholds are explicit values handed to the components at
/// construction time; nothing in the engine reads the environment directly.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Lower bound on simulation duration, hours.
    pub min_hours: i64,
    /// Upper bound on simulation duration, hours.
    pub max_hours: i64,
    /// Sweep cadence for the progress updater, hours.
    pub update_interval_hours: i64,
    /// Metric snapshots older than this are pruned by the retention job.
    pub retention_days: i64,
    /// Completed simulations older than this are deleted by the retention job.
    pub completed_ttl_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            simulation: SimulationConfig {
                min_hours: env_i64("SIM_MIN_HOURS", 1)?,
                max_hours: env_i64("SIM_MAX_HOURS", 96)?,
                update_interval_hours: env_i64("SIM_UPDATE_INTERVAL_HOURS", 2)?,
                retention_days: env_i64("METRICS_RETENTION_DAYS", 90)?,
                completed_ttl_days: env_i64("SIM_COMPLETED_TTL_DAYS", 180)?,
            },
        })
    }
}

impl SimulationConfig {
    /// Checks interval and threshold bounds. Called by the scheduler before
    /// any sweep runs, so a malformed config fails fast at startup.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.min_hours < 1 {
            return Err(AppError::Config(format!(
                "SIM_MIN_HOURS must be >= 1 (got {})",
                self.min_hours
            )));
        }
        if self.max_hours < self.min_hours {
            return Err(AppError::Config(format!(
                "SIM_MAX_HOURS ({}) must be >= SIM_MIN_HOURS ({})",
                self.max_hours, self.min_hours
            )));
        }
        if self.update_interval_hours < 1 {
            return Err(AppError::Config(format!(
                "SIM_UPDATE_INTERVAL_HOURS must be >= 1 (got {})",
                self.update_interval_hours
            )));
        }
        if self.retention_days < 1 {
            return Err(AppError::Config(format!(
                "METRICS_RETENTION_DAYS must be >= 1 (got {})",
                self.retention_days
            )));
        }
        if self.completed_ttl_days < 1 {
            return Err(AppError::Config(format!(
                "SIM_COMPLETED_TTL_DAYS must be >= 1 (got {})",
                self.completed_ttl_days
            )));
        }
        Ok(())
    }

    pub fn duration_bounds(&self) -> DurationBounds {
        DurationBounds {
            min_hours: self.min_hours,
            max_hours: self.max_hours,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_i64(key: &str, default: i64) -> Result<i64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("{key} must be an integer (got '{raw}')")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SimulationConfig {
        SimulationConfig {
            min_hours: 1,
            max_hours: 96,
            update_interval_hours: 2,
            retention_days: 90,
            completed_ttl_days: 180,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_inverted_duration_bounds_rejected() {
        let mut cfg = valid();
        cfg.min_hours = 96;
        cfg.max_hours = 1;
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut cfg = valid();
        cfg.update_interval_hours = 0;
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_retention_rejected() {
        let mut cfg = valid();
        cfg.retention_days = 0;
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }
}
