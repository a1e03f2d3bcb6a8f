#![allow(dead_code)]

//! Parameter derivation — maps resume quality signals and market size to the
//! simulation's immutable targets and duration.
//!
//! Pure and deterministic: no clock reads (the caller passes `now`), no
//! randomness, no failure modes. Malformed scores fall back to a neutral 50.

use chrono::{DateTime, Duration, Utc};

use crate::models::resume::ResumeScores;

/// Neutral score substituted for unknown or malformed inputs.
pub const DEFAULT_SCORE: f64 = 50.0;

/// Bounds on `open_rate`: even a weak resume gets some opens, even a perfect
/// one never reaches the whole market.
const OPEN_RATE_MIN: f64 = 0.20;
const OPEN_RATE_MAX: f64 = 0.80;

/// Bounds on `shortlist_rate` (fraction of opens that convert).
const SHORTLIST_RATE_MIN: f64 = 0.05;
const SHORTLIST_RATE_MAX: f64 = 0.25;

/// Configured window for simulation duration.
#[derive(Debug, Clone, Copy)]
pub struct DurationBounds {
    pub min_hours: i64,
    pub max_hours: i64,
}

/// Quality signals feeding the calculator. All on a 0-100 scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualitySignals {
    pub quality_score: Option<f64>,
    pub skill_match_pct: Option<f64>,
    pub overall_score: Option<f64>,
}

impl From<ResumeScores> for QualitySignals {
    fn from(scores: ResumeScores) -> Self {
        QualitySignals {
            quality_score: scores.quality_score,
            skill_match_pct: scores.skill_match_percentage,
            overall_score: scores.overall_score,
        }
    }
}

/// Output of the calculator: everything about a simulation that is fixed at
/// creation time.
#[derive(Debug, Clone, Copy)]
pub struct SimulationParameters {
    pub duration_hours: i64,
    pub target_opens: i64,
    pub target_shortlists: i64,
    pub end_time: DateTime<Utc>,
}

/// Derives simulation targets and duration.
///
/// - Higher overall score means faster delivery:
///   `duration = round(max - (overall/100) * (max - min))`, clamped.
/// - `open_rate = clamp(0.20, 0.80, (quality + skill)/200 + 0.10)`.
/// - `shortlist_rate = clamp(0.05, 0.25, overall/400 + 0.05)`.
pub fn compute(
    signals: QualitySignals,
    total_employers: i64,
    bounds: DurationBounds,
    now: DateTime<Utc>,
) -> SimulationParameters {
    let quality = normalize(signals.quality_score);
    let skill = normalize(signals.skill_match_pct);
    let overall = normalize(signals.overall_score);

    let total_employers = total_employers.max(0);

    // Tolerate inverted bounds rather than panicking in `clamp`; the config
    // layer rejects them at startup anyway.
    let min_hours = bounds.min_hours.min(bounds.max_hours);
    let max_hours = bounds.min_hours.max(bounds.max_hours);

    let span = (max_hours - min_hours) as f64;
    let duration_hours = (max_hours as f64 - (overall / 100.0) * span).round() as i64;
    let duration_hours = duration_hours.clamp(min_hours, max_hours);

    let open_rate = ((quality + skill) / 200.0 + 0.10).clamp(OPEN_RATE_MIN, OPEN_RATE_MAX);
    let target_opens = ((total_employers as f64) * open_rate).round() as i64;
    let target_opens = target_opens.clamp(0, total_employers);

    let shortlist_rate = (overall / 400.0 + 0.05).clamp(SHORTLIST_RATE_MIN, SHORTLIST_RATE_MAX);
    let target_shortlists = ((target_opens as f64) * shortlist_rate).round() as i64;
    let target_shortlists = target_shortlists.clamp(0, target_opens);

    SimulationParameters {
        duration_hours,
        target_opens,
        target_shortlists,
        end_time: now + Duration::hours(duration_hours),
    }
}

/// Clamps a score into [0, 100]; missing or non-finite values become the
/// neutral default.
fn normalize(score: Option<f64>) -> f64 {
    match score {
        Some(s) if s.is_finite() => s.clamp(0.0, 100.0),
        _ => DEFAULT_SCORE,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
