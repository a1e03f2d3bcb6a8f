#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Quality signals for a resume, produced by the scoring pipeline
/// (a separate service; we only read its output).
///
/// All scores are on a 0-100 scale. Missing scores are tolerated — the
/// parameter calculator substitutes a neutral 50.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeScores {
    pub quality_score: Option<f64>,
    pub skill_match_percentage: Option<f64>,
    pub overall_score: Option<f64>,
}
