#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Employer market size for a target country, maintained by the market-data
/// importer (a separate service; we only read it).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CountryMarket {
    pub total_employers: i64,
}
