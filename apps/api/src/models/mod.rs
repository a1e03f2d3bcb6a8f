pub mod market;
pub mod resume;
pub mod simulation;
