//! Scoring stack
//!
//! Runs after the detectors, in order: structural confidence per ring,
//! density adjustments per account, then the aggregate scoring engine that
//! assembles the final findings and ring reports.

pub mod confidence;
pub mod density;
pub mod engine;

pub use confidence::ConfidenceEngine;
pub use density::DensityGuard;
pub use engine::ScoringEngine;
