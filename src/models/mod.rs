//! Domain models for the detection engine

pub mod graph;
pub mod report;
pub mod ring;
pub mod transaction;

// Re-exports
pub use graph::{AccountAggregate, TransactionGraph};
pub use report::{
    AccountFinding, AnalysisOutput, AnalysisResult, AnalysisSummary, RingReport,
};
pub use ring::{PatternType, Ring, RingEvidence};
pub use transaction::Transaction;
