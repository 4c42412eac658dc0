//! Money Muling Detection Core - Rust Engine
//!
//! Batch analysis of financial transactions to surface money-muling
//! networks: circular routing, structuring (smurfing), and layered shell
//! chains.
//!
//! # Architecture
//!
//! - **core**: Timestamp parsing and span arithmetic
//! - **config**: Detection thresholds (one read-only record per pipeline)
//! - **ingest**: CSV schema validation and row filtering
//! - **models**: Domain types (Transaction, TransactionGraph, Ring, reports)
//! - **detectors**: Cycle, smurf, and shell-chain detection
//! - **scoring**: Confidence, density guard, and suspicion scoring
//! - **pipeline**: Orchestration, timing, cancellation, error wrapping
//!
//! Data flow is strictly linear: ingest → graph → detectors → confidence →
//! density → scoring → result. Detectors read one immutable graph and never
//! observe each other's output.
//!
//! # Critical Invariants
//!
//! 1. Identical (CSV bytes, config) input yields identical output
//! 2. Every collection whose iteration order can reach the output is sorted
//! 3. All state is owned per invocation; nothing outlives the analyze call

// Module declarations
pub mod config;
pub mod core;
pub mod detectors;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod scoring;

// Re-exports for convenience
pub use config::DetectionConfig;
pub use ingest::{IngestDiagnostics, IngestError, IngestOutcome};
pub use models::{
    graph::{AccountAggregate, TransactionGraph},
    report::{AccountFinding, AnalysisOutput, AnalysisResult, AnalysisSummary, RingReport},
    ring::{PatternType, Ring, RingEvidence},
    transaction::Transaction,
};
pub use pipeline::{AnalyzeRequest, CancelToken, Pipeline, PipelineError};
