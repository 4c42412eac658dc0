//! Analysis pipeline
//!
//! Owns one validated [`DetectionConfig`] and runs the full stage sequence
//! per request: decode → ingest → graph → cycle/smurf/shell detection →
//! confidence → scoring. Each invocation owns all of its state; nothing
//! survives the call and nothing is shared between calls.
//!
//! # Failure model
//!
//! Ingest problems surface as typed [`IngestError`]s. A panic inside any
//! later stage is caught and converted to [`PipelineError::Internal`]
//! naming the component, so the host always receives a typed error.
//! Cancellation is cooperative: detectors poll the request's token once
//! per start vertex, and the pipeline aborts between stages.

use crate::config::DetectionConfig;
use crate::detectors::{CycleDetector, ShellDetector, SmurfDetector};
use crate::ingest::{self, IngestError};
use crate::models::graph::TransactionGraph;
use crate::models::report::{AnalysisOutput, AnalysisResult, AnalysisSummary};
use crate::models::ring::Ring;
use crate::scoring::{ConfidenceEngine, ScoringEngine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Cooperative cancellation flag shared with the caller
///
/// Cloning is cheap; all clones observe the same flag. Detectors poll it
/// at vertex-loop granularity, so cancellation takes effect quickly
/// without per-edge overhead.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the in-flight analysis aborts with
    /// [`PipelineError::Cancelled`] and no partial result.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One analysis request: raw CSV bytes plus a cancellation token
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    /// UTF-8 CSV content (decoding failures are typed errors, not panics)
    pub csv_bytes: Vec<u8>,

    /// Cooperative cancellation flag for this request
    pub cancel: CancelToken,
}

impl AnalyzeRequest {
    pub fn new(csv_bytes: Vec<u8>) -> Self {
        Self {
            csv_bytes,
            cancel: CancelToken::new(),
        }
    }

    /// Attach an externally-owned cancel token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Ingest rejected the batch
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Configuration failed validation at construction
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The caller cancelled the request
    #[error("analysis cancelled")]
    Cancelled,

    /// Unexpected invariant violation inside a component
    #[error("internal error in {component}: {detail}")]
    Internal {
        /// Offending component name
        component: String,
        /// Human-readable description
        detail: String,
    },
}

impl PipelineError {
    /// Machine-stable error code
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Ingest(err) => err.code(),
            PipelineError::InvalidConfig(_) => "invalid_config",
            PipelineError::Cancelled => "cancelled",
            PipelineError::Internal { .. } => "internal_error",
        }
    }
}

/// The analysis pipeline
#[derive(Debug)]
pub struct Pipeline {
    config: DetectionConfig,
}

impl Pipeline {
    /// Validate the config and build a pipeline.
    pub fn new(config: DetectionConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::InvalidConfig)?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run the full analysis for one request.
    pub fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisOutput, PipelineError> {
        let started = Instant::now();
        let cancel = &request.cancel;

        let text =
            std::str::from_utf8(&request.csv_bytes).map_err(|_| IngestError::Encoding)?;
        let outcome = ingest::parse_csv(text, &self.config)?;
        if outcome.diagnostics.total_dropped() > 0 {
            warn!(
                dropped = outcome.diagnostics.total_dropped(),
                "malformed rows skipped"
            );
        }
        let diagnostics = outcome.diagnostics;

        let graph = TransactionGraph::build(outcome.transactions);
        info!(
            transactions = graph.edge_count(),
            accounts = graph.account_count(),
            "graph constructed"
        );
        self.ensure_live(cancel)?;

        let cycles = run_stage("cycle_detector", || {
            CycleDetector::new(&self.config).detect(&graph, cancel)
        })?;
        self.ensure_live(cancel)?;

        let smurfs = run_stage("smurf_detector", || {
            SmurfDetector::new(&self.config).detect(&graph, cancel)
        })?;
        self.ensure_live(cancel)?;

        let shells = run_stage("shell_detector", || {
            ShellDetector::new(&self.config).detect(&graph, cancel)
        })?;
        self.ensure_live(cancel)?;

        // Deterministic emission order: cycles, smurfs, shells
        let mut rings: Vec<Ring> = Vec::with_capacity(cycles.len() + smurfs.len() + shells.len());
        rings.extend(cycles);
        rings.extend(smurfs);
        rings.extend(shells);

        run_stage("confidence_engine", || {
            ConfidenceEngine::new(&self.config).annotate(&mut rings, &graph)
        })?;

        let (suspicious_accounts, fraud_rings) = run_stage("scoring_engine", || {
            ScoringEngine::new(&self.config).run(&graph, &rings)
        })?;

        let elapsed = started.elapsed().as_secs_f64();
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(PipelineError::Internal {
                component: "pipeline".to_string(),
                detail: format!("invalid elapsed time: {elapsed}"),
            });
        }

        let summary = AnalysisSummary {
            total_accounts_analyzed: graph.account_count(),
            suspicious_accounts_flagged: suspicious_accounts.len(),
            fraud_rings_detected: fraud_rings.len(),
            processing_time_seconds: (elapsed * 10_000.0).round() / 10_000.0,
        };
        info!(
            flagged = summary.suspicious_accounts_flagged,
            rings = summary.fraud_rings_detected,
            seconds = summary.processing_time_seconds,
            "analysis complete"
        );

        Ok(AnalysisOutput {
            result: AnalysisResult {
                suspicious_accounts,
                fraud_rings,
                summary,
            },
            diagnostics,
        })
    }

    fn ensure_live(&self, cancel: &CancelToken) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Run one stage, converting a panic into a typed internal error naming
/// the component.
fn run_stage<T>(
    component: &'static str,
    stage: impl FnOnce() -> T,
) -> Result<T, PipelineError> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(stage)).map_err(|payload| {
        let detail = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unexpected panic".to_string()
        };
        PipelineError::Internal {
            component: component.to_string(),
            detail,
        }
    })
}
