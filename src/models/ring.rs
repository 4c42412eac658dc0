//! Ring model
//!
//! A ring is one detected structure: a cycle, a smurfing hub with its
//! counterparties, or a shell chain. Detectors emit rings without ids; the
//! scoring engine assigns `RING_{CYC|SMR|SHL}_{NNNN}` ids in deterministic
//! emission order.

use serde::{Deserialize, Serialize};

/// Detected pattern family
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Directed simple cycle of transfers
    Cycle,
    /// Hub transacting with many distinct counterparties in a short window
    Smurfing,
    /// Layered pass-through chain ending at a sink
    Shell,
}

impl PatternType {
    /// Lowercase wire label, also used in `detected_patterns`
    pub fn label(&self) -> &'static str {
        match self {
            PatternType::Cycle => "cycle",
            PatternType::Smurfing => "smurfing",
            PatternType::Shell => "shell",
        }
    }

    /// Three-letter ring-id segment
    pub fn ring_prefix(&self) -> &'static str {
        match self {
            PatternType::Cycle => "CYC",
            PatternType::Smurfing => "SMR",
            PatternType::Shell => "SHL",
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Detector-specific evidence carried on a ring
#[derive(Debug, Clone, PartialEq)]
pub enum RingEvidence {
    /// Cycle metrics
    Cycle {
        /// Vertex count
        length: usize,
        /// Observed span across the cycle edges, hours
        time_span_hours: f64,
        /// max/min amount ratio across the cycle edges
        amount_ratio: f64,
    },
    /// Smurfing window metrics
    Smurfing {
        /// Distinct counterparties in the peak window
        peak_counterparties: usize,
        /// Total transactions in the peak window
        window_tx_count: usize,
        /// peak_counterparties / window_tx_count
        diversity_ratio: f64,
        /// Coefficient of variation of window amounts
        amount_cv: f64,
        /// Combined diversity and variance dampening factor
        dampening: f64,
    },
    /// Shell chain metrics
    Shell {
        /// Vertex count
        length: usize,
        /// Observed span across the chain edges, hours
        time_span_hours: f64,
        /// max/min amount ratio across the chain edges
        amount_ratio: f64,
        /// 1 / avg intermediate total degree, clamped to [0, 1]
        tightness: f64,
    },
}

/// One detected structure
#[derive(Debug, Clone)]
pub struct Ring {
    /// Pattern family
    pub pattern: PatternType,

    /// Ordered members. Cycles: traversal order from the canonical vertex.
    /// Smurfing: hub first, then counterparties by first interaction.
    /// Shell: source, intermediates, sink.
    pub members: Vec<String>,

    /// Transaction indices evidencing the ring
    pub tx_indices: Vec<usize>,

    /// Detector-specific metrics
    pub evidence: RingEvidence,

    /// Structural confidence in [0, 1]; filled by the confidence engine,
    /// zero until then
    pub structural_confidence: f64,
}

impl Ring {
    /// Create a ring with unset confidence.
    pub fn new(
        pattern: PatternType,
        members: Vec<String>,
        tx_indices: Vec<usize>,
        evidence: RingEvidence,
    ) -> Self {
        Self {
            pattern,
            members,
            tx_indices,
            evidence,
            structural_confidence: 0.0,
        }
    }
}
