//! Structural confidence
//!
//! Each ring gets a confidence in [0, 1] blending three components:
//!
//! - temporal closeness: `1 - span / 72h`
//! - amount uniformity: how far the ring's amount spread sits from its
//!   pattern's ratio cap (smurfing uses the amount CV instead)
//! - topology tightness: short cycles, narrow shell corridors, repeat-heavy
//!   smurf windows
//!
//! `confidence = 0.4·temporal + 0.3·amount + 0.3·tightness`, clamped.

use crate::config::DetectionConfig;
use crate::models::graph::TransactionGraph;
use crate::models::ring::{Ring, RingEvidence};

/// Reference span for the temporal component, hours
const MAX_SPAN_HOURS: f64 = 72.0;

const WEIGHT_TEMPORAL: f64 = 0.4;
const WEIGHT_AMOUNT: f64 = 0.3;
const WEIGHT_TIGHTNESS: f64 = 0.3;

/// Computes structural confidence per ring
pub struct ConfidenceEngine<'a> {
    config: &'a DetectionConfig,
}

impl<'a> ConfidenceEngine<'a> {
    pub fn new(config: &'a DetectionConfig) -> Self {
        Self { config }
    }

    /// Fill `structural_confidence` on every ring.
    pub fn annotate(&self, rings: &mut [Ring], graph: &TransactionGraph) {
        for ring in rings {
            ring.structural_confidence = self.score(ring, graph);
        }
    }

    /// Confidence for a single ring.
    pub fn score(&self, ring: &Ring, graph: &TransactionGraph) -> f64 {
        let temporal = self.temporal_component(ring, graph);
        let amount = self.amount_component(ring);
        let tightness = self.tightness_component(ring);

        (WEIGHT_TEMPORAL * temporal + WEIGHT_AMOUNT * amount + WEIGHT_TIGHTNESS * tightness)
            .clamp(0.0, 1.0)
    }

    fn temporal_component(&self, ring: &Ring, graph: &TransactionGraph) -> f64 {
        let timestamps = ring.tx_indices.iter().map(|&i| graph.tx(i).timestamp());
        let (Some(first), Some(last)) = (timestamps.clone().min(), timestamps.max()) else {
            return 1.0;
        };
        let span = crate::core::time::span_hours(first, last);
        (1.0 - span / MAX_SPAN_HOURS).clamp(0.0, 1.0)
    }

    fn amount_component(&self, ring: &Ring) -> f64 {
        match ring.evidence {
            RingEvidence::Cycle { amount_ratio, .. } => {
                1.0 - ((amount_ratio - 1.0) / self.config.cycle_amount_ratio).min(1.0)
            }
            RingEvidence::Shell { amount_ratio, .. } => {
                1.0 - ((amount_ratio - 1.0) / self.config.shell_amount_ratio).min(1.0)
            }
            RingEvidence::Smurfing { amount_cv, .. } => 1.0 - amount_cv.min(1.0),
        }
        .clamp(0.0, 1.0)
    }

    fn tightness_component(&self, ring: &Ring) -> f64 {
        match ring.evidence {
            RingEvidence::Cycle { length, .. } => {
                let min_len = self.config.cycle_min_len as f64;
                let max_len = self.config.cycle_max_len as f64;
                if max_len <= min_len {
                    1.0
                } else {
                    1.0 - (length as f64 - min_len) / (max_len - min_len)
                }
            }
            RingEvidence::Shell { tightness, .. } => tightness,
            RingEvidence::Smurfing {
                diversity_ratio, ..
            } => diversity_ratio,
        }
        .clamp(0.0, 1.0)
    }
}
