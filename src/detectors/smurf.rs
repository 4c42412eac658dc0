//! Smurfing detection (fan-in / fan-out structuring)
//!
//! For every account, all transactions touching it (incoming and outgoing
//! together) are sorted by time and a 72-hour window slides across them.
//! The window with the most distinct counterparties is the account's peak;
//! an account whose peak reaches the threshold is emitted as a hub.
//!
//! Two dampening factors travel with the ring and scale the hub's score
//! contribution later (they never affect other detectors):
//! - diversity: a hub that touches almost every counterparty exactly once
//!   looks more like payroll than structuring
//! - variance: widely varying amounts are atypical for deliberate
//!   structuring

use crate::config::DetectionConfig;
use crate::models::graph::TransactionGraph;
use crate::models::ring::{PatternType, Ring, RingEvidence};
use crate::pipeline::CancelToken;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Diversity ratio above which the contribution is dampened
const DIVERSITY_THRESHOLD: f64 = 0.7;
/// Amount-CV above which the contribution is dampened
const VARIANCE_THRESHOLD: f64 = 0.5;

/// Detects high-fan hubs inside a sliding window
pub struct SmurfDetector<'a> {
    config: &'a DetectionConfig,
}

/// Best window found for one hub
struct PeakWindow {
    /// Range into the hub's time-sorted transaction list
    start: usize,
    end: usize,
    distinct: usize,
}

impl<'a> SmurfDetector<'a> {
    pub fn new(config: &'a DetectionConfig) -> Self {
        Self { config }
    }

    /// Emit one ring per hub whose counterparty peak meets the threshold.
    pub fn detect(&self, graph: &TransactionGraph, cancel: &CancelToken) -> Vec<Ring> {
        let mut rings = Vec::new();

        for hub in graph.accounts() {
            if cancel.is_cancelled() {
                break;
            }
            if let Some(ring) = self.check_hub(graph, hub) {
                rings.push(ring);
            }
        }

        debug!(hubs = rings.len(), "smurf detection complete");
        rings
    }

    fn window(&self) -> Duration {
        Duration::milliseconds((self.config.smurf_window_hours * 3_600_000.0) as i64)
    }

    fn check_hub(&self, graph: &TransactionGraph, hub: &str) -> Option<Ring> {
        let mut txs = graph.touching(hub);
        // Cheap lower bound: fewer touching transactions than the
        // threshold can never reach the counterparty peak.
        if txs.len() < self.config.smurf_min_counterparties {
            return None;
        }
        txs.sort_by_key(|&i| (graph.tx(i).timestamp(), i));

        let peak = self.best_window(graph, hub, &txs)?;
        if peak.distinct < self.config.smurf_min_counterparties {
            return None;
        }

        let window_txs = &txs[peak.start..peak.end];
        let window_tx_count = window_txs.len();

        // Counterparties ordered by first interaction inside the window
        let mut first_seen: BTreeMap<&str, DateTime<Utc>> = BTreeMap::new();
        for &idx in window_txs {
            let tx = graph.tx(idx);
            let cp = tx.counterparty(hub);
            if cp == hub {
                continue;
            }
            first_seen.entry(cp).or_insert_with(|| tx.timestamp());
        }
        let mut counterparties: Vec<(&str, DateTime<Utc>)> =
            first_seen.iter().map(|(cp, ts)| (*cp, *ts)).collect();
        counterparties.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));

        let mut members = Vec::with_capacity(counterparties.len() + 1);
        members.push(hub.to_string());
        members.extend(counterparties.iter().map(|(cp, _)| cp.to_string()));

        let amounts: Vec<f64> = window_txs.iter().map(|&i| graph.tx(i).amount()).collect();
        let amount_cv = variation_coefficient(&amounts);
        let diversity_ratio = peak.distinct as f64 / window_tx_count as f64;

        let mut dampening = 1.0;
        if diversity_ratio > DIVERSITY_THRESHOLD {
            dampening *= (1.0 - (diversity_ratio - DIVERSITY_THRESHOLD) / 0.3).clamp(0.5, 1.0);
        }
        if amount_cv > VARIANCE_THRESHOLD {
            dampening *= (1.0 - (amount_cv - VARIANCE_THRESHOLD).min(0.5)).clamp(0.5, 1.0);
        }

        Some(Ring::new(
            PatternType::Smurfing,
            members,
            window_txs.to_vec(),
            RingEvidence::Smurfing {
                peak_counterparties: peak.distinct,
                window_tx_count,
                diversity_ratio,
                amount_cv,
                dampening,
            },
        ))
    }

    /// Slide the window anchored at each transaction; keep the earliest
    /// window with the highest distinct-counterparty count.
    fn best_window(
        &self,
        graph: &TransactionGraph,
        hub: &str,
        sorted_txs: &[usize],
    ) -> Option<PeakWindow> {
        let window = self.window();
        let mut best: Option<PeakWindow> = None;

        for i in 0..sorted_txs.len() {
            let window_end = graph.tx(sorted_txs[i]).timestamp() + window;
            let mut distinct: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
            let mut j = i;
            while j < sorted_txs.len() && graph.tx(sorted_txs[j]).timestamp() <= window_end {
                let cp = graph.tx(sorted_txs[j]).counterparty(hub);
                if cp != hub {
                    distinct.insert(cp);
                }
                j += 1;
            }
            let count = distinct.len();
            if best.as_ref().map_or(true, |b| count > b.distinct) {
                best = Some(PeakWindow {
                    start: i,
                    end: j,
                    distinct: count,
                });
            }
        }

        best
    }
}

/// Population coefficient of variation (stddev / mean); zero for fewer
/// than two samples or a zero mean.
fn variation_coefficient(amounts: &[f64]) -> f64 {
    if amounts.len() < 2 {
        return 0.0;
    }
    let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance =
        amounts.iter().map(|a| (a - mean) * (a - mean)).sum::<f64>() / amounts.len() as f64;
    variance.sqrt() / mean
}
