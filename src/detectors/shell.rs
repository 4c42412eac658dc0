//! Shell chain detection (layering)
//!
//! A shell chain is a directed acyclic pass-through corridor: a source
//! feeds a run of low-degree intermediaries that ends at a sink account.
//! Detection is a depth-limited DFS from every account with outgoing
//! edges, in sorted order.
//!
//! Acceptance rules for a chain of 3-8 vertices:
//! - every intermediate has total degree 2-3 and forwards only to its
//!   successor within the chain's observed time window (no branching)
//! - the tail is a sink (no outgoing edges) and is exempt from the degree
//!   band
//! - every edge amount meets the minimum; the running amount ratio and
//!   time span stay within their caps; timestamps are non-decreasing up to
//!   the shared slack
//!
//! Chains that are contiguous subsequences of a longer accepted chain are
//! suppressed, so a corridor is reported once at full length.

use crate::config::DetectionConfig;
use crate::detectors::{select_edge, EdgeLimits, PathStats};
use crate::models::graph::TransactionGraph;
use crate::models::ring::{PatternType, Ring, RingEvidence};
use crate::pipeline::CancelToken;
use std::collections::BTreeMap;
use tracing::debug;

/// Detects layered pass-through chains
pub struct ShellDetector<'a> {
    config: &'a DetectionConfig,
}

/// Accepted chains keyed by ordered vertex tuple
struct ShellSink {
    rings: Vec<Ring>,
    ratios: Vec<f64>,
    index_by_members: BTreeMap<Vec<String>, usize>,
}

impl<'a> ShellDetector<'a> {
    pub fn new(config: &'a DetectionConfig) -> Self {
        Self { config }
    }

    /// Enumerate maximal admissible chains.
    pub fn detect(&self, graph: &TransactionGraph, cancel: &CancelToken) -> Vec<Ring> {
        let mut sink = ShellSink {
            rings: Vec::new(),
            ratios: Vec::new(),
            index_by_members: BTreeMap::new(),
        };

        for source in graph.accounts() {
            if cancel.is_cancelled() {
                break;
            }
            if graph.outgoing(source).is_empty() {
                continue;
            }
            let mut path = vec![source.to_string()];
            let mut edges = Vec::new();
            self.dfs(graph, &mut path, &mut edges, None, &mut sink);
        }

        let rings = suppress_subchains(sink.rings);
        debug!(chains = rings.len(), "shell detection complete");
        rings
    }

    fn limits(&self) -> EdgeLimits {
        EdgeLimits {
            slack: self.config.timestamp_slack(),
            ratio_cap: self.config.shell_amount_ratio,
            span_cap_hours: self.config.shell_time_span_hours,
            min_edge_amount: self.config.shell_min_amount,
        }
    }

    fn dfs(
        &self,
        graph: &TransactionGraph,
        path: &mut Vec<String>,
        edges: &mut Vec<usize>,
        stats: Option<PathStats>,
        sink: &mut ShellSink,
    ) {
        let Some(current) = path.last().cloned() else {
            return;
        };
        let depth = path.len();

        if depth >= self.config.shell_min_len {
            if let Some(ref s) = stats {
                self.try_accept(graph, path, edges, s, sink);
            }
        }
        if depth >= self.config.shell_max_len {
            return;
        }

        // Extending beyond `current` turns it into an intermediate, so it
        // must sit inside the degree band (the source is exempt).
        if depth >= 2 {
            let degree = graph.total_degree(&current);
            if degree < self.config.shell_intermediate_degree_min
                || degree > self.config.shell_intermediate_degree_max
            {
                return;
            }
        }

        let limits = self.limits();
        let prev_ts = edges.last().map(|&i| graph.tx(i).timestamp());

        let mut by_receiver: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for &idx in graph.outgoing(&current) {
            by_receiver
                .entry(graph.tx(idx).receiver())
                .or_default()
                .push(idx);
        }

        for (receiver, candidates) in &by_receiver {
            if path.iter().any(|p| p.as_str() == *receiver) {
                continue;
            }
            let Some(chosen) = select_edge(graph, candidates, stats.as_ref(), prev_ts, &limits)
            else {
                continue;
            };
            let tx = graph.tx(chosen);
            let next = match stats {
                Some(s) => s.extended(tx.amount(), tx.timestamp()),
                None => PathStats::for_edge(tx.amount(), tx.timestamp()),
            };

            path.push(receiver.to_string());
            edges.push(chosen);
            self.dfs(graph, path, edges, Some(next), sink);
            edges.pop();
            path.pop();
        }
    }

    fn try_accept(
        &self,
        graph: &TransactionGraph,
        path: &[String],
        edges: &[usize],
        stats: &PathStats,
        sink: &mut ShellSink,
    ) {
        let Some(tail) = path.last() else {
            return;
        };
        // The chain must end where the money stops.
        if !graph.outgoing(tail).is_empty() {
            return;
        }
        if !self.intermediates_unbranched(graph, path, stats) {
            return;
        }

        let intermediates = &path[1..path.len() - 1];
        let degree_sum: usize = intermediates
            .iter()
            .map(|v| graph.total_degree(v))
            .sum();
        let tightness = if intermediates.is_empty() {
            1.0
        } else {
            (intermediates.len() as f64 / degree_sum as f64).clamp(0.0, 1.0)
        };

        let ring = Ring::new(
            PatternType::Shell,
            path.to_vec(),
            edges.to_vec(),
            RingEvidence::Shell {
                length: path.len(),
                time_span_hours: stats.span_hours(),
                amount_ratio: stats.amount_ratio(),
                tightness,
            },
        );
        sink.admit(ring, stats.amount_ratio());
    }

    /// Every intermediate's outgoing transfers inside the chain window must
    /// target its successor in the chain.
    fn intermediates_unbranched(
        &self,
        graph: &TransactionGraph,
        path: &[String],
        stats: &PathStats,
    ) -> bool {
        for i in 1..path.len().saturating_sub(1) {
            let successor = &path[i + 1];
            for &idx in graph.outgoing(&path[i]) {
                let tx = graph.tx(idx);
                let ts = tx.timestamp();
                if ts >= stats.first_ts && ts <= stats.last_ts && tx.receiver() != successor.as_str()
                {
                    return false;
                }
            }
        }
        true
    }
}

impl ShellSink {
    /// Record a chain; a re-encounter of the same vertex tuple keeps the
    /// candidate with the smaller amount ratio.
    fn admit(&mut self, ring: Ring, ratio: f64) {
        match self.index_by_members.get(&ring.members) {
            None => {
                self.index_by_members
                    .insert(ring.members.clone(), self.rings.len());
                self.rings.push(ring);
                self.ratios.push(ratio);
            }
            Some(&at) => {
                if ratio < self.ratios[at] {
                    self.rings[at] = ring;
                    self.ratios[at] = ratio;
                }
            }
        }
    }
}

/// Drop chains that appear as a contiguous subsequence of a longer chain.
fn suppress_subchains(rings: Vec<Ring>) -> Vec<Ring> {
    let members: Vec<Vec<String>> = rings.iter().map(|r| r.members.clone()).collect();
    rings
        .into_iter()
        .enumerate()
        .filter(|(i, ring)| {
            !members.iter().enumerate().any(|(j, longer)| {
                j != *i
                    && longer.len() > ring.members.len()
                    && longer
                        .windows(ring.members.len())
                        .any(|w| w == ring.members.as_slice())
            })
        })
        .map(|(_, ring)| ring)
        .collect()
}
