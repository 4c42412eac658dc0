//! Cycle detection (circular routing)
//!
//! Depth-limited DFS over forward edges, one run per start vertex in
//! sorted account order. A path closing back at its start with 3-5
//! vertices, a bounded amount ratio, and a bounded time span is a cycle.
//!
//! # Canonicalization
//!
//! The same vertex cycle is reachable from every rotation, and the
//! timestamp-slack constraint only holds along the rotation where the
//! money actually moved first. Each admitted path is therefore rotated so
//! the lexicographically smallest vertex leads (direction preserved, edges
//! rotated in step). Re-encounters of the same canonical tuple keep the
//! candidate whose first edge is earliest.

use crate::config::DetectionConfig;
use crate::detectors::{select_edge, EdgeLimits, PathStats};
use crate::models::graph::TransactionGraph;
use crate::models::ring::{PatternType, Ring, RingEvidence};
use crate::pipeline::CancelToken;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Detects directed simple cycles of bounded length
pub struct CycleDetector<'a> {
    config: &'a DetectionConfig,
}

/// Accumulates emitted cycles keyed by canonical vertex tuple
struct CycleSink {
    rings: Vec<Ring>,
    first_edge_ts: Vec<DateTime<Utc>>,
    index_by_members: BTreeMap<Vec<String>, usize>,
}

impl<'a> CycleDetector<'a> {
    pub fn new(config: &'a DetectionConfig) -> Self {
        Self { config }
    }

    /// Enumerate all admissible cycles.
    ///
    /// The cancel token is checked once per start vertex; a cancelled run
    /// returns early with whatever was found (the pipeline discards it).
    pub fn detect(&self, graph: &TransactionGraph, cancel: &CancelToken) -> Vec<Ring> {
        let mut sink = CycleSink {
            rings: Vec::new(),
            first_edge_ts: Vec::new(),
            index_by_members: BTreeMap::new(),
        };

        for start in graph.accounts() {
            if cancel.is_cancelled() {
                break;
            }
            if graph.outgoing(start).is_empty() {
                continue;
            }
            let mut path = vec![start.to_string()];
            let mut edges = Vec::new();
            self.dfs(graph, start, &mut path, &mut edges, None, &mut sink);
        }

        debug!(cycles = sink.rings.len(), "cycle detection complete");
        sink.rings
    }

    fn limits(&self) -> EdgeLimits {
        EdgeLimits {
            slack: self.config.timestamp_slack(),
            ratio_cap: self.config.cycle_amount_ratio,
            span_cap_hours: self.config.cycle_time_span_hours,
            min_edge_amount: 0.0,
        }
    }

    fn dfs(
        &self,
        graph: &TransactionGraph,
        start: &str,
        path: &mut Vec<String>,
        edges: &mut Vec<usize>,
        stats: Option<PathStats>,
        sink: &mut CycleSink,
    ) {
        let Some(current) = path.last().cloned() else {
            return;
        };
        let depth = path.len();
        let limits = self.limits();
        let prev_ts = edges.last().map(|&i| graph.tx(i).timestamp());

        // Group parallel edges per receiver; BTreeMap gives sorted visits.
        let mut by_receiver: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for &idx in graph.outgoing(&current) {
            by_receiver
                .entry(graph.tx(idx).receiver())
                .or_default()
                .push(idx);
        }

        for (receiver, candidates) in &by_receiver {
            if *receiver == start {
                if depth >= self.config.cycle_min_len && depth <= self.config.cycle_max_len {
                    if let Some(closing) =
                        select_edge(graph, candidates, stats.as_ref(), prev_ts, &limits)
                    {
                        let tx = graph.tx(closing);
                        let full = match stats {
                            Some(s) => s.extended(tx.amount(), tx.timestamp()),
                            None => PathStats::for_edge(tx.amount(), tx.timestamp()),
                        };
                        let mut tx_indices = edges.clone();
                        tx_indices.push(closing);
                        sink.admit(graph, path.clone(), tx_indices, &full);
                    }
                }
                continue;
            }

            if depth >= self.config.cycle_max_len {
                continue;
            }
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
            self.dfs(graph, start, path, edges, Some(next), sink);
            edges.pop();
            path.pop();
        }
    }
}

impl CycleSink {
    /// Rotate a path so the lexicographically smallest vertex leads, then
    /// record it, replacing an earlier emission of the same tuple only if
    /// this candidate's first edge is earlier.
    fn admit(
        &mut self,
        graph: &TransactionGraph,
        members: Vec<String>,
        tx_indices: Vec<usize>,
        stats: &PathStats,
    ) {
        let (members, tx_indices) = canonical_rotation(members, tx_indices);
        let first_edge = tx_indices
            .first()
            .map(|&i| graph.tx(i).timestamp())
            .unwrap_or(stats.first_ts);

        let ring = Ring::new(
            PatternType::Cycle,
            members.clone(),
            tx_indices,
            RingEvidence::Cycle {
                length: members.len(),
                time_span_hours: stats.span_hours(),
                amount_ratio: stats.amount_ratio(),
            },
        );

        match self.index_by_members.get(&members) {
            None => {
                self.index_by_members.insert(members, self.rings.len());
                self.rings.push(ring);
                self.first_edge_ts.push(first_edge);
            }
            Some(&at) => {
                if first_edge < self.first_edge_ts[at] {
                    self.rings[at] = ring;
                    self.first_edge_ts[at] = first_edge;
                }
            }
        }
    }
}

/// Rotate members so the smallest vertex is first, rotating the edge list
/// by the same offset (edge `i` stays the transfer `members[i] →
/// members[i+1 mod n]`).
fn canonical_rotation(members: Vec<String>, tx_indices: Vec<usize>) -> (Vec<String>, Vec<usize>) {
    let Some(min_pos) = members
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(i, _)| i)
    else {
        return (members, tx_indices);
    };
    if min_pos == 0 {
        return (members, tx_indices);
    }
    let mut rotated_members = members;
    let mut rotated_edges = tx_indices;
    rotated_members.rotate_left(min_pos);
    rotated_edges.rotate_left(min_pos);
    (rotated_members, rotated_edges)
}
