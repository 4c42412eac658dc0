//! Pattern detectors
//!
//! Three independent detectors consume the immutable [`TransactionGraph`]
//! and emit [`Ring`]s. They share the path bookkeeping below: a running
//! (amount, time) window over the edges chosen so far, and one rule for
//! picking among parallel edges between the same pair of accounts.
//!
//! # Determinism
//!
//! - Start vertices are visited in sorted account order
//! - Successors are grouped per receiver and visited in sorted order
//! - Parallel edges resolve to exactly one choice (ratio, then timestamp,
//!   then input position)

pub mod cycle;
pub mod shell;
pub mod smurf;

pub use cycle::CycleDetector;
pub use shell::ShellDetector;
pub use smurf::SmurfDetector;

use crate::models::graph::TransactionGraph;
use chrono::{DateTime, Duration, Utc};

/// Running window over a partial chain's chosen edges
#[derive(Debug, Clone, Copy)]
pub(crate) struct PathStats {
    pub min_amount: f64,
    pub max_amount: f64,
    pub first_ts: DateTime<Utc>,
    pub last_ts: DateTime<Utc>,
}

impl PathStats {
    pub fn for_edge(amount: f64, ts: DateTime<Utc>) -> Self {
        Self {
            min_amount: amount,
            max_amount: amount,
            first_ts: ts,
            last_ts: ts,
        }
    }

    pub fn extended(&self, amount: f64, ts: DateTime<Utc>) -> Self {
        Self {
            min_amount: self.min_amount.min(amount),
            max_amount: self.max_amount.max(amount),
            first_ts: self.first_ts.min(ts),
            last_ts: self.last_ts.max(ts),
        }
    }

    /// max/min amount ratio; infinite when the smallest amount is zero
    pub fn amount_ratio(&self) -> f64 {
        if self.min_amount <= 0.0 {
            f64::INFINITY
        } else {
            self.max_amount / self.min_amount
        }
    }

    /// Observed span in hours
    pub fn span_hours(&self) -> f64 {
        crate::core::time::span_hours(self.first_ts, self.last_ts)
    }
}

/// Constraints an edge must satisfy to extend a chain
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgeLimits {
    /// Tolerated backwards step from the previous edge's timestamp
    pub slack: Duration,
    /// Inclusive cap on the running max/min amount ratio
    pub ratio_cap: f64,
    /// Inclusive cap on the running span, hours
    pub span_cap_hours: f64,
    /// Minimum amount for any single edge
    pub min_edge_amount: f64,
}

/// Pick one edge among parallel candidates between the same account pair.
///
/// Admissible edges keep the running ratio and span within the limits and
/// do not step backwards in time beyond the slack. Among admissible edges
/// the choice minimizes the resulting ratio, then the edge timestamp, then
/// the input position.
pub(crate) fn select_edge(
    graph: &TransactionGraph,
    candidates: &[usize],
    stats: Option<&PathStats>,
    prev_ts: Option<DateTime<Utc>>,
    limits: &EdgeLimits,
) -> Option<usize> {
    let mut best: Option<(f64, DateTime<Utc>, usize)> = None;

    for &idx in candidates {
        let tx = graph.tx(idx);
        let amount = tx.amount();
        let ts = tx.timestamp();

        if amount < limits.min_edge_amount {
            continue;
        }
        if let Some(prev) = prev_ts {
            if ts < prev - limits.slack {
                continue;
            }
        }

        let next = match stats {
            Some(s) => s.extended(amount, ts),
            None => PathStats::for_edge(amount, ts),
        };
        if next.amount_ratio() > limits.ratio_cap || next.span_hours() > limits.span_cap_hours {
            continue;
        }

        let key = (next.amount_ratio(), ts, idx);
        let better = match &best {
            None => true,
            Some((ratio, best_ts, best_idx)) => {
                match key.0.total_cmp(ratio) {
                    std::cmp::Ordering::Less => true,
                    std::cmp::Ordering::Greater => false,
                    std::cmp::Ordering::Equal => (ts, idx) < (*best_ts, *best_idx),
                }
            }
        };
        if better {
            best = Some(key);
        }
    }

    best.map(|(_, _, idx)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::parse_timestamp;
    use crate::models::transaction::Transaction;

    fn tx(id: &str, sender: &str, receiver: &str, amount: f64, ts: &str) -> Transaction {
        Transaction::new(
            id.to_string(),
            sender.to_string(),
            receiver.to_string(),
            amount,
            parse_timestamp(ts).unwrap(),
        )
    }

    fn limits() -> EdgeLimits {
        EdgeLimits {
            slack: Duration::seconds(60),
            ratio_cap: 1.25,
            span_cap_hours: 72.0,
            min_edge_amount: 0.0,
        }
    }

    #[test]
    fn test_select_edge_prefers_smaller_ratio() {
        let graph = TransactionGraph::build(vec![
            tx("T1", "A", "B", 200.0, "2025-01-01 10:00:00"),
            tx("T2", "A", "B", 101.0, "2025-01-01 11:00:00"),
        ]);
        let stats = PathStats::for_edge(100.0, parse_timestamp("2025-01-01 09:00:00").unwrap());
        // 200 would push the ratio to 2.0 (inadmissible); 101 keeps it at 1.01
        let chosen = select_edge(&graph, &[0, 1], Some(&stats), None, &limits()).unwrap();
        assert_eq!(graph.tx(chosen).id(), "T2");
    }

    #[test]
    fn test_select_edge_tie_breaks_on_time() {
        let graph = TransactionGraph::build(vec![
            tx("T1", "A", "B", 100.0, "2025-01-01 12:00:00"),
            tx("T2", "A", "B", 100.0, "2025-01-01 10:00:00"),
        ]);
        let chosen = select_edge(&graph, &[0, 1], None, None, &limits()).unwrap();
        assert_eq!(graph.tx(chosen).id(), "T2");
    }

    #[test]
    fn test_select_edge_respects_slack() {
        let graph = TransactionGraph::build(vec![
            tx("T1", "A", "B", 100.0, "2025-01-01 09:30:00"),
        ]);
        let prev = parse_timestamp("2025-01-01 10:00:00").unwrap();
        assert!(select_edge(&graph, &[0], None, Some(prev), &limits()).is_none());

        // 30 seconds backwards is inside the one-minute slack
        let prev_close = parse_timestamp("2025-01-01 09:30:30").unwrap();
        assert!(select_edge(&graph, &[0], None, Some(prev_close), &limits()).is_some());
    }

    #[test]
    fn test_select_edge_min_amount() {
        let graph = TransactionGraph::build(vec![
            tx("T1", "A", "B", 50.0, "2025-01-01 10:00:00"),
        ]);
        let mut l = limits();
        l.min_edge_amount = 100.0;
        assert!(select_edge(&graph, &[0], None, None, &l).is_none());
    }

    #[test]
    fn test_zero_amount_ratio_is_infinite() {
        let stats = PathStats::for_edge(0.0, parse_timestamp("2025-01-01 10:00:00").unwrap());
        assert!(stats.amount_ratio().is_infinite());
    }
}
