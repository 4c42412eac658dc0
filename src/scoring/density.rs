//! Anomaly density guard
//!
//! A flagged account sitting in a neighborhood where almost nobody else is
//! suspicious is more likely a false positive. For each candidate the
//! suspicious share of its counterparties is measured; below the threshold
//! the account's score is multiplied by 0.8.

use crate::config::DetectionConfig;
use crate::models::graph::TransactionGraph;
use std::collections::{BTreeMap, BTreeSet};

/// Multiplier applied below the density threshold
const DENSITY_MULTIPLIER: f64 = 0.8;

/// Computes per-account density adjustments
pub struct DensityGuard<'a> {
    config: &'a DetectionConfig,
}

impl<'a> DensityGuard<'a> {
    pub fn new(config: &'a DetectionConfig) -> Self {
        Self { config }
    }

    /// Adjustment per cohort account: 0.8 when the suspicious-neighbor
    /// ratio falls under the threshold, 1.0 otherwise. The cohort doubles
    /// as the suspicious set for the neighbor test.
    pub fn adjustments(
        &self,
        cohort: &BTreeSet<String>,
        graph: &TransactionGraph,
    ) -> BTreeMap<String, f64> {
        let mut adjustments = BTreeMap::new();

        for account in cohort {
            let neighbors = graph
                .aggregate(account)
                .map(|agg| agg.neighbors(account))
                .unwrap_or_default();

            let suspicious = neighbors.iter().filter(|n| cohort.contains(*n)).count();
            let ratio = suspicious as f64 / neighbors.len().max(1) as f64;

            let multiplier = if ratio < self.config.density_threshold {
                DENSITY_MULTIPLIER
            } else {
                1.0
            };
            adjustments.insert(account.clone(), multiplier);
        }

        adjustments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::parse_timestamp;
    use crate::models::transaction::Transaction;

    fn tx(id: &str, sender: &str, receiver: &str) -> Transaction {
        Transaction::new(
            id.to_string(),
            sender.to_string(),
            receiver.to_string(),
            100.0,
            parse_timestamp("2025-01-01 10:00:00").unwrap(),
        )
    }

    fn cohort(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_dense_neighborhood_unchanged() {
        // A's only neighbors are B and C, both suspicious
        let graph = TransactionGraph::build(vec![tx("T1", "A", "B"), tx("T2", "C", "A")]);
        let config = DetectionConfig::default();
        let adj = DensityGuard::new(&config).adjustments(&cohort(&["A", "B", "C"]), &graph);
        assert_eq!(adj["A"], 1.0);
    }

    #[test]
    fn test_sparse_neighborhood_dampened() {
        // A touches 4 accounts, only 1 of them suspicious: ratio 0.25 < 0.3
        let graph = TransactionGraph::build(vec![
            tx("T1", "A", "B"),
            tx("T2", "A", "C"),
            tx("T3", "A", "D"),
            tx("T4", "A", "E"),
        ]);
        let config = DetectionConfig::default();
        let adj = DensityGuard::new(&config).adjustments(&cohort(&["A", "B"]), &graph);
        assert_eq!(adj["A"], 0.8);
    }

    #[test]
    fn test_isolated_account_dampened() {
        let graph = TransactionGraph::build(vec![tx("T1", "X", "Y")]);
        let config = DetectionConfig::default();
        // Z has no edges at all; ratio is 0/1
        let adj = DensityGuard::new(&config).adjustments(&cohort(&["Z"]), &graph);
        assert_eq!(adj["Z"], 0.8);
    }

    #[test]
    fn test_threshold_boundary_inclusive_above() {
        // exactly 1 of 3 neighbors suspicious: ratio 0.333 >= 0.3 stays 1.0
        let graph = TransactionGraph::build(vec![
            tx("T1", "A", "B"),
            tx("T2", "A", "C"),
            tx("T3", "A", "D"),
        ]);
        let config = DetectionConfig::default();
        let adj = DensityGuard::new(&config).adjustments(&cohort(&["A", "B"]), &graph);
        assert_eq!(adj["A"], 1.0);
    }
}
