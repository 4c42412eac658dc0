//! Transaction graph
//!
//! Directed multigraph over account ids: every transaction contributes one
//! edge sender → receiver. Built once per analysis, read-only afterwards.
//!
//! # Determinism
//!
//! - Adjacency lists preserve input (insertion) order
//! - Account-keyed maps are `BTreeMap`, so account iteration is sorted
//! - Construction is a single O(T) pass

use crate::models::transaction::Transaction;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Per-account aggregate statistics
///
/// Computed in the same pass that builds adjacency. Degree counts always
/// equal the corresponding adjacency lengths, and the counterparty sets are
/// cached here so detectors never recompute them.
#[derive(Debug, Clone)]
pub struct AccountAggregate {
    /// Number of incoming edges
    pub in_degree: usize,
    /// Number of outgoing edges
    pub out_degree: usize,
    /// Sum of incoming amounts
    pub total_in_amount: f64,
    /// Sum of outgoing amounts
    pub total_out_amount: f64,
    /// Distinct accounts that sent to this one
    pub in_counterparties: BTreeSet<String>,
    /// Distinct accounts this one sent to
    pub out_counterparties: BTreeSet<String>,
    /// Earliest transaction instant touching this account
    pub first_seen: DateTime<Utc>,
    /// Latest transaction instant touching this account
    pub last_seen: DateTime<Utc>,
}

impl AccountAggregate {
    fn new(seen_at: DateTime<Utc>) -> Self {
        Self {
            in_degree: 0,
            out_degree: 0,
            total_in_amount: 0.0,
            total_out_amount: 0.0,
            in_counterparties: BTreeSet::new(),
            out_counterparties: BTreeSet::new(),
            first_seen: seen_at,
            last_seen: seen_at,
        }
    }

    fn touch(&mut self, seen_at: DateTime<Utc>) {
        if seen_at < self.first_seen {
            self.first_seen = seen_at;
        }
        if seen_at > self.last_seen {
            self.last_seen = seen_at;
        }
    }

    /// Total degree (in + out)
    pub fn total_degree(&self) -> usize {
        self.in_degree + self.out_degree
    }

    /// Distinct incoming counterparty count
    pub fn distinct_in_counterparties(&self) -> usize {
        self.in_counterparties.len()
    }

    /// Distinct outgoing counterparty count
    pub fn distinct_out_counterparties(&self) -> usize {
        self.out_counterparties.len()
    }

    /// Union of incoming and outgoing counterparties, excluding `account`
    /// itself (self-transfers do not make an account its own neighbor).
    pub fn neighbors(&self, account: &str) -> BTreeSet<String> {
        let mut all: BTreeSet<String> = self.in_counterparties.clone();
        all.extend(self.out_counterparties.iter().cloned());
        all.remove(account);
        all
    }
}

/// Immutable transaction graph shared by all detectors
///
/// Edges are stored as indices into the owned transaction list; adjacency
/// lists keep input order so that path enumeration is deterministic.
#[derive(Debug, Clone)]
pub struct TransactionGraph {
    /// All transactions, input order preserved
    transactions: Vec<Transaction>,

    /// Sender → outgoing transaction indices (insertion order)
    outgoing: BTreeMap<String, Vec<usize>>,

    /// Receiver → incoming transaction indices (insertion order)
    incoming: BTreeMap<String, Vec<usize>>,

    /// Account → aggregate statistics
    aggregates: BTreeMap<String, AccountAggregate>,
}

impl TransactionGraph {
    /// Build the graph in one pass over the transaction list.
    pub fn build(transactions: Vec<Transaction>) -> Self {
        let mut outgoing: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut incoming: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut aggregates: BTreeMap<String, AccountAggregate> = BTreeMap::new();

        for (idx, tx) in transactions.iter().enumerate() {
            outgoing.entry(tx.sender().to_string()).or_default().push(idx);
            incoming.entry(tx.receiver().to_string()).or_default().push(idx);

            let sender = aggregates
                .entry(tx.sender().to_string())
                .or_insert_with(|| AccountAggregate::new(tx.timestamp()));
            sender.out_degree += 1;
            sender.total_out_amount += tx.amount();
            sender.out_counterparties.insert(tx.receiver().to_string());
            sender.touch(tx.timestamp());

            let receiver = aggregates
                .entry(tx.receiver().to_string())
                .or_insert_with(|| AccountAggregate::new(tx.timestamp()));
            receiver.in_degree += 1;
            receiver.total_in_amount += tx.amount();
            receiver.in_counterparties.insert(tx.sender().to_string());
            receiver.touch(tx.timestamp());
        }

        Self {
            transactions,
            outgoing,
            incoming,
            aggregates,
        }
    }

    /// Number of distinct accounts
    pub fn account_count(&self) -> usize {
        self.aggregates.len()
    }

    /// Number of edges (= transactions)
    pub fn edge_count(&self) -> usize {
        self.transactions.len()
    }

    /// Iterate account ids in sorted order
    pub fn accounts(&self) -> impl Iterator<Item = &str> {
        self.aggregates.keys().map(|s| s.as_str())
    }

    /// Look up a transaction by edge index
    pub fn tx(&self, idx: usize) -> &Transaction {
        &self.transactions[idx]
    }

    /// All transactions in input order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Outgoing edge indices for an account (insertion order)
    pub fn outgoing(&self, account: &str) -> &[usize] {
        self.outgoing.get(account).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming edge indices for an account (insertion order)
    pub fn incoming(&self, account: &str) -> &[usize] {
        self.incoming.get(account).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Aggregate statistics for an account
    pub fn aggregate(&self, account: &str) -> Option<&AccountAggregate> {
        self.aggregates.get(account)
    }

    /// Total degree of an account (0 for unknown accounts)
    pub fn total_degree(&self, account: &str) -> usize {
        self.aggregates
            .get(account)
            .map(AccountAggregate::total_degree)
            .unwrap_or(0)
    }

    /// Edge indices touching an account: outgoing then incoming, with
    /// self-transfers deduplicated. Order is stable for a given input.
    pub fn touching(&self, account: &str) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .outgoing(account)
            .iter()
            .chain(self.incoming(account).iter())
            .copied()
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
