//! Transaction model
//!
//! One validated CSV row: a directed, timestamped, amount-bearing transfer
//! between two accounts. Immutable after ingest; the graph and every
//! detector borrow transactions, they never mutate or copy them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single validated transfer between two accounts
///
/// # Example
/// ```
/// use mule_detection_core_rs::Transaction;
/// use mule_detection_core_rs::core::time::parse_timestamp;
///
/// let tx = Transaction::new(
///     "TX1".to_string(),
///     "ACC_A".to_string(),
///     "ACC_B".to_string(),
///     250.0,
///     parse_timestamp("2025-01-01 10:00:00").unwrap(),
/// );
/// assert_eq!(tx.sender(), "ACC_A");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Identifier carried from the source CSV
    transaction_id: String,

    /// Sending account id
    sender: String,

    /// Receiving account id
    receiver: String,

    /// Transfer amount (non-negative; currency is opaque to the engine)
    amount: f64,

    /// Absolute instant of the transfer (UTC, second resolution sufficient)
    timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction from already-validated fields.
    ///
    /// Ingest is responsible for rejecting negative amounts and empty ids;
    /// this constructor only debug-asserts those preconditions.
    pub fn new(
        transaction_id: String,
        sender: String,
        receiver: String,
        amount: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        debug_assert!(amount >= 0.0, "amount must be non-negative");
        debug_assert!(!sender.is_empty() && !receiver.is_empty());
        Self {
            transaction_id,
            sender,
            receiver,
            amount,
            timestamp,
        }
    }

    /// Get the transaction id
    pub fn id(&self) -> &str {
        &self.transaction_id
    }

    /// Get the sending account id
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Get the receiving account id
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// Get the transfer amount
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Get the transfer instant
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The account on the other end from `account`.
    ///
    /// For a self-transfer both ends are `account` and the counterparty is
    /// `account` itself.
    pub fn counterparty<'a>(&'a self, account: &str) -> &'a str {
        if self.sender == account {
            &self.receiver
        } else {
            &self.sender
        }
    }
}
