//! CSV ingestion
//!
//! Validates the header, parses rows into [`Transaction`]s, and enforces
//! the batch cap. Individual malformed rows are dropped and counted, never
//! fatal; schema problems, oversized batches, and empty batches abort the
//! whole invocation with a typed error.
//!
//! Required columns (case-insensitive, any order, extras ignored):
//! `transaction_id, sender_id, receiver_id, amount, timestamp`.

use crate::config::DetectionConfig;
use crate::core::time::parse_timestamp;
use crate::models::transaction::Transaction;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Columns every batch must carry
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "transaction_id",
    "sender_id",
    "receiver_id",
    "amount",
    "timestamp",
];

/// Fatal ingest errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// Header is missing one or more required columns
    #[error("missing required columns: {}", missing.join(", "))]
    Schema {
        /// Sorted missing column names
        missing: Vec<String>,
    },

    /// Batch exceeds the configured transaction cap
    #[error("transaction count exceeds maximum of {max}")]
    TooManyTransactions {
        /// The configured cap
        max: usize,
    },

    /// No valid rows survived filtering
    #[error("no valid transactions found in CSV")]
    EmptyBatch,

    /// Input bytes are not valid UTF-8
    #[error("CSV content is not valid UTF-8")]
    Encoding,
}

impl IngestError {
    /// Machine-stable error code
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Schema { .. } => "schema_error",
            IngestError::TooManyTransactions { .. } => "too_many_transactions",
            IngestError::EmptyBatch => "empty_batch",
            IngestError::Encoding => "encoding_error",
        }
    }
}

/// Per-reason counts of dropped rows
///
/// Never fatal; surfaced next to the result as a diagnostics block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestDiagnostics {
    /// Data rows seen (excluding the header)
    pub rows_seen: usize,
    /// Rows with fewer fields than the required columns span
    pub dropped_short_row: usize,
    /// Rows with a non-parseable or negative amount
    pub dropped_invalid_amount: usize,
    /// Rows with an unparseable timestamp
    pub dropped_invalid_timestamp: usize,
    /// Rows with an empty transaction, sender, or receiver id
    pub dropped_empty_field: usize,
}

impl IngestDiagnostics {
    /// Total rows dropped for any reason
    pub fn total_dropped(&self) -> usize {
        self.dropped_short_row
            + self.dropped_invalid_amount
            + self.dropped_invalid_timestamp
            + self.dropped_empty_field
    }
}

/// Successful ingest: transactions in input order plus drop counts
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Valid transactions, input order preserved
    pub transactions: Vec<Transaction>,
    /// Malformed-row counts
    pub diagnostics: IngestDiagnostics,
}

/// Column positions resolved from the header row
struct ColumnLayout {
    transaction_id: usize,
    sender_id: usize,
    receiver_id: usize,
    amount: usize,
    timestamp: usize,
}

impl ColumnLayout {
    /// Highest column index any required field occupies
    fn max_index(&self) -> usize {
        self.transaction_id
            .max(self.sender_id)
            .max(self.receiver_id)
            .max(self.amount)
            .max(self.timestamp)
    }
}

/// Parse raw CSV text into validated transactions.
///
/// The cap check is applied to valid rows only: exactly
/// `config.max_transactions` rows are accepted, one more aborts the batch.
pub fn parse_csv(content: &str, config: &DetectionConfig) -> Result<IngestOutcome, IngestError> {
    let content = content.trim_start_matches('\u{feff}');
    let mut lines = content.lines();

    let header_line = lines
        .next()
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.trim().is_empty())
        .ok_or(IngestError::Schema {
            missing: REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        })?;
    let layout = resolve_columns(header_line)?;

    let mut transactions = Vec::new();
    let mut diagnostics = IngestDiagnostics::default();

    for line in lines {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        diagnostics.rows_seen += 1;

        let fields = split_fields(line);
        if fields.len() < REQUIRED_COLUMNS.len() || fields.len() <= layout.max_index() {
            diagnostics.dropped_short_row += 1;
            continue;
        }

        let transaction_id = fields[layout.transaction_id].trim();
        let sender = fields[layout.sender_id].trim();
        let receiver = fields[layout.receiver_id].trim();
        if transaction_id.is_empty() || sender.is_empty() || receiver.is_empty() {
            diagnostics.dropped_empty_field += 1;
            continue;
        }

        let amount = match fields[layout.amount].trim().parse::<f64>() {
            Ok(value) if value >= 0.0 && value.is_finite() => value,
            _ => {
                diagnostics.dropped_invalid_amount += 1;
                continue;
            }
        };

        let timestamp = match parse_timestamp(&fields[layout.timestamp]) {
            Some(ts) => ts,
            None => {
                diagnostics.dropped_invalid_timestamp += 1;
                continue;
            }
        };

        if transactions.len() == config.max_transactions {
            return Err(IngestError::TooManyTransactions {
                max: config.max_transactions,
            });
        }

        transactions.push(Transaction::new(
            transaction_id.to_string(),
            sender.to_string(),
            receiver.to_string(),
            amount,
            timestamp,
        ));
    }

    if transactions.is_empty() {
        return Err(IngestError::EmptyBatch);
    }

    debug!(
        accepted = transactions.len(),
        dropped = diagnostics.total_dropped(),
        "csv ingest complete"
    );

    Ok(IngestOutcome {
        transactions,
        diagnostics,
    })
}

/// Resolve required column positions from the header row.
fn resolve_columns(header_line: &str) -> Result<ColumnLayout, IngestError> {
    let headers: Vec<String> = split_fields(header_line)
        .iter()
        .map(|h| h.trim().trim_matches('\u{feff}').to_ascii_lowercase())
        .collect();

    let position = |name: &str| headers.iter().position(|h| h.as_str() == name);

    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|&name| position(name).is_none())
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(IngestError::Schema { missing });
    }

    Ok(ColumnLayout {
        transaction_id: position("transaction_id").unwrap_or(0),
        sender_id: position("sender_id").unwrap_or(0),
        receiver_id: position("receiver_id").unwrap_or(0),
        amount: position("amount").unwrap_or(0),
        timestamp: position("timestamp").unwrap_or(0),
    })
}

/// Split one CSV line into fields, honoring double-quoted fields with
/// doubled-quote escapes. Unterminated quotes consume to end of line.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
