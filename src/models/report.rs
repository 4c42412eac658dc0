//! Analysis result types
//!
//! The wire JSON schema is fixed for downstream consumers: field names and
//! nesting here must not change. Everything is serialized with `serde_json`
//! by the host layer; the engine only fills the structures.

use crate::models::ring::PatternType;
use serde::{Deserialize, Serialize};

/// One flagged account with explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountFinding {
    /// Account id
    pub account_id: String,

    /// Final suspicion score, 0..=100
    pub suspicion_score: u32,

    /// Sorted distinct pattern labels the account participates in
    pub detected_patterns: Vec<String>,

    /// Highest-risk ring the account belongs to (ties broken by ring id),
    /// `null` for accounts flagged on score alone
    pub ring_id: Option<String>,

    /// Human-readable contributing signals
    pub reasons: Vec<String>,
}

/// One detected ring in wire form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingReport {
    /// Stable ring id, `RING_{CYC|SMR|SHL}_{NNNN}`
    pub ring_id: String,

    /// Pattern family
    pub pattern_type: PatternType,

    /// Members in the ring's canonical order
    pub member_accounts: Vec<String>,

    /// Ring risk score, 0..=100
    pub risk_score: u32,
}

/// Batch-level counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Distinct accounts in the graph
    pub total_accounts_analyzed: usize,

    /// Number of entries in `suspicious_accounts`
    pub suspicious_accounts_flagged: usize,

    /// Number of entries in `fraud_rings`
    pub fraud_rings_detected: usize,

    /// Wall-clock analysis time, rounded to 4 decimals
    pub processing_time_seconds: f64,
}

/// Complete analysis result (the fixed wire schema)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Sorted by (-score, account_id)
    pub suspicious_accounts: Vec<AccountFinding>,

    /// Sorted by (-risk_score, ring_id)
    pub fraud_rings: Vec<RingReport>,

    /// Batch counters
    pub summary: AnalysisSummary,
}

/// Pipeline output: the wire result plus non-fatal ingest diagnostics.
///
/// Diagnostics are deliberately outside [`AnalysisResult`] so the wire
/// schema stays fixed; hosts that want them serialize this struct instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// The fixed-schema result
    pub result: AnalysisResult,

    /// Malformed-row counts from ingest
    pub diagnostics: crate::ingest::IngestDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_id_null_serialization() {
        let finding = AccountFinding {
            account_id: "ACC_1".to_string(),
            suspicion_score: 30,
            detected_patterns: vec![],
            ring_id: None,
            reasons: vec!["high velocity".to_string()],
        };
        let json = serde_json::to_value(&finding).unwrap();
        assert!(json["ring_id"].is_null());
        assert_eq!(json["suspicion_score"], 30);
    }

    #[test]
    fn test_wire_field_names() {
        let report = RingReport {
            ring_id: "RING_CYC_0001".to_string(),
            pattern_type: PatternType::Cycle,
            member_accounts: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            risk_score: 54,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["pattern_type"], "cycle");
        assert_eq!(json["member_accounts"][0], "A");
        assert_eq!(json["risk_score"], 54);
    }
}
