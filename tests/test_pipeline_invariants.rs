//! Pipeline invariants
//!
//! Universal properties of every analysis result: summary counts, output
//! ordering, ring-id referential integrity, member-count bounds per
//! pattern, determinism, and flag-threshold monotonicity.

use mule_detection_core_rs::{
    AnalysisResult, AnalyzeRequest, DetectionConfig, PatternType, Pipeline,
};

// ============================================================================
// Test Helpers
// ============================================================================

const HEADER: &str = "transaction_id,sender_id,receiver_id,amount,timestamp";

fn csv_of(rows: &[String]) -> String {
    let mut csv = String::from(HEADER);
    for row in rows {
        csv.push('\n');
        csv.push_str(row);
    }
    csv
}

fn analyze_with(csv: &str, config: DetectionConfig) -> AnalysisResult {
    Pipeline::new(config)
        .unwrap()
        .analyze(&AnalyzeRequest::new(csv.as_bytes().to_vec()))
        .unwrap()
        .result
}

fn analyze(csv: &str) -> AnalysisResult {
    analyze_with(csv, DetectionConfig::default())
}

/// A busy fixture: one cycle, one smurf hub, one shell chain, and one
/// velocity-only account.
fn mixed_fixture() -> String {
    let mut rows = vec![
        // cycle A→B→C→A
        "CYC1,A,B,100,2025-01-01T10:00:00".to_string(),
        "CYC2,B,C,101,2025-01-01T11:00:00".to_string(),
        "CYC3,C,A,102,2025-01-01T12:00:00".to_string(),
        // shell chain S1→S2→S3→S4
        "SHL1,S1,S2,500,2025-01-02T10:00:00".to_string(),
        "SHL2,S2,S3,500,2025-01-02T11:00:00".to_string(),
        "SHL3,S3,S4,500,2025-01-02T12:00:00".to_string(),
    ];
    // smurf hub: 12 distinct recipients in 2 hours
    for i in 0..12 {
        rows.push(format!("SMR{i},HUB,M{i:02},250,2025-01-03T10:{i:02}:00"));
    }
    // velocity-only: V trades with W 7 times in one hour, back and forth
    // (degree stays high enough to avoid shell corridors)
    for i in 0..7 {
        let (from, to) = if i % 2 == 0 { ("V", "W") } else { ("W", "V") };
        rows.push(format!("VEL{i},{from},{to},10,2025-01-04T10:{i:02}:00"));
    }
    csv_of(&rows)
}

// ============================================================================
// Summary counts (invariants 1-2)
// ============================================================================

#[test]
fn test_summary_counts_match_listings() {
    let result = analyze(&mixed_fixture());

    // 3 cycle + 13 smurf + 4 shell + V + W
    assert_eq!(result.summary.total_accounts_analyzed, 22);
    assert_eq!(
        result.summary.suspicious_accounts_flagged,
        result.suspicious_accounts.len()
    );
    assert_eq!(result.summary.fraud_rings_detected, result.fraud_rings.len());
    assert!(result.summary.processing_time_seconds >= 0.0);
}

// ============================================================================
// Output ordering (invariant 3)
// ============================================================================

#[test]
fn test_output_ordering() {
    let result = analyze(&mixed_fixture());

    for pair in result.suspicious_accounts.windows(2) {
        let ordered = pair[0].suspicion_score > pair[1].suspicion_score
            || (pair[0].suspicion_score == pair[1].suspicion_score
                && pair[0].account_id < pair[1].account_id);
        assert!(ordered, "findings out of order: {pair:?}");
    }

    for pair in result.fraud_rings.windows(2) {
        let ordered = pair[0].risk_score > pair[1].risk_score
            || (pair[0].risk_score == pair[1].risk_score && pair[0].ring_id < pair[1].ring_id);
        assert!(ordered, "rings out of order: {pair:?}");
    }
}

// ============================================================================
// Referential integrity and member bounds (invariants 4-5)
// ============================================================================

#[test]
fn test_finding_ring_ids_exist() {
    let result = analyze(&mixed_fixture());
    let ring_ids: Vec<&str> = result.fraud_rings.iter().map(|r| r.ring_id.as_str()).collect();

    for finding in &result.suspicious_accounts {
        if let Some(ring_id) = &finding.ring_id {
            assert!(ring_ids.contains(&ring_id.as_str()), "dangling {ring_id}");
        }
    }
}

#[test]
fn test_ring_member_count_bounds() {
    let result = analyze(&mixed_fixture());
    assert!(result.fraud_rings.len() >= 3);

    for ring in &result.fraud_rings {
        let n = ring.member_accounts.len();
        match ring.pattern_type {
            PatternType::Cycle => assert!((3..=5).contains(&n), "cycle size {n}"),
            PatternType::Shell => assert!((3..=8).contains(&n), "shell size {n}"),
            PatternType::Smurfing => assert!(n >= 11, "smurf size {n}"),
        }
    }
}

// ============================================================================
// Determinism (invariants 8-9)
// ============================================================================

#[test]
fn test_identical_input_identical_output() {
    let csv = mixed_fixture();
    let mut first = analyze(&csv);
    let mut second = analyze(&csv);

    // wall time is the one intentionally non-deterministic field
    first.summary.processing_time_seconds = 0.0;
    second.summary.processing_time_seconds = 0.0;

    let a = serde_json::to_string(&first).unwrap();
    let b = serde_json::to_string(&second).unwrap();
    assert_eq!(a, b);
}

// ============================================================================
// Flag-threshold monotonicity (invariant 10)
// ============================================================================

#[test]
fn test_flag_threshold_monotonicity() {
    let csv = mixed_fixture();

    let default_flagged = analyze(&csv).suspicious_accounts.len();

    let lowered = analyze_with(
        &csv,
        DetectionConfig {
            flag_threshold: 1,
            ..Default::default()
        },
    )
    .suspicious_accounts
    .len();

    let raised = analyze_with(
        &csv,
        DetectionConfig {
            flag_threshold: 100,
            ..Default::default()
        },
    );

    assert!(lowered >= default_flagged);
    // ring members survive any threshold
    assert!(raised.suspicious_accounts.len() <= default_flagged);
    for finding in &raised.suspicious_accounts {
        assert!(finding.ring_id.is_some());
    }

    // the velocity-only pair appears only at a low threshold
    let low = analyze_with(
        &csv,
        DetectionConfig {
            flag_threshold: 5,
            ..Default::default()
        },
    );
    assert!(low
        .suspicious_accounts
        .iter()
        .any(|f| f.account_id == "V" && f.ring_id.is_none()));
}

// ============================================================================
// Wire schema shape
// ============================================================================

#[test]
fn test_wire_json_shape() {
    let result = analyze(&mixed_fixture());
    let json = serde_json::to_value(&result).unwrap();

    assert!(json["suspicious_accounts"].is_array());
    assert!(json["fraud_rings"].is_array());
    let summary = &json["summary"];
    assert!(summary["total_accounts_analyzed"].is_u64());
    assert!(summary["suspicious_accounts_flagged"].is_u64());
    assert!(summary["fraud_rings_detected"].is_u64());
    assert!(summary["processing_time_seconds"].is_number());

    let account = &json["suspicious_accounts"][0];
    for key in ["account_id", "suspicion_score", "detected_patterns", "ring_id", "reasons"] {
        assert!(account.get(key).is_some(), "missing key {key}");
    }
    let ring = &json["fraud_rings"][0];
    for key in ["ring_id", "pattern_type", "member_accounts", "risk_score"] {
        assert!(ring.get(key).is_some(), "missing key {key}");
    }
}

#[test]
fn test_scores_within_bounds() {
    let result = analyze(&mixed_fixture());
    for finding in &result.suspicious_accounts {
        assert!(finding.suspicion_score <= 100);
        assert!(!finding.detected_patterns.is_empty() || finding.ring_id.is_none());
        assert!(!finding.reasons.is_empty());
    }
    for ring in &result.fraud_rings {
        assert!(ring.risk_score <= 100);
    }
}
