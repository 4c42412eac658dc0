//! Suspicion scoring and ring assembly
//!
//! Pipeline:
//! 1. Assign ring ids (independent counter per pattern, emission order)
//! 2. Map accounts to pattern flags and ring memberships
//! 3. Base weights + interaction bonuses + high-velocity bonus
//! 4. Structural confidence multiplier (max over the account's rings)
//! 5. Density adjustment
//! 6. Percentile normalization over the suspicious cohort
//! 7. Flagging, ring risk scores, deterministic ordering

use crate::config::DetectionConfig;
use crate::models::graph::TransactionGraph;
use crate::models::report::{AccountFinding, RingReport};
use crate::models::ring::{PatternType, Ring, RingEvidence};
use crate::scoring::density::DensityGuard;
use chrono::Duration;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

// Base weights
const WEIGHT_CYCLE: f64 = 40.0;
const WEIGHT_SMURF: f64 = 30.0;
const WEIGHT_SHELL: f64 = 25.0;
const WEIGHT_VELOCITY: f64 = 10.0;

// Interaction bonuses
const BONUS_MULTI_PATTERN: f64 = 10.0;
const BONUS_CYCLE_SMURF: f64 = 10.0;
const BONUS_CYCLE_SHELL: f64 = 8.0;

// Percentile normalization band
const PCT_BASE: f64 = 0.85;
const PCT_RANGE: f64 = 0.30;

/// Combines detector output into ranked findings and ring reports
pub struct ScoringEngine<'a> {
    config: &'a DetectionConfig,
}

/// Per-account pattern participation
#[derive(Debug, Clone, Copy, Default)]
struct PatternFlags {
    cycle: bool,
    smurf: bool,
    shell: bool,
}

impl<'a> ScoringEngine<'a> {
    pub fn new(config: &'a DetectionConfig) -> Self {
        Self { config }
    }

    /// Score all accounts and assemble the sorted output listings.
    ///
    /// Rings must already carry structural confidence.
    pub fn run(
        &self,
        graph: &TransactionGraph,
        rings: &[Ring],
    ) -> (Vec<AccountFinding>, Vec<RingReport>) {
        let ring_ids = assign_ring_ids(rings);

        // Account → flags / memberships / best smurf dampening
        let mut flags: BTreeMap<String, PatternFlags> = BTreeMap::new();
        let mut memberships: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut smurf_dampening: BTreeMap<String, f64> = BTreeMap::new();

        for (ring_idx, ring) in rings.iter().enumerate() {
            for member in &ring.members {
                let entry = flags.entry(member.clone()).or_default();
                match ring.pattern {
                    PatternType::Cycle => entry.cycle = true,
                    PatternType::Smurfing => entry.smurf = true,
                    PatternType::Shell => entry.shell = true,
                }
                memberships.entry(member.clone()).or_default().push(ring_idx);

                if let RingEvidence::Smurfing { dampening, .. } = ring.evidence {
                    let best = smurf_dampening.entry(member.clone()).or_insert(0.0);
                    if dampening > *best {
                        *best = dampening;
                    }
                }
            }
        }

        let velocity = self.velocity_accounts(graph);

        // Cohort: every account with a non-zero raw score
        let mut cohort: BTreeSet<String> = flags.keys().cloned().collect();
        cohort.extend(velocity.iter().cloned());

        if cohort.is_empty() {
            return (Vec::new(), Vec::new());
        }

        // Raw scores
        let mut raw: BTreeMap<String, f64> = BTreeMap::new();
        for account in &cohort {
            let f = flags.get(account).copied().unwrap_or_default();
            let mut score = 0.0;
            if f.cycle {
                score += WEIGHT_CYCLE;
            }
            if f.smurf {
                score += WEIGHT_SMURF * smurf_dampening.get(account).copied().unwrap_or(1.0);
            }
            if f.shell {
                score += WEIGHT_SHELL;
            }
            if velocity.contains(account) {
                score += WEIGHT_VELOCITY;
            }
            score += interaction_bonus(f.cycle, f.smurf, f.shell);
            raw.insert(account.clone(), score);
        }

        // Confidence multiplier: max ring confidence per account
        let density = DensityGuard::new(self.config).adjustments(&cohort, graph);
        let mut pre_norm: BTreeMap<String, f64> = BTreeMap::new();
        for account in &cohort {
            let conf = memberships
                .get(account)
                .map(|indices| {
                    indices
                        .iter()
                        .map(|&i| rings[i].structural_confidence)
                        .fold(0.0, f64::max)
                })
                .unwrap_or(0.0);
            let conf_mult = 0.8 + 0.4 * conf;
            let density_mult = density.get(account).copied().unwrap_or(1.0);
            pre_norm.insert(account.clone(), raw[account] * conf_mult * density_mult);
        }

        // Percentile normalization over the cohort
        let mut sorted_scores: Vec<f64> = pre_norm.values().copied().collect();
        sorted_scores.sort_by(f64::total_cmp);
        let n = sorted_scores.len();

        let mut final_scores: BTreeMap<String, u32> = BTreeMap::new();
        for account in &cohort {
            let score = pre_norm[account];
            let rank = sorted_scores.partition_point(|s| s.total_cmp(&score).is_le());
            let percentile = rank as f64 / n as f64;
            let multiplier = (PCT_BASE + PCT_RANGE * percentile).clamp(0.85, 1.15);
            let final_score = (score * multiplier).round().min(100.0) as u32;
            final_scores.insert(account.clone(), final_score);
        }

        // Ring risk scores from member final scores
        let ring_risk: Vec<u32> = rings
            .iter()
            .map(|ring| {
                let sum: u32 = ring
                    .members
                    .iter()
                    .map(|m| final_scores.get(m).copied().unwrap_or(0))
                    .sum();
                let mean = sum as f64 / ring.members.len().max(1) as f64;
                let risk = mean * (0.7 + 0.3 * ring.structural_confidence);
                risk.round().min(100.0) as u32
            })
            .collect();

        // Findings for flagged accounts
        let mut findings = Vec::new();
        for account in &cohort {
            let in_ring = memberships.contains_key(account);
            let final_score = final_scores[account];
            if !in_ring && final_score < self.config.flag_threshold {
                continue;
            }

            let f = flags.get(account).copied().unwrap_or_default();
            let mut patterns: Vec<String> = Vec::new();
            if f.cycle {
                patterns.push(PatternType::Cycle.label().to_string());
            }
            if f.smurf {
                patterns.push(PatternType::Smurfing.label().to_string());
            }
            if f.shell {
                patterns.push(PatternType::Shell.label().to_string());
            }
            patterns.sort();

            // Highest-risk ring wins; ties fall to the smaller ring id
            let ring_id = memberships.get(account).and_then(|indices| {
                indices
                    .iter()
                    .map(|&i| (std::cmp::Reverse(ring_risk[i]), ring_ids[i].clone()))
                    .min()
                    .map(|(_, id)| id)
            });

            let reasons = self.build_reasons(
                account,
                &f,
                rings,
                memberships.get(account).map(Vec::as_slice).unwrap_or(&[]),
                velocity.contains(account),
                density.get(account).copied().unwrap_or(1.0),
            );

            findings.push(AccountFinding {
                account_id: account.clone(),
                suspicion_score: final_score,
                detected_patterns: patterns,
                ring_id,
                reasons,
            });
        }

        findings.sort_by(|a, b| {
            b.suspicion_score
                .cmp(&a.suspicion_score)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });

        let mut reports: Vec<RingReport> = rings
            .iter()
            .enumerate()
            .map(|(i, ring)| RingReport {
                ring_id: ring_ids[i].clone(),
                pattern_type: ring.pattern,
                member_accounts: ring.members.clone(),
                risk_score: ring_risk[i],
            })
            .collect();
        reports.sort_by(|a, b| {
            b.risk_score
                .cmp(&a.risk_score)
                .then_with(|| a.ring_id.cmp(&b.ring_id))
        });

        debug!(
            flagged = findings.len(),
            rings = reports.len(),
            "scoring complete"
        );
        (findings, reports)
    }

    /// Accounts touched by more than the configured number of transactions
    /// inside any rolling velocity window.
    pub fn velocity_accounts(&self, graph: &TransactionGraph) -> BTreeSet<String> {
        let window =
            Duration::milliseconds((self.config.velocity_window_hours * 3_600_000.0) as i64);
        let mut accounts = BTreeSet::new();

        for account in graph.accounts() {
            let touching = graph.touching(account);
            if touching.len() <= self.config.velocity_min_transactions {
                continue;
            }
            let mut times: Vec<_> = touching.iter().map(|&i| graph.tx(i).timestamp()).collect();
            times.sort_unstable();

            let mut right = 0;
            for left in 0..times.len() {
                while right < times.len() && times[right] - times[left] <= window {
                    right += 1;
                }
                if right - left > self.config.velocity_min_transactions {
                    accounts.insert(account.to_string());
                    break;
                }
            }
        }

        accounts
    }

    fn build_reasons(
        &self,
        account: &str,
        flags: &PatternFlags,
        rings: &[Ring],
        membership: &[usize],
        high_velocity: bool,
        density_mult: f64,
    ) -> Vec<String> {
        let mut reasons = Vec::new();

        if flags.cycle {
            let count = membership
                .iter()
                .filter(|&&i| rings[i].pattern == PatternType::Cycle)
                .count();
            reasons.push(format!("member of {count} circular transfer cycle(s)"));
        }

        if flags.smurf {
            let hub_peak = membership
                .iter()
                .filter(|&&i| rings[i].pattern == PatternType::Smurfing)
                .filter(|&&i| rings[i].members.first().map(String::as_str) == Some(account))
                .filter_map(|&i| match rings[i].evidence {
                    RingEvidence::Smurfing {
                        peak_counterparties,
                        ..
                    } => Some(peak_counterparties),
                    _ => None,
                })
                .max();
            match hub_peak {
                Some(peak) => reasons.push(format!(
                    "transacted with {peak} distinct counterparties within a {}h window",
                    self.config.smurf_window_hours
                )),
                None => reasons.push("counterparty of a structuring hub".to_string()),
            }
        }

        if flags.shell {
            let count = membership
                .iter()
                .filter(|&&i| rings[i].pattern == PatternType::Shell)
                .count();
            reasons.push(format!("member of {count} layered shell chain(s)"));
        }

        if high_velocity {
            reasons.push(format!(
                "more than {} transactions within a rolling {}h window",
                self.config.velocity_min_transactions, self.config.velocity_window_hours
            ));
        }

        if density_mult < 1.0 {
            reasons.push("score dampened: sparse suspicious neighborhood".to_string());
        }

        reasons
    }
}

/// Ring ids per pattern: `RING_{CYC|SMR|SHL}_{NNNN}`, counters independent
/// per pattern, assigned in emission order.
fn assign_ring_ids(rings: &[Ring]) -> Vec<String> {
    let mut counters: BTreeMap<&'static str, usize> = BTreeMap::new();
    rings
        .iter()
        .map(|ring| {
            let prefix = ring.pattern.ring_prefix();
            let counter = counters.entry(prefix).or_insert(0);
            *counter += 1;
            format!("RING_{prefix}_{counter:04}")
        })
        .collect()
}

/// Bonus for multi-pattern accounts: +10 once for any two distinct
/// patterns, plus +10 for cycle∧smurf and +8 for cycle∧shell. All three
/// patterns therefore add +28.
fn interaction_bonus(cycle: bool, smurf: bool, shell: bool) -> f64 {
    let distinct = [cycle, smurf, shell].iter().filter(|&&b| b).count();
    let mut bonus = 0.0;
    if distinct >= 2 {
        bonus += BONUS_MULTI_PATTERN;
    }
    if cycle && smurf {
        bonus += BONUS_CYCLE_SMURF;
    }
    if cycle && shell {
        bonus += BONUS_CYCLE_SHELL;
    }
    bonus
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

    #[test]
    fn test_interaction_bonus_table() {
        assert_eq!(interaction_bonus(false, false, false), 0.0);
        assert_eq!(interaction_bonus(true, false, false), 0.0);
        assert_eq!(interaction_bonus(false, true, true), 10.0);
        assert_eq!(interaction_bonus(true, true, false), 20.0);
        assert_eq!(interaction_bonus(true, false, true), 18.0);
        assert_eq!(interaction_bonus(true, true, true), 28.0);
    }

    #[test]
    fn test_ring_id_counters_independent_per_pattern() {
        let cycle = Ring::new(
            PatternType::Cycle,
            vec!["A".into(), "B".into(), "C".into()],
            vec![],
            RingEvidence::Cycle {
                length: 3,
                time_span_hours: 1.0,
                amount_ratio: 1.0,
            },
        );
        let shell = Ring::new(
            PatternType::Shell,
            vec!["D".into(), "E".into(), "F".into()],
            vec![],
            RingEvidence::Shell {
                length: 3,
                time_span_hours: 1.0,
                amount_ratio: 1.0,
                tightness: 0.5,
            },
        );
        let rings = vec![cycle.clone(), cycle, shell];
        let ids = assign_ring_ids(&rings);
        assert_eq!(ids, vec!["RING_CYC_0001", "RING_CYC_0002", "RING_SHL_0001"]);
    }

    #[test]
    fn test_velocity_two_pointer() {
        // 6 transactions touching A inside one hour
        let txs: Vec<Transaction> = (0..6)
            .map(|i| {
                tx(
                    &format!("T{i}"),
                    "A",
                    &format!("R{i}"),
                    100.0,
                    &format!("2025-01-01 10:{i:02}:00"),
                )
            })
            .collect();
        let graph = TransactionGraph::build(txs);
        let config = DetectionConfig::default();
        let velocity = ScoringEngine::new(&config).velocity_accounts(&graph);
        assert!(velocity.contains("A"));
        assert!(!velocity.contains("R0"));
    }

    #[test]
    fn test_velocity_exactly_five_not_flagged() {
        let txs: Vec<Transaction> = (0..5)
            .map(|i| {
                tx(
                    &format!("T{i}"),
                    "A",
                    &format!("R{i}"),
                    100.0,
                    &format!("2025-01-01 10:{i:02}:00"),
                )
            })
            .collect();
        let graph = TransactionGraph::build(txs);
        let config = DetectionConfig::default();
        let velocity = ScoringEngine::new(&config).velocity_accounts(&graph);
        assert!(velocity.is_empty());
    }

    #[test]
    fn test_velocity_spread_outside_window_not_flagged() {
        // 6 transactions 25h apart never fit one 24h window
        let txs: Vec<Transaction> = (0..6)
            .map(|i| {
                tx(
                    &format!("T{i}"),
                    "A",
                    &format!("R{i}"),
                    100.0,
                    &format!("2025-01-{:02} 10:00:00", 1 + i * 2),
                )
            })
            .collect();
        let graph = TransactionGraph::build(txs);
        let config = DetectionConfig::default();
        let velocity = ScoringEngine::new(&config).velocity_accounts(&graph);
        assert!(velocity.is_empty());
    }

    #[test]
    fn test_cycle_ring_scoring_end_to_end() {
        let graph = TransactionGraph::build(vec![
            tx("T1", "A", "B", 100.0, "2025-01-01 10:00:00"),
            tx("T2", "B", "C", 105.0, "2025-01-01 12:00:00"),
            tx("T3", "C", "A", 102.0, "2025-01-01 14:00:00"),
        ]);
        let mut ring = Ring::new(
            PatternType::Cycle,
            vec!["A".into(), "B".into(), "C".into()],
            vec![0, 1, 2],
            RingEvidence::Cycle {
                length: 3,
                time_span_hours: 4.0,
                amount_ratio: 1.05,
            },
        );
        ring.structural_confidence = 0.9658;

        let config = DetectionConfig::default();
        let (findings, reports) = ScoringEngine::new(&config).run(&graph, &[ring]);

        assert_eq!(findings.len(), 3);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].ring_id, "RING_CYC_0001");

        // all three identical: raw 40, conf mult 0.8+0.4*0.9658, density 1,
        // percentile 1.0 → ×1.15
        let expected = (40.0 * (0.8 + 0.4 * 0.9658) * 1.15_f64).round() as u32;
        for finding in &findings {
            assert_eq!(finding.suspicion_score, expected);
            assert_eq!(finding.detected_patterns, vec!["cycle"]);
            assert_eq!(finding.ring_id.as_deref(), Some("RING_CYC_0001"));
        }
        // findings sorted by account id on equal scores
        let ids: Vec<&str> = findings.iter().map(|f| f.account_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_flag_threshold_excludes_velocity_only_accounts() {
        // 6 rapid transfers: A is velocity-only, raw 10 → final well under 25
        let txs: Vec<Transaction> = (0..6)
            .map(|i| {
                tx(
                    &format!("T{i}"),
                    "A",
                    &format!("R{i}"),
                    100.0,
                    &format!("2025-01-01 10:{i:02}:00"),
                )
            })
            .collect();
        let graph = TransactionGraph::build(txs);
        let config = DetectionConfig::default();
        let (findings, reports) = ScoringEngine::new(&config).run(&graph, &[]);
        assert!(findings.is_empty());
        assert!(reports.is_empty());
    }

    #[test]
    fn test_no_rings_no_velocity_empty() {
        let graph = TransactionGraph::build(vec![tx(
            "T1",
            "A",
            "B",
            100.0,
            "2025-01-01 10:00:00",
        )]);
        let config = DetectionConfig::default();
        let (findings, reports) = ScoringEngine::new(&config).run(&graph, &[]);
        assert!(findings.is_empty());
        assert!(reports.is_empty());
    }

    #[test]
    fn test_smurf_dampening_scales_contribution() {
        let graph = TransactionGraph::build(vec![tx(
            "T1",
            "H",
            "R0",
            100.0,
            "2025-01-01 10:00:00",
        )]);
        let members: Vec<String> = std::iter::once("H".to_string())
            .chain((0..10).map(|i| format!("R{i}")))
            .collect();
        let mk = |dampening: f64| {
            Ring::new(
                PatternType::Smurfing,
                members.clone(),
                vec![],
                RingEvidence::Smurfing {
                    peak_counterparties: 10,
                    window_tx_count: 10,
                    diversity_ratio: 1.0,
                    amount_cv: 0.0,
                    dampening,
                },
            )
        };

        let config = DetectionConfig::default();
        let engine = ScoringEngine::new(&config);
        let (full, _) = engine.run(&graph, &[mk(1.0)]);
        let (halved, _) = engine.run(&graph, &[mk(0.5)]);

        let full_h = full.iter().find(|f| f.account_id == "H").unwrap();
        let half_h = halved.iter().find(|f| f.account_id == "H").unwrap();
        assert!(full_h.suspicion_score > half_h.suspicion_score);
    }
}
