//! Detection configuration
//!
//! One read-only record of every threshold the pipeline uses. A pipeline is
//! constructed from a validated config and never mutates it; there is no
//! global state.

use serde::{Deserialize, Serialize};

/// Complete detection configuration
///
/// Defaults mirror the production tuning. Construct with
/// `DetectionConfig::default()` and override individual fields, then let
/// `Pipeline::new` run [`DetectionConfig::validate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Reject batches with more valid rows than this
    pub max_transactions: usize,

    /// Minimum cycle length in vertices
    pub cycle_min_len: usize,
    /// Maximum cycle length in vertices
    pub cycle_max_len: usize,
    /// Maximum cycle time span in hours (inclusive)
    pub cycle_time_span_hours: f64,
    /// Maximum max/min amount ratio within a cycle (inclusive)
    pub cycle_amount_ratio: f64,

    /// Distinct-counterparty peak required to emit a smurfing ring
    pub smurf_min_counterparties: usize,
    /// Sliding window for the counterparty peak, in hours
    pub smurf_window_hours: f64,

    /// Minimum shell chain length in vertices
    pub shell_min_len: usize,
    /// Maximum shell chain length in vertices
    pub shell_max_len: usize,
    /// Minimum total degree for a shell intermediate
    pub shell_intermediate_degree_min: usize,
    /// Maximum total degree for a shell intermediate
    pub shell_intermediate_degree_max: usize,
    /// Maximum max/min amount ratio across a shell chain (inclusive)
    pub shell_amount_ratio: f64,
    /// Minimum per-edge amount for shell chains
    pub shell_min_amount: f64,
    /// Maximum shell chain time span in hours (inclusive)
    pub shell_time_span_hours: f64,

    /// Suspicious-neighbor ratio below which scores are dampened
    pub density_threshold: f64,

    /// Minimum final score for flagging accounts outside any ring
    pub flag_threshold: u32,

    /// Rolling window for the high-velocity check, in hours
    pub velocity_window_hours: f64,
    /// Transaction count that must be exceeded inside the velocity window
    pub velocity_min_transactions: usize,

    /// Tolerated backwards step between consecutive chain edges, in seconds
    pub timestamp_slack_secs: i64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_transactions: 10_000,
            cycle_min_len: 3,
            cycle_max_len: 5,
            cycle_time_span_hours: 72.0,
            cycle_amount_ratio: 1.25,
            smurf_min_counterparties: 10,
            smurf_window_hours: 72.0,
            shell_min_len: 3,
            shell_max_len: 8,
            shell_intermediate_degree_min: 2,
            shell_intermediate_degree_max: 3,
            shell_amount_ratio: 3.0,
            shell_min_amount: 100.0,
            shell_time_span_hours: 72.0,
            density_threshold: 0.30,
            flag_threshold: 25,
            velocity_window_hours: 24.0,
            velocity_min_transactions: 5,
            timestamp_slack_secs: 60,
        }
    }
}

impl DetectionConfig {
    /// Validate cross-field consistency.
    ///
    /// Returns a human-readable description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_transactions == 0 {
            return Err("max_transactions must be positive".to_string());
        }
        if self.cycle_min_len < 2 {
            return Err("cycle_min_len must be at least 2".to_string());
        }
        if self.cycle_min_len > self.cycle_max_len {
            return Err(format!(
                "cycle length range inverted: {} > {}",
                self.cycle_min_len, self.cycle_max_len
            ));
        }
        if self.shell_min_len < 3 {
            return Err("shell_min_len must be at least 3".to_string());
        }
        if self.shell_min_len > self.shell_max_len {
            return Err(format!(
                "shell length range inverted: {} > {}",
                self.shell_min_len, self.shell_max_len
            ));
        }
        if self.shell_intermediate_degree_min > self.shell_intermediate_degree_max {
            return Err(format!(
                "shell intermediate degree range inverted: {} > {}",
                self.shell_intermediate_degree_min, self.shell_intermediate_degree_max
            ));
        }
        if self.cycle_amount_ratio < 1.0 || self.shell_amount_ratio < 1.0 {
            return Err("amount ratio caps must be at least 1.0".to_string());
        }
        if self.cycle_time_span_hours <= 0.0
            || self.shell_time_span_hours <= 0.0
            || self.smurf_window_hours <= 0.0
            || self.velocity_window_hours <= 0.0
        {
            return Err("time windows must be positive".to_string());
        }
        if !(0.0..=1.0).contains(&self.density_threshold) {
            return Err("density_threshold must be within [0, 1]".to_string());
        }
        if self.shell_min_amount < 0.0 {
            return Err("shell_min_amount must be non-negative".to_string());
        }
        if self.timestamp_slack_secs < 0 {
            return Err("timestamp_slack_secs must be non-negative".to_string());
        }
        Ok(())
    }

    /// Timestamp slack as a chrono duration.
    pub fn timestamp_slack(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.timestamp_slack_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DetectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_cycle_range_rejected() {
        let config = DetectionConfig {
            cycle_min_len: 6,
            cycle_max_len: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cap_rejected() {
        let config = DetectionConfig {
            max_transactions: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = DetectionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: DetectionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_transactions, config.max_transactions);
        assert_eq!(back.flag_threshold, config.flag_threshold);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let back: DetectionConfig = serde_json::from_str(r#"{"flag_threshold": 40}"#).unwrap();
        assert_eq!(back.flag_threshold, 40);
        assert_eq!(back.max_transactions, 10_000);
    }
}
