//! Engine configuration with sane defaults.

use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Index rule for nearest-rank percentile lookup over `n` sorted samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RankRule {
  /// `round(n * p) - 1`; `p = 1.0` selects the last sample.
  #[default]
  Adjusted,
  /// `round(n * p)`, clamped to the last sample.
  Unadjusted,
}

/// Attribute names under which derived events carry their contributors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributorKeys {
  pub ids: String,
  pub timestamps: String,
}

impl Default for ContributorKeys {
  fn default() -> Self {
    Self {
      ids: "transaction_ids".into(),
      timestamps: "timestamps".into(),
    }
  }
}

/// Tunable behavior of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Track end-to-end latency per derived event type.
  pub include_per_type: bool,
  /// Keep one reconstructed row per derived event id.
  pub include_event_log: bool,
  /// Percentile index rule.
  pub rank_rule: RankRule,
  /// Create/update log rows for derived events whose end-to-end latency did not resolve.
  pub partial_rows: bool,
  pub contributor_keys: ContributorKeys,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      include_per_type: true,
      include_event_log: true,
      rank_rule: RankRule::Adjusted,
      partial_rows: true,
      contributor_keys: ContributorKeys::default(),
    }
  }
}

impl Config {
  /// Only global end-to-end and processing series; no per-type buckets, no event log.
  pub fn minimal() -> Self {
    Self {
      include_per_type: false,
      include_event_log: false,
      ..Self::default()
    }
  }

  /// Load a JSON config; missing fields keep their defaults.
  pub fn from_json_file(path: &Path) -> Result<Self, StatsError> {
    let raw = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&raw)?;
    if config.contributor_keys.ids.is_empty() || config.contributor_keys.timestamps.is_empty() {
      return Err(StatsError::config("contributor_keys must not be empty"));
    }
    Ok(config)
  }
}
