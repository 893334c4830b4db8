//! Structured error types for the latency statistics engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
  #[error("malformed record at line {line}: {reason}")]
  MalformedRecord { line: usize, reason: String },

  #[error("no samples in {series} series")]
  EmptySeries { series: String },

  #[error("percentile must be within (0,1], got {0}")]
  InvalidPercentile(f64),

  #[error("config: {0}")]
  Config(String),

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("csv: {0}")]
  Csv(#[from] csv::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl StatsError {
  pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
    Self::MalformedRecord {
      line,
      reason: reason.into(),
    }
  }

  pub fn empty(series: impl Into<String>) -> Self {
    Self::EmptySeries {
      series: series.into(),
    }
  }

  pub fn config(msg: impl Into<String>) -> Self {
    Self::Config(msg.into())
  }
}

/// Failure to turn a payload into an [`crate::types::Event`] (or back).
#[derive(Debug, Error)]
pub enum CodecError {
  #[error("json: {0}")]
  Json(#[from] serde_json::Error),

  #[error("csv: {0}")]
  Csv(#[from] csv::Error),

  #[error("{field}: {reason}")]
  Field { field: String, reason: String },
}

impl CodecError {
  pub fn field(field: &str, reason: &str) -> Self {
    Self::Field {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }
}
