//! Core types for the latency engine (log records, decoded events, use cases).

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Log records (one per captured line)
// ---------------------------------------------------------------------------

/// How a payload is encoded, decided by its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
  /// Self-describing encoding emitted by the pipeline (derived events).
  Structured,
  /// Use-case specific encoding of the events fed into the pipeline.
  Raw,
}

/// One captured line: `<log timestamp>:<payload>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
  /// 1-based line number in the captured log.
  pub line: usize,
  /// Wall-clock capture time in epoch milliseconds.
  pub log_timestamp: i64,
  pub payload: String,
  pub encoding: Encoding,
}

// ---------------------------------------------------------------------------
// Decoded events
// ---------------------------------------------------------------------------

/// References from a derived event back to the events that produced it.
///
/// Both lists come from the same derived event but are resolved independently:
/// `ids` against the input arrival index, `timestamps` against the event's own
/// internal timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contributors {
  pub ids: Vec<String>,
  /// Internal timestamps of the contributing events, normalized to millis.
  pub timestamps: Vec<i64>,
}

/// Canonical event produced by an [`crate::codec::EventCodec`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
  pub name: String,
  /// Time the pipeline recorded the event internally (epoch millis).
  pub timestamp: i64,
  pub attributes: Map<String, Value>,
  /// Present iff the payload carried either contributor attribute.
  pub contributors: Option<Contributors>,
}

impl Event {
  pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
    Self {
      name: name.into(),
      timestamp,
      attributes: Map::new(),
      contributors: None,
    }
  }

  pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
    self.attributes.insert(key.to_string(), value.into());
    self
  }

  pub fn with_contributors(mut self, ids: Vec<String>, timestamps: Vec<i64>) -> Self {
    self.contributors = Some(Contributors { ids, timestamps });
    self
  }

  pub fn is_derived(&self) -> bool {
    self.contributors.is_some()
  }

  /// String view of an attribute; numbers and booleans are rendered as text.
  pub fn attr_str(&self, key: &str) -> Option<String> {
    match self.attributes.get(key)? {
      Value::String(s) => Some(s.clone()),
      Value::Null => None,
      other => Some(other.to_string()),
    }
  }
}

// ---------------------------------------------------------------------------
// Use cases
// ---------------------------------------------------------------------------

/// Which raw input encoding and identity scheme the captured run used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
  /// Credit card transactions.
  #[default]
  Fraud,
  /// Road sensor aggregated readings.
  Traffic,
}
