//! Reconstructed per-event log: one row per derived event id, in first-seen order.

use std::collections::HashMap;
use std::io::Write;

use serde::Serialize;

use crate::correlate::Resolution;
use crate::error::StatsError;

pub const HEADER: [&str; 7] = [
  "timestamp",
  "eventName",
  "eventId",
  "e2eLatency",
  "inLatency",
  "processingLatency",
  "outLatency",
];

/// Latencies resolved for one derived event id. Unresolved values are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLogRow {
  /// Capture timestamp of the latest observation of this id.
  pub timestamp: i64,
  pub event_name: String,
  pub event_id: String,
  pub e2e_latency: Option<i64>,
  pub in_latency: Option<i64>,
  pub processing_latency: Option<i64>,
  pub out_latency: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
  rows: Vec<EventLogRow>,
  positions: HashMap<String, usize>,
}

impl EventLog {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create the row for `id` on first sight, then refine it with `resolved`.
  ///
  /// A later observation never clears a latency resolved earlier.
  pub fn observe(&mut self, id: &str, event_name: &str, timestamp: i64, resolved: &Resolution) {
    let pos = match self.positions.get(id) {
      Some(&pos) => pos,
      None => {
        self.rows.push(EventLogRow {
          timestamp,
          event_name: event_name.to_string(),
          event_id: id.to_string(),
          e2e_latency: None,
          in_latency: None,
          processing_latency: None,
          out_latency: None,
        });
        self.positions.insert(id.to_string(), self.rows.len() - 1);
        self.rows.len() - 1
      }
    };

    let row = &mut self.rows[pos];
    row.timestamp = timestamp;
    if resolved.end_to_end.is_some() {
      row.e2e_latency = resolved.end_to_end;
    }
    if resolved.input_phase.is_some() {
      row.in_latency = resolved.input_phase;
    }
    if resolved.processing.is_some() {
      row.processing_latency = resolved.processing;
    }
    if resolved.output_phase.is_some() {
      row.out_latency = resolved.output_phase;
    }
  }

  pub fn get(&self, id: &str) -> Option<&EventLogRow> {
    self.positions.get(id).map(|&pos| &self.rows[pos])
  }

  pub fn rows(&self) -> &[EventLogRow] {
    &self.rows
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  /// Write rows as CSV in creation order; unresolved latencies are empty fields.
  pub fn write_csv<W: Write>(&self, writer: W, include_header: bool) -> Result<(), StatsError> {
    let mut out = csv::WriterBuilder::new()
      .has_headers(false)
      .terminator(csv::Terminator::Any(b'\n'))
      .from_writer(writer);
    if include_header {
      out.write_record(HEADER)?;
    }
    for row in &self.rows {
      out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
  }
}
