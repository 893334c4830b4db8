//! Arrival index of input events: id -> capture timestamp, plus rate bounds.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct InputIndex {
  arrivals: HashMap<String, i64>,
  count: u64,
  /// (earliest, latest) capture timestamp over all input events.
  bounds: Option<(i64, i64)>,
}

impl InputIndex {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record an input event's arrival. A repeated id overwrites the earlier entry.
  pub fn record_arrival(&mut self, id: &str, timestamp: i64) {
    self.arrivals.insert(id.to_string(), timestamp);
    self.note_arrival(timestamp);
  }

  /// Count an arrival that has no usable id: widens the bounds, is never looked up.
  pub fn note_arrival(&mut self, timestamp: i64) {
    self.count += 1;
    self.bounds = Some(match self.bounds {
      None => (timestamp, timestamp),
      Some((earliest, latest)) => (earliest.min(timestamp), latest.max(timestamp)),
    });
  }

  pub fn lookup(&self, id: &str) -> Option<i64> {
    self.arrivals.get(id).copied()
  }

  /// Number of input events seen, repeats included.
  pub fn count(&self) -> u64 {
    self.count
  }

  /// Number of distinct indexed ids.
  pub fn len(&self) -> usize {
    self.arrivals.len()
  }

  pub fn is_empty(&self) -> bool {
    self.arrivals.is_empty()
  }

  pub fn earliest(&self) -> Option<i64> {
    self.bounds.map(|(earliest, _)| earliest)
  }

  pub fn latest(&self) -> Option<i64> {
    self.bounds.map(|(_, latest)| latest)
  }

  /// Input events per second over the observed arrival window.
  ///
  /// `None` when fewer than two events were seen or they all arrived at the
  /// same millisecond.
  pub fn average_arrival_rate(&self) -> Option<f64> {
    let (earliest, latest) = self.bounds?;
    if self.count < 2 || latest == earliest {
      return None;
    }
    let span = i128::from(latest) - i128::from(earliest);
    Some((self.count - 1) as f64 * 1000.0 / span as f64)
  }
}
