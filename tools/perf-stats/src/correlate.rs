//! Correlate derived events with their contributing input events.
//!
//! End-to-end latency is measured from the *latest* contributor to arrive
//! (the bottleneck), processing latency from the latest contributing internal
//! timestamp. The two contributor lists are resolved independently.

use tracing::trace;

use crate::config::Config;
use crate::eventlog::EventLog;
use crate::index::InputIndex;
use crate::series::{Latencies, LatencyAccumulator, SeriesKind};
use crate::types::{Contributors, Event};
use crate::usecase::EventIdentity;

/// Latencies resolved for one derived event, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Resolution {
  /// Capture time minus latest contributor arrival.
  pub end_to_end: Option<i64>,
  /// Latest contributing internal timestamp minus latest contributor arrival.
  pub input_phase: Option<i64>,
  /// Event's internal timestamp minus latest contributing internal timestamp.
  pub processing: Option<i64>,
  /// Capture time minus the event's internal timestamp.
  pub output_phase: Option<i64>,
}

/// Resolve latencies without recording them.
///
/// Returns `None` when a difference does not fit in `i64` milliseconds.
pub fn resolve(
  event: &Event,
  contributors: &Contributors,
  log_timestamp: i64,
  index: &InputIndex,
) -> Option<Resolution> {
  let latest_arrival = contributors
    .ids
    .iter()
    .filter_map(|id| index.lookup(id))
    .max();
  let latest_internal = contributors.timestamps.iter().copied().max();

  let mut resolved = Resolution::default();
  if let Some(arrival) = latest_arrival {
    resolved.end_to_end = Some(log_timestamp.checked_sub(arrival)?);
    resolved.output_phase = Some(log_timestamp.checked_sub(event.timestamp)?);
    if let Some(internal) = latest_internal {
      resolved.input_phase = Some(internal.checked_sub(arrival)?);
    }
  }
  if let Some(internal) = latest_internal {
    resolved.processing = Some(event.timestamp.checked_sub(internal)?);
  }
  Some(resolved)
}

/// Records resolved latencies into the series and, when enabled, the event log.
#[derive(Debug)]
pub struct Correlator {
  include_per_type: bool,
  partial_rows: bool,
  latencies: LatencyAccumulator,
  log: Option<EventLog>,
  derived: u64,
  unresolved: u64,
  anonymous: u64,
}

impl Correlator {
  pub fn new(config: &Config) -> Self {
    Self {
      include_per_type: config.include_per_type,
      partial_rows: config.partial_rows,
      latencies: LatencyAccumulator::new(),
      log: config.include_event_log.then(EventLog::new),
      derived: 0,
      unresolved: 0,
      anonymous: 0,
    }
  }

  /// Correlate one derived event observed at `log_timestamp`.
  ///
  /// Events without contributors are not derived and resolve to nothing.
  /// Returns `None`, recording nothing, when a latency overflows `i64`.
  pub fn correlate(
    &mut self,
    event: &Event,
    log_timestamp: i64,
    identity: &dyn EventIdentity,
    index: &InputIndex,
  ) -> Option<Resolution> {
    let Some(contributors) = &event.contributors else {
      return Some(Resolution::default());
    };
    let resolved = resolve(event, contributors, log_timestamp, index)?;
    self.derived += 1;
    let type_name = identity.type_of(event);

    match resolved.end_to_end {
      Some(e2e) => {
        self.latencies.record(SeriesKind::EndToEnd, e2e);
        if self.include_per_type {
          self.latencies.record_for_type(&type_name, e2e);
        }
      }
      None => {
        self.unresolved += 1;
        trace!(
          event = %event.name,
          contributors = contributors.ids.len(),
          "no contributing input event resolved"
        );
      }
    }
    if let Some(v) = resolved.output_phase {
      self.latencies.record(SeriesKind::OutputPhase, v);
    }
    if let Some(v) = resolved.processing {
      self.latencies.record(SeriesKind::Processing, v);
    }
    if let Some(v) = resolved.input_phase {
      self.latencies.record(SeriesKind::InputPhase, v);
    }

    if let Some(log) = self.log.as_mut() {
      if resolved.end_to_end.is_some() || self.partial_rows {
        match identity.id_of(event) {
          Some(id) => log.observe(&id, &type_name, log_timestamp, &resolved),
          None => self.anonymous += 1,
        }
      }
    }

    Some(resolved)
  }

  /// Derived events seen so far.
  pub fn derived(&self) -> u64 {
    self.derived
  }

  /// Derived events none of whose contributor ids were indexed.
  pub fn unresolved(&self) -> u64 {
    self.unresolved
  }

  /// Derived events left out of the event log for lack of an id.
  pub fn anonymous(&self) -> u64 {
    self.anonymous
  }

  pub fn finish(self) -> (Latencies, Option<EventLog>) {
    (self.latencies.finish(), self.log)
  }
}
