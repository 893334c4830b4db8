//! Core engine: one sequential pass over a captured log, then sorted series.

use std::io::BufRead;

use tracing::{debug, trace, warn};

use crate::codec::{EventCodec, JsonEventCodec};
use crate::config::Config;
use crate::correlate::Correlator;
use crate::error::StatsError;
use crate::index::InputIndex;
use crate::record::parse_line;
use crate::report::{PassCounters, Stats};
use crate::types::{Encoding, UseCase};
use crate::usecase::EventIdentity;

/// The latency statistics engine. Consumed by [`StatsEngine::analyze`]; build
/// a new one per run.
pub struct StatsEngine {
  config: Config,
  structured: JsonEventCodec,
  raw: Box<dyn EventCodec>,
  identity: Box<dyn EventIdentity>,
}

impl StatsEngine {
  pub fn new(config: Config, raw: Box<dyn EventCodec>, identity: Box<dyn EventIdentity>) -> Self {
    let structured = JsonEventCodec::new(config.contributor_keys.clone());
    Self {
      config,
      structured,
      raw,
      identity,
    }
  }

  pub fn for_use_case(config: Config, use_case: UseCase) -> Self {
    Self::new(config, use_case.codec(), use_case.identity())
  }

  /// Replay `reader` to the end and compute all latency series.
  ///
  /// Records captured before `start_timestamp` are ignored. The first
  /// malformed record aborts the run.
  pub fn analyze<R: BufRead>(self, reader: R, start_timestamp: i64) -> Result<Stats, StatsError> {
    let mut index = InputIndex::new();
    let mut correlator = Correlator::new(&self.config);
    let mut counters = PassCounters::default();
    let mut anonymous_inputs = 0u64;

    for (i, line) in reader.lines().enumerate() {
      let line = line?;
      let Some(record) = parse_line(i + 1, &line, &self.structured)? else {
        continue;
      };
      counters.records += 1;

      if record.log_timestamp < start_timestamp {
        counters.before_start += 1;
        continue;
      }

      let codec: &dyn EventCodec = match record.encoding {
        Encoding::Structured => &self.structured,
        Encoding::Raw => self.raw.as_ref(),
      };
      let event = codec
        .decode(record.payload.as_bytes())
        .map_err(|e| StatsError::malformed(record.line, e.to_string()))?;

      if event.is_derived() {
        trace!(line = record.line, event = %event.name, "derived event");
        correlator
          .correlate(&event, record.log_timestamp, self.identity.as_ref(), &index)
          .ok_or_else(|| StatsError::malformed(record.line, "latency overflows 64-bit milliseconds"))?;
      } else {
        match self.identity.id_of(&event) {
          Some(id) => index.record_arrival(&id, record.log_timestamp),
          None => {
            anonymous_inputs += 1;
            index.note_arrival(record.log_timestamp);
          }
        }
      }
    }

    if anonymous_inputs > 0 {
      warn!(count = anonymous_inputs, "input events without an id were counted but not indexed");
    }
    if correlator.anonymous() > 0 {
      warn!(count = correlator.anonymous(), "derived events without an id left out of the event log");
    }

    counters.input_events = index.count();
    counters.derived_events = correlator.derived();
    counters.unresolved = correlator.unresolved();
    debug!(
      records = counters.records,
      before_start = counters.before_start,
      input = counters.input_events,
      derived = counters.derived_events,
      unresolved = counters.unresolved,
      "pass complete"
    );

    let (latencies, event_log) = correlator.finish();
    Ok(Stats::new(
      &self.config,
      latencies,
      index,
      event_log,
      counters,
    ))
  }
}
