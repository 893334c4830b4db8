//! Results of a completed pass: percentile queries, summaries, log dump.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use chrono::{SecondsFormat, TimeZone, Utc};
use serde::Serialize;

use crate::config::{Config, RankRule};
use crate::error::StatsError;
use crate::eventlog::EventLog;
use crate::index::InputIndex;
use crate::series::{Latencies, LatencySeries, Percentile, SeriesKind};

/// Record counts from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassCounters {
  /// Non-blank records read.
  pub records: u64,
  /// Records captured before the start offset.
  pub before_start: u64,
  pub input_events: u64,
  pub derived_events: u64,
  /// Derived events with no indexed contributor.
  pub unresolved: u64,
}

/// Statistics of one completed run. Every series is sorted.
#[derive(Debug, Clone)]
pub struct Stats {
  rank_rule: RankRule,
  per_type_enabled: bool,
  latencies: Latencies,
  index: InputIndex,
  event_log: Option<EventLog>,
  pass: PassCounters,
}

impl Stats {
  pub(crate) fn new(
    config: &Config,
    latencies: Latencies,
    index: InputIndex,
    event_log: Option<EventLog>,
    pass: PassCounters,
  ) -> Self {
    Self {
      rank_rule: config.rank_rule,
      per_type_enabled: config.include_per_type,
      latencies,
      index,
      event_log,
      pass,
    }
  }

  /// `p`-th value of one of the global series.
  pub fn series_latency(&self, kind: SeriesKind, p: Percentile) -> Result<i64, StatsError> {
    self
      .latencies
      .series(kind)
      .percentile(p, self.rank_rule)
      .ok_or_else(|| StatsError::empty(kind.label()))
  }

  /// End-to-end latency percentile.
  pub fn latency(&self, p: Percentile) -> Result<i64, StatsError> {
    self.series_latency(SeriesKind::EndToEnd, p)
  }

  pub fn processing_latency(&self, p: Percentile) -> Result<i64, StatsError> {
    self.series_latency(SeriesKind::Processing, p)
  }

  pub fn in_latency(&self, p: Percentile) -> Result<i64, StatsError> {
    self.series_latency(SeriesKind::InputPhase, p)
  }

  pub fn out_latency(&self, p: Percentile) -> Result<i64, StatsError> {
    self.series_latency(SeriesKind::OutputPhase, p)
  }

  /// End-to-end latency percentile for one derived event type.
  pub fn per_type_latency(&self, type_name: &str, p: Percentile) -> Result<i64, StatsError> {
    self
      .latencies
      .per_type(type_name)
      .and_then(|s| s.percentile(p, self.rank_rule))
      .ok_or_else(|| StatsError::empty(format!("end-to-end[{}]", type_name)))
  }

  pub fn series(&self, kind: SeriesKind) -> &LatencySeries {
    self.latencies.series(kind)
  }

  /// Derived event types with end-to-end samples, in name order.
  pub fn event_types(&self) -> impl Iterator<Item = &str> {
    self.latencies.types()
  }

  /// Input events per second; `None` when undefined (see [`InputIndex::average_arrival_rate`]).
  pub fn average_arrival_rate(&self) -> Option<f64> {
    self.index.average_arrival_rate()
  }

  pub fn num_input_events(&self) -> u64 {
    self.index.count()
  }

  pub fn input_index(&self) -> &InputIndex {
    &self.index
  }

  pub fn event_log(&self) -> Option<&EventLog> {
    self.event_log.as_ref()
  }

  pub fn pass(&self) -> PassCounters {
    self.pass
  }

  pub fn rank_rule(&self) -> RankRule {
    self.rank_rule
  }

  /// Write the reconstructed event log as CSV.
  pub fn dump_log<W: Write>(&self, writer: W, include_header: bool) -> Result<(), StatsError> {
    let log = self
      .event_log
      .as_ref()
      .ok_or_else(|| StatsError::config("event log tracking is disabled"))?;
    log.write_csv(writer, include_header)
  }

  pub fn summary(&self, p: Percentile) -> Summary {
    let per_type = self.per_type_enabled.then(|| {
      self
        .latencies
        .types()
        .filter_map(|name| {
          let series = self.latencies.per_type(name)?;
          Some((name.to_string(), SeriesSummary::of(series, p, self.rank_rule)))
        })
        .collect()
    });

    Summary {
      percentile: p,
      rank_rule: self.rank_rule,
      end_to_end: SeriesSummary::of(self.series(SeriesKind::EndToEnd), p, self.rank_rule),
      processing: SeriesSummary::of(self.series(SeriesKind::Processing), p, self.rank_rule),
      input_phase: SeriesSummary::of(self.series(SeriesKind::InputPhase), p, self.rank_rule),
      output_phase: SeriesSummary::of(self.series(SeriesKind::OutputPhase), p, self.rank_rule),
      per_type,
      input_events: self.index.count(),
      input_window_start: self.index.earliest().and_then(rfc3339_millis),
      input_window_end: self.index.latest().and_then(rfc3339_millis),
      average_rate: self.average_arrival_rate(),
      pass: self.pass,
    }
  }
}

fn rfc3339_millis(ms: i64) -> Option<String> {
  Utc
    .timestamp_millis_opt(ms)
    .single()
    .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ---------------------------------------------------------------------------
// Summary (JSON contract + text rendering)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
  pub count: usize,
  pub min: Option<i64>,
  pub max: Option<i64>,
  pub mean: Option<f64>,
  /// Value at the requested percentile; `None` for an empty series.
  pub value: Option<i64>,
}

impl SeriesSummary {
  fn of(series: &LatencySeries, p: Percentile, rule: RankRule) -> Self {
    Self {
      count: series.len(),
      min: series.min(),
      max: series.max(),
      mean: series.mean().map(|m| (m * 100.0).round() / 100.0),
      value: series.percentile(p, rule),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
  pub percentile: Percentile,
  pub rank_rule: RankRule,
  pub end_to_end: SeriesSummary,
  pub processing: SeriesSummary,
  pub input_phase: SeriesSummary,
  pub output_phase: SeriesSummary,
  /// `None` when per-type tracking is off.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub per_type: Option<BTreeMap<String, SeriesSummary>>,
  pub input_events: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input_window_start: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input_window_end: Option<String>,
  pub average_rate: Option<f64>,
  pub pass: PassCounters,
}

fn ms(value: Option<i64>) -> String {
  match value {
    Some(v) => format!("{} ms", v),
    None => "no samples".to_string(),
  }
}

impl Summary {
  /// Human-readable report, one statistic per line.
  pub fn render_text(&self) -> String {
    let pct = self.percentile.to_string();
    let mut out = String::new();
    let _ = writeln!(out, "{} End-to-end latency: {}", pct, ms(self.end_to_end.value));
    let _ = writeln!(out, "{} Processing latency: {}", pct, ms(self.processing.value));
    if let Some(per_type) = &self.per_type {
      let _ = writeln!(out, "{} End-to-end latencies per event type:", pct);
      for (name, s) in per_type {
        let _ = writeln!(out, "{}: {}", name, ms(s.value));
      }
    }
    let _ = writeln!(out, "{} Input phase latency: {}", pct, ms(self.input_phase.value));
    let _ = writeln!(out, "{} Output phase latency: {}", pct, ms(self.output_phase.value));
    let rate = match self.average_rate {
      Some(r) => format!("{:.6} events/sec", r),
      None => "undefined".to_string(),
    };
    let _ = writeln!(
      out,
      "Num of input events: {}, average rate: {}",
      self.input_events, rate
    );
    out
  }
}
