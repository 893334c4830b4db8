//! Latency series: single-pass accumulation, one sort, exact nearest-rank lookup.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::RankRule;
use crate::error::StatsError;

/// A percentile in `(0, 1]`, validated at construction. Serializes as the bare fraction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Percentile(f64);

impl Percentile {
  pub fn new(p: f64) -> Result<Self, StatsError> {
    if p.is_nan() || p <= 0.0 || p > 1.0 {
      return Err(StatsError::InvalidPercentile(p));
    }
    Ok(Self(p))
  }

  pub fn value(self) -> f64 {
    self.0
  }
}

impl fmt::Display for Percentile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:.1}%", self.0 * 100.0)
  }
}

impl RankRule {
  /// Index into a sorted series of `len` samples, or `None` when it is empty.
  pub fn index(self, len: usize, p: Percentile) -> Option<usize> {
    if len == 0 {
      return None;
    }
    let rank = (len as f64 * p.value()).round() as i64;
    let idx = match self {
      RankRule::Adjusted => rank - 1,
      RankRule::Unadjusted => rank,
    };
    Some(idx.clamp(0, len as i64 - 1) as usize)
  }
}

/// The latency dimensions tracked for every derived event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
  EndToEnd,
  Processing,
  InputPhase,
  OutputPhase,
}

impl SeriesKind {
  pub const ALL: [SeriesKind; 4] = [
    SeriesKind::EndToEnd,
    SeriesKind::Processing,
    SeriesKind::InputPhase,
    SeriesKind::OutputPhase,
  ];

  pub fn label(self) -> &'static str {
    match self {
      SeriesKind::EndToEnd => "end-to-end",
      SeriesKind::Processing => "processing",
      SeriesKind::InputPhase => "input-phase",
      SeriesKind::OutputPhase => "output-phase",
    }
  }
}

/// Sorted, immutable latency samples in milliseconds. Negative samples are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencySeries {
  samples: Vec<i64>,
}

impl LatencySeries {
  pub fn from_samples(mut samples: Vec<i64>) -> Self {
    samples.sort_unstable();
    Self { samples }
  }

  pub fn percentile(&self, p: Percentile, rule: RankRule) -> Option<i64> {
    rule.index(self.samples.len(), p).map(|i| self.samples[i])
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn min(&self) -> Option<i64> {
    self.samples.first().copied()
  }

  pub fn max(&self) -> Option<i64> {
    self.samples.last().copied()
  }

  pub fn mean(&self) -> Option<f64> {
    if self.samples.is_empty() {
      return None;
    }
    let sum: i128 = self.samples.iter().map(|&s| s as i128).sum();
    Some(sum as f64 / self.samples.len() as f64)
  }

  pub fn as_slice(&self) -> &[i64] {
    &self.samples
  }
}

/// Unsorted samples collected during the pass.
#[derive(Debug, Clone, Default)]
pub struct LatencyAccumulator {
  end_to_end: Vec<i64>,
  processing: Vec<i64>,
  input_phase: Vec<i64>,
  output_phase: Vec<i64>,
  per_type: BTreeMap<String, Vec<i64>>,
}

impl LatencyAccumulator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record(&mut self, kind: SeriesKind, sample: i64) {
    let series = match kind {
      SeriesKind::EndToEnd => &mut self.end_to_end,
      SeriesKind::Processing => &mut self.processing,
      SeriesKind::InputPhase => &mut self.input_phase,
      SeriesKind::OutputPhase => &mut self.output_phase,
    };
    series.push(sample);
  }

  /// End-to-end sample for one derived event type.
  pub fn record_for_type(&mut self, type_name: &str, sample: i64) {
    if let Some(series) = self.per_type.get_mut(type_name) {
      series.push(sample);
    } else {
      self.per_type.insert(type_name.to_string(), vec![sample]);
    }
  }

  pub fn sample_count(&self) -> usize {
    self.end_to_end.len() + self.processing.len() + self.input_phase.len() + self.output_phase.len()
  }

  /// Sort every series once; the result is read-only.
  pub fn finish(self) -> Latencies {
    Latencies {
      end_to_end: LatencySeries::from_samples(self.end_to_end),
      processing: LatencySeries::from_samples(self.processing),
      input_phase: LatencySeries::from_samples(self.input_phase),
      output_phase: LatencySeries::from_samples(self.output_phase),
      per_type: self
        .per_type
        .into_iter()
        .map(|(name, samples)| (name, LatencySeries::from_samples(samples)))
        .collect(),
    }
  }
}

/// All series of a completed pass.
#[derive(Debug, Clone, Default)]
pub struct Latencies {
  end_to_end: LatencySeries,
  processing: LatencySeries,
  input_phase: LatencySeries,
  output_phase: LatencySeries,
  per_type: BTreeMap<String, LatencySeries>,
}

impl Latencies {
  pub fn series(&self, kind: SeriesKind) -> &LatencySeries {
    match kind {
      SeriesKind::EndToEnd => &self.end_to_end,
      SeriesKind::Processing => &self.processing,
      SeriesKind::InputPhase => &self.input_phase,
      SeriesKind::OutputPhase => &self.output_phase,
    }
  }

  pub fn per_type(&self, type_name: &str) -> Option<&LatencySeries> {
    self.per_type.get(type_name)
  }

  /// Event types with end-to-end samples, in name order.
  pub fn types(&self) -> impl Iterator<Item = &str> {
    self.per_type.keys().map(String::as_str)
  }
}

// Test-only helper mirroring `LatencyAccumulator::sample_count`.
#[cfg(test)]
impl Latencies {
  pub(crate) fn sample_count(&self) -> usize {
    self.end_to_end.len() + self.processing.len() + self.input_phase.len() + self.output_phase.len()
  }
}
