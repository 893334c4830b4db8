//! Use-case specific raw encodings (CSV) and event identity schemes.
//!
//! Raw input events are single CSV rows without a header. Each use case fixes
//! the column order, the event name, and how a correlation id is derived.

use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

use crate::codec::EventCodec;
use crate::error::CodecError;
use crate::types::{Event, UseCase};

/// Attribute that, when present, is the correlation id for any use case.
pub const ATTR_EVENT_ID: &str = "EventId";

pub const ATTR_TRANSACTION_ID: &str = "transaction_id";
pub const ATTR_LOCATION: &str = "location";
pub const ATTR_LANE: &str = "lane";
pub const ATTR_TIMESTAMP: &str = "timestamp";

/// Resolves the correlation id and the grouping type of an event.
pub trait EventIdentity {
  fn id_of(&self, event: &Event) -> Option<String>;

  fn type_of(&self, event: &Event) -> String {
    event.name.clone()
  }
}

// ---------------------------------------------------------------------------
// CSV schema shared by both use cases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
  /// Epoch millis; becomes the event's internal timestamp, not an attribute.
  EventTime,
  /// Sensor clock text; kept verbatim as an attribute and parsed into the internal timestamp.
  SensorTime,
  Text,
  Integer,
  Decimal,
  /// `1`/`0` or `true`/`false`.
  Flag,
}

struct CsvSchema {
  event_name: &'static str,
  columns: &'static [(&'static str, Column)],
  /// Minimum number of leading columns a row must carry.
  required: usize,
}

const FRAUD_SCHEMA: CsvSchema = CsvSchema {
  event_name: "Transaction",
  columns: &[
    (ATTR_TIMESTAMP, Column::EventTime),
    (ATTR_TRANSACTION_ID, Column::Text),
    ("is_cnp", Column::Flag),
    ("amount_eur", Column::Decimal),
    ("card_pan", Column::Text),
    ("card_exp_date", Column::Text),
    ("card_country", Column::Integer),
    ("acquirer_country", Column::Integer),
    ("terminal_id", Column::Text),
    ("merchant_id", Column::Text),
  ],
  required: 2,
};

const TRAFFIC_SCHEMA: CsvSchema = CsvSchema {
  event_name: "AggregatedSensorRead",
  columns: &[
    (ATTR_TIMESTAMP, Column::SensorTime),
    (ATTR_LOCATION, Column::Text),
    (ATTR_LANE, Column::Text),
    ("occupancy", Column::Decimal),
    ("vehicle_count", Column::Integer),
    ("average_speed", Column::Decimal),
  ],
  required: 3,
};

/// Parse a sensor clock value: epoch millis, RFC 3339, or `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn parse_sensor_time(raw: &str) -> Option<i64> {
  let raw = raw.trim();
  if let Ok(ms) = raw.parse::<i64>() {
    return Some(ms);
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(dt.timestamp_millis());
  }
  NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
    .ok()
    .map(|n| n.and_utc().timestamp_millis())
}

fn read_row(payload: &[u8]) -> Result<csv::StringRecord, CodecError> {
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(false)
    .flexible(true)
    .trim(csv::Trim::All)
    .from_reader(payload);
  let mut record = csv::StringRecord::new();
  if !reader.read_record(&mut record)? {
    return Err(CodecError::field("row", "empty payload"));
  }
  Ok(record)
}

fn typed_value(name: &str, column: Column, raw: &str) -> Result<Value, CodecError> {
  match column {
    Column::EventTime | Column::Integer => raw
      .parse::<i64>()
      .map(Value::from)
      .map_err(|_| CodecError::field(name, &format!("expected integer, got {:?}", raw))),
    Column::Decimal => raw
      .parse::<f64>()
      .ok()
      .and_then(serde_json::Number::from_f64)
      .map(Value::Number)
      .ok_or_else(|| CodecError::field(name, &format!("expected decimal, got {:?}", raw))),
    Column::Flag => match raw.to_ascii_lowercase().as_str() {
      "1" | "true" => Ok(Value::Bool(true)),
      "0" | "false" => Ok(Value::Bool(false)),
      _ => Err(CodecError::field(name, &format!("expected flag, got {:?}", raw))),
    },
    Column::SensorTime | Column::Text => Ok(Value::String(raw.to_string())),
  }
}

impl CsvSchema {
  fn decode(&self, payload: &[u8]) -> Result<Event, CodecError> {
    let record = read_row(payload)?;
    if record.len() < self.required {
      return Err(CodecError::field(
        "row",
        &format!("expected at least {} columns, got {}", self.required, record.len()),
      ));
    }

    let mut attributes = Map::new();
    let mut timestamp = 0;
    for (&(name, column), raw) in self.columns.iter().zip(record.iter()) {
      if raw.is_empty() {
        continue;
      }
      match column {
        Column::EventTime => {
          timestamp = raw
            .parse()
            .map_err(|_| CodecError::field(name, &format!("expected epoch millis, got {:?}", raw)))?;
        }
        Column::SensorTime => {
          timestamp = parse_sensor_time(raw)
            .ok_or_else(|| CodecError::field(name, &format!("unrecognized time {:?}", raw)))?;
          attributes.insert(name.to_string(), Value::String(raw.to_string()));
        }
        _ => {
          attributes.insert(name.to_string(), typed_value(name, column, raw)?);
        }
      }
    }

    Ok(Event {
      name: self.event_name.to_string(),
      timestamp,
      attributes,
      contributors: None,
    })
  }

  fn encode(&self, event: &Event) -> Result<Vec<u8>, CodecError> {
    let mut fields: Vec<String> = self
      .columns
      .iter()
      .map(|&(name, column)| match column {
        Column::EventTime => event.timestamp.to_string(),
        Column::SensorTime => event
          .attr_str(name)
          .unwrap_or_else(|| event.timestamp.to_string()),
        Column::Flag => match event.attributes.get(name) {
          Some(Value::Bool(true)) => "1".to_string(),
          Some(Value::Bool(false)) => "0".to_string(),
          _ => event.attr_str(name).unwrap_or_default(),
        },
        _ => event.attr_str(name).unwrap_or_default(),
      })
      .collect();
    while fields.len() > self.required && fields.last().is_some_and(|f| f.is_empty()) {
      fields.pop();
    }

    let mut writer = csv::WriterBuilder::new()
      .has_headers(false)
      .terminator(csv::Terminator::Any(b'\n'))
      .from_writer(Vec::new());
    writer.write_record(&fields)?;
    let mut bytes = writer
      .into_inner()
      .map_err(|e| CodecError::field("row", &e.to_string()))?;
    if bytes.last() == Some(&b'\n') {
      bytes.pop();
    }
    Ok(bytes)
  }
}

// ---------------------------------------------------------------------------
// Fraud (credit card transactions)
// ---------------------------------------------------------------------------

/// Raw transaction rows: `timestamp,transaction_id,is_cnp,amount_eur,card_pan,
/// card_exp_date,card_country,acquirer_country,terminal_id,merchant_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FraudCsvCodec;

impl EventCodec for FraudCsvCodec {
  fn decode(&self, payload: &[u8]) -> Result<Event, CodecError> {
    FRAUD_SCHEMA.decode(payload)
  }

  fn encode(&self, event: &Event) -> Result<Vec<u8>, CodecError> {
    FRAUD_SCHEMA.encode(event)
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FraudIdentity;

impl EventIdentity for FraudIdentity {
  fn id_of(&self, event: &Event) -> Option<String> {
    event
      .attr_str(ATTR_EVENT_ID)
      .or_else(|| event.attr_str(ATTR_TRANSACTION_ID))
  }
}

// ---------------------------------------------------------------------------
// Traffic (road sensor aggregated readings)
// ---------------------------------------------------------------------------

/// Raw sensor rows: `timestamp,location,lane,occupancy,vehicle_count,average_speed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficCsvCodec;

impl EventCodec for TrafficCsvCodec {
  fn decode(&self, payload: &[u8]) -> Result<Event, CodecError> {
    TRAFFIC_SCHEMA.decode(payload)
  }

  fn encode(&self, event: &Event) -> Result<Vec<u8>, CodecError> {
    TRAFFIC_SCHEMA.encode(event)
  }
}

/// Readings are identified by `<location>_<lane>_<timestamp>` (sensor clock text).
#[derive(Debug, Clone, Copy, Default)]
pub struct TrafficIdentity;

impl EventIdentity for TrafficIdentity {
  fn id_of(&self, event: &Event) -> Option<String> {
    if let Some(id) = event.attr_str(ATTR_EVENT_ID) {
      return Some(id);
    }
    let location = event.attr_str(ATTR_LOCATION)?;
    let lane = event.attr_str(ATTR_LANE)?;
    let timestamp = event.attr_str(ATTR_TIMESTAMP)?;
    Some(format!("{}_{}_{}", location, lane, timestamp))
  }
}

impl UseCase {
  /// Decoder for this use case's raw input events.
  pub fn codec(self) -> Box<dyn EventCodec> {
    match self {
      Self::Fraud => Box::new(FraudCsvCodec),
      Self::Traffic => Box::new(TrafficCsvCodec),
    }
  }

  pub fn identity(self) -> Box<dyn EventIdentity> {
    match self {
      Self::Fraud => Box::new(FraudIdentity),
      Self::Traffic => Box::new(TrafficIdentity),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fraud_row_decodes_typed_attributes() {
    let row = b"1431592200000,t-17,1,42.50,5500000000000004,12/17,620,826,term-9,m-3";
    let event = FraudCsvCodec.decode(row).unwrap();
    assert_eq!(event.name, "Transaction");
    assert_eq!(event.timestamp, 1_431_592_200_000);
    assert_eq!(event.attributes["is_cnp"], Value::Bool(true));
    assert_eq!(event.attributes["card_country"], Value::from(620));
    assert_eq!(event.attributes["amount_eur"], Value::from(42.5));
    assert!(!event.attributes.contains_key(ATTR_TIMESTAMP));
    assert_eq!(FraudIdentity.id_of(&event).as_deref(), Some("t-17"));
  }

  #[test]
  fn fraud_row_needs_transaction_id() {
    let err = FraudCsvCodec.decode(b"1431592200000").unwrap_err();
    assert!(err.to_string().contains("at least 2 columns"));
  }

  #[test]
  fn fraud_row_rejects_bad_number() {
    let err = FraudCsvCodec.decode(b"1,t-1,1,lots").unwrap_err();
    assert!(err.to_string().contains("amount_eur"));
  }

  #[test]
  fn fraud_encode_trims_trailing_empty_columns() {
    let event = Event::new("Transaction", 7)
      .with_attr(ATTR_TRANSACTION_ID, "t-1")
      .with_attr("is_cnp", false);
    let bytes = FraudCsvCodec.encode(&event).unwrap();
    assert_eq!(bytes, b"7,t-1,0");
    assert_eq!(FraudCsvCodec.decode(&bytes).unwrap(), event);
  }

  #[test]
  fn event_id_attribute_wins() {
    let event = Event::new("Transaction", 1)
      .with_attr(ATTR_EVENT_ID, "e-1")
      .with_attr(ATTR_TRANSACTION_ID, "t-1");
    assert_eq!(FraudIdentity.id_of(&event).as_deref(), Some("e-1"));
    assert_eq!(TrafficIdentity.id_of(&event).as_deref(), Some("e-1"));
  }

  #[test]
  fn traffic_identity_joins_location_lane_and_clock() {
    let event = TrafficCsvCodec
      .decode(b"2014-04-13 08:00:00,0024a4dc00003356,fast,0.12,9,87.5")
      .unwrap();
    assert_eq!(event.name, "AggregatedSensorRead");
    assert_eq!(event.timestamp, 1_397_376_000_000);
    assert_eq!(
      TrafficIdentity.id_of(&event).as_deref(),
      Some("0024a4dc00003356_fast_2014-04-13 08:00:00")
    );
    assert_eq!(TrafficIdentity.type_of(&event), "AggregatedSensorRead");
  }

  #[test]
  fn traffic_encode_keeps_sensor_clock_text() {
    let row: &[u8] = b"2014-04-13 08:00:00,0024a4dc00003356,fast,0.12,9,87.5";
    let event = TrafficCsvCodec.decode(row).unwrap();
    let bytes = TrafficCsvCodec.encode(&event).unwrap();
    assert_eq!(bytes, row);
    let again = TrafficCsvCodec.decode(&bytes).unwrap();
    assert_eq!(again, event);
    assert_eq!(TrafficIdentity.id_of(&again), TrafficIdentity.id_of(&event));
  }

  #[test]
  fn traffic_encode_without_clock_text_uses_timestamp() {
    let event = Event::new("AggregatedSensorRead", 1000)
      .with_attr(ATTR_LOCATION, "loc")
      .with_attr(ATTR_LANE, "slow");
    assert_eq!(TrafficCsvCodec.encode(&event).unwrap(), b"1000,loc,slow");
  }

  #[test]
  fn traffic_identity_needs_all_parts() {
    let event = Event::new("AggregatedSensorRead", 1).with_attr(ATTR_LOCATION, "l");
    assert_eq!(TrafficIdentity.id_of(&event), None);
  }

  #[test]
  fn sensor_time_formats() {
    assert_eq!(parse_sensor_time("1000"), Some(1000));
    assert_eq!(parse_sensor_time("1970-01-01T00:00:01Z"), Some(1000));
    assert_eq!(parse_sensor_time("1970-01-01 00:00:02"), Some(2000));
    assert_eq!(parse_sensor_time("yesterday"), None);
  }

  #[test]
  fn use_case_builds_matching_codec() {
    let event = UseCase::Traffic.codec().decode(b"1000,loc,slow").unwrap();
    assert_eq!(
      UseCase::Traffic.identity().id_of(&event).as_deref(),
      Some("loc_slow_1000")
    );
    let event = UseCase::Fraud.codec().decode(b"1000,t-9").unwrap();
    assert_eq!(UseCase::Fraud.identity().id_of(&event).as_deref(), Some("t-9"));
  }
}
