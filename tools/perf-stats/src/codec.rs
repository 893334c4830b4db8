//! Pluggable event codecs and the pipeline's self-describing JSON encoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ContributorKeys;
use crate::error::CodecError;
use crate::types::{Contributors, Event};

/// Turns one payload into an [`Event`] and back.
///
/// Instances are built per run and handed to the engine; nothing here is
/// shared between runs.
pub trait EventCodec {
  fn decode(&self, payload: &[u8]) -> Result<Event, CodecError>;

  fn encode(&self, event: &Event) -> Result<Vec<u8>, CodecError>;

  /// Whether `payload` has the shape this codec decodes.
  fn recognizes(&self, _payload: &[u8]) -> bool {
    false
  }
}

/// Interpret a JSON value as epoch milliseconds (native integer or numeric text).
pub fn millis(value: &Value) -> Option<i64> {
  match value {
    Value::Number(n) => n
      .as_i64()
      .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

#[derive(Deserialize)]
struct WireEvent {
  name: String,
  #[serde(default)]
  timestamp: Value,
  #[serde(default)]
  attributes: Map<String, Value>,
}

#[derive(Serialize)]
struct WireEventRef<'a> {
  name: &'a str,
  timestamp: i64,
  attributes: Map<String, Value>,
}

/// Decoder for events emitted by the pipeline runtime:
/// `{"name": .., "timestamp": .., "attributes": {..}}`.
///
/// Contributor attributes are lifted out of `attributes` into
/// [`Contributors`], with their timestamps normalized to `i64`.
#[derive(Debug, Clone, Default)]
pub struct JsonEventCodec {
  keys: ContributorKeys,
}

impl JsonEventCodec {
  pub fn new(keys: ContributorKeys) -> Self {
    Self { keys }
  }

  fn contributor_ids(&self, value: Option<Value>) -> Result<Vec<String>, CodecError> {
    let items = match value {
      None | Some(Value::Null) => return Ok(Vec::new()),
      Some(Value::Array(items)) => items,
      Some(_) => return Err(CodecError::field(&self.keys.ids, "expected an array")),
    };
    items
      .into_iter()
      .map(|item| match item {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(CodecError::field(&self.keys.ids, "expected string or number ids")),
      })
      .collect()
  }

  fn contributor_timestamps(&self, value: Option<Value>) -> Result<Vec<i64>, CodecError> {
    let items = match value {
      None | Some(Value::Null) => return Ok(Vec::new()),
      Some(Value::Array(items)) => items,
      Some(_) => return Err(CodecError::field(&self.keys.timestamps, "expected an array")),
    };
    items
      .iter()
      .map(|item| {
        millis(item).ok_or_else(|| {
          CodecError::field(&self.keys.timestamps, &format!("not an integer timestamp: {}", item))
        })
      })
      .collect()
  }
}

impl EventCodec for JsonEventCodec {
  fn decode(&self, payload: &[u8]) -> Result<Event, CodecError> {
    let wire: WireEvent = serde_json::from_slice(payload)?;
    let timestamp = millis(&wire.timestamp)
      .ok_or_else(|| CodecError::field("timestamp", "expected integer milliseconds"))?;

    let mut attributes = wire.attributes;
    let ids = attributes.remove(&self.keys.ids);
    let timestamps = attributes.remove(&self.keys.timestamps);

    let contributors = if ids.is_none() && timestamps.is_none() {
      None
    } else {
      Some(Contributors {
        ids: self.contributor_ids(ids)?,
        timestamps: self.contributor_timestamps(timestamps)?,
      })
    };

    Ok(Event {
      name: wire.name,
      timestamp,
      attributes,
      contributors,
    })
  }

  fn encode(&self, event: &Event) -> Result<Vec<u8>, CodecError> {
    let mut attributes = event.attributes.clone();
    if let Some(c) = &event.contributors {
      attributes.insert(
        self.keys.ids.clone(),
        Value::Array(c.ids.iter().cloned().map(Value::String).collect()),
      );
      attributes.insert(
        self.keys.timestamps.clone(),
        Value::Array(c.timestamps.iter().map(|&t| Value::from(t)).collect()),
      );
    }
    let wire = WireEventRef {
      name: &event.name,
      timestamp: event.timestamp,
      attributes,
    };
    Ok(serde_json::to_vec(&wire)?)
  }

  fn recognizes(&self, payload: &[u8]) -> bool {
    payload.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'{')
  }
}
