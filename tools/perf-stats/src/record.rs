//! Split captured log lines into timestamped, classified records.

use crate::codec::EventCodec;
use crate::error::StatsError;
use crate::types::{Encoding, LogRecord};

/// Separator between the capture timestamp and the payload.
pub const SEPARATOR: char = ':';

/// Parse one captured line: `<epoch ms>:<payload>`.
///
/// Returns `Ok(None)` for blank lines. The payload is classified as
/// [`Encoding::Structured`] when `structured` recognizes its shape.
pub fn parse_line(
  line_no: usize,
  line: &str,
  structured: &dyn EventCodec,
) -> Result<Option<LogRecord>, StatsError> {
  if line.trim().is_empty() {
    return Ok(None);
  }

  let (ts, payload) = line
    .split_once(SEPARATOR)
    .ok_or_else(|| StatsError::malformed(line_no, "missing ':' after timestamp"))?;

  let ts = ts.trim();
  let log_timestamp: i64 = ts
    .parse()
    .map_err(|_| StatsError::malformed(line_no, format!("invalid timestamp {:?}", ts)))?;

  let payload = payload.trim();
  let encoding = if structured.recognizes(payload.as_bytes()) {
    Encoding::Structured
  } else {
    Encoding::Raw
  };

  Ok(Some(LogRecord {
    line: line_no,
    log_timestamp,
    payload: payload.to_string(),
    encoding,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec::JsonEventCodec;

  fn parse(line: &str) -> Result<Option<LogRecord>, StatsError> {
    parse_line(3, line, &JsonEventCodec::default())
  }

  #[test]
  fn raw_payload() {
    let record = parse("1431592200100:1431592200000,t-1,1").unwrap().unwrap();
    assert_eq!(record.log_timestamp, 1_431_592_200_100);
    assert_eq!(record.payload, "1431592200000,t-1,1");
    assert_eq!(record.encoding, Encoding::Raw);
    assert_eq!(record.line, 3);
  }

  #[test]
  fn structured_payload_keeps_inner_colons() {
    let record = parse(" 250 : {\"name\":\"X\",\"timestamp\":1}").unwrap().unwrap();
    assert_eq!(record.log_timestamp, 250);
    assert_eq!(record.payload, "{\"name\":\"X\",\"timestamp\":1}");
    assert_eq!(record.encoding, Encoding::Structured);
  }

  #[test]
  fn blank_line_is_skipped() {
    assert!(parse("   ").unwrap().is_none());
  }

  #[test]
  fn bad_timestamp_is_malformed() {
    let err = parse("12a:payload").unwrap_err();
    assert!(matches!(err, StatsError::MalformedRecord { line: 3, .. }));
    assert!(err.to_string().contains("invalid timestamp"));
  }

  #[test]
  fn missing_separator_is_malformed() {
    let err = parse("1431592200100").unwrap_err();
    assert!(err.to_string().contains("missing ':'"));
  }

  #[test]
  fn negative_timestamp_is_accepted() {
    let record = parse("-5:x").unwrap().unwrap();
    assert_eq!(record.log_timestamp, -5);
  }
}
