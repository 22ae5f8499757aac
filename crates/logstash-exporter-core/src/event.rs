//! Logstash event decoding (schema-tolerant, panic-free).
//!
//! A queue payload is a JSON object emitted by logstash. Only three fields are
//! consumed; everything else is ignored:
//! - `host`       : string, defaults to `"n/a"`
//! - `type`       : string, defaults to `"n/a"`
//! - `@timestamp` : RFC 3339 string, defaults to the arrival time
//!
//! A `host`/`type` of the wrong JSON type is a decode failure. A timestamp that
//! is missing or cannot be parsed never fails the event.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{ExporterError, Result};

/// Label value used when `host` or `type` is absent.
pub const NOT_AVAILABLE: &str = "n/a";

const FIELD_HOST: &str = "host";
const FIELD_TYPE: &str = "type";
const FIELD_TIMESTAMP: &str = "@timestamp";

/// Where an event's timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampOrigin {
    /// Parsed from `@timestamp`.
    Payload,
    /// `@timestamp` absent; arrival time used.
    Arrival,
    /// `@timestamp` present but unusable; arrival time used.
    Fallback,
}

/// One decoded log notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub host: String,
    /// Logstash event type (field name is `type` in JSON).
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub timestamp_origin: TimestampOrigin,
}

impl Event {
    /// Timestamp as whole Unix seconds, the `last_seen_event` gauge value.
    pub fn unix_seconds(&self) -> f64 {
        self.timestamp.timestamp() as f64
    }

    /// Seconds between the embedded timestamp and `now`. Negative when the
    /// producer's clock runs ahead of ours.
    pub fn latency_seconds(&self, now: DateTime<Utc>) -> f64 {
        let delta = now - self.timestamp;
        match delta.num_nanoseconds() {
            Some(ns) => ns as f64 / 1e9,
            None => delta.num_milliseconds() as f64 / 1e3,
        }
    }
}

/// Decode a raw queue payload. `now` is the arrival time used as the
/// timestamp fallback.
pub fn decode_event(payload: &str, now: DateTime<Utc>) -> Result<Event> {
    let obj: Map<String, Value> = serde_json::from_str(payload)
        .map_err(|e| ExporterError::Decode(format!("payload is not a json object: {e}")))?;

    let host = label_field(&obj, FIELD_HOST)?;
    let event_type = label_field(&obj, FIELD_TYPE)?;

    let (timestamp, timestamp_origin) = match obj.get(FIELD_TIMESTAMP) {
        None | Some(Value::Null) => (now, TimestampOrigin::Arrival),
        Some(Value::String(raw)) => match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => (ts.with_timezone(&Utc), TimestampOrigin::Payload),
            Err(e) => {
                tracing::warn!(timestamp=%raw, error=%e, "unable to parse event timestamp, using arrival time");
                (now, TimestampOrigin::Fallback)
            }
        },
        Some(other) => {
            tracing::warn!(timestamp=%other, "event timestamp is not a string, using arrival time");
            (now, TimestampOrigin::Fallback)
        }
    };

    Ok(Event {
        host,
        event_type,
        timestamp,
        timestamp_origin,
    })
}

fn label_field(obj: &Map<String, Value>, field: &'static str) -> Result<String> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(NOT_AVAILABLE.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ExporterError::FieldType { field }),
    }
}
