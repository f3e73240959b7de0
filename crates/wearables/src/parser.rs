//! Decoding of Nordic UART payloads into sensor values.
//!
//! Devices answer `READ_DATA` with newline separated JSON objects such as
//! `{"heart_rate": 72, "steps": 1200}`. Anything that is not a JSON object
//! is skipped, and a field seen in a later line replaces an earlier one.

use serde_json::{Map, Value};

use crate::models::ParsedReading;

pub fn parse_payloads<P: AsRef<[u8]>>(payloads: &[P]) -> ParsedReading {
    let mut reading = ParsedReading::default();
    for payload in payloads {
        let text = String::from_utf8_lossy(payload.as_ref());
        for line in text.lines() {
            if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(line.trim()) {
                merge(&mut reading, &fields);
            }
        }
    }
    reading
}

fn merge(reading: &mut ParsedReading, fields: &Map<String, Value>) {
    if let Some(value) = fields.get("heart_rate").and_then(integer) {
        reading.heart_rate = Some(value);
    }
    if let Some(value) = fields.get("steps").and_then(integer) {
        reading.steps = Some(value);
    }
    if let Some(value) = fields.get("temperature").and_then(Value::as_f64) {
        reading.temperature = Some(value);
    }
    if let Some(value) = fields.get("battery_level").and_then(integer) {
        reading.battery_level = Some(value);
    }
}

/// Integral value of a JSON number; fractional values are rounded.
fn integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|number| number.round() as i64))
}
