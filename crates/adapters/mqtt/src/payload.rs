//! Sensor payload decoding and command encoding.

use serde::Deserialize;

use shutterctl_domain::position::Position;
use shutterctl_domain::sensor::{Availability, SensorReading, SensorValue};
use shutterctl_domain::time::Timestamp;

use crate::error::MqttError;

#[derive(Debug, Deserialize)]
struct JsonReading {
    #[serde(default)]
    value: Option<SensorValue>,
    #[serde(default = "available_by_default")]
    available: bool,
}

fn available_by_default() -> bool {
    true
}

/// Decode a sensor payload.
///
/// A JSON object is read as `{"value": …, "available": …}`; anything else is
/// treated as the raw state string.
///
/// # Errors
///
/// Returns [`MqttError`] for non UTF-8 payloads or malformed JSON objects.
pub fn decode_reading(payload: &[u8], now: Timestamp) -> Result<SensorReading, MqttError> {
    let text = std::str::from_utf8(payload).map_err(MqttError::PayloadEncoding)?;
    if !text.trim_start().starts_with('{') {
        return Ok(SensorReading::from_raw(text, now));
    }

    let json: JsonReading = serde_json::from_str(text).map_err(MqttError::PayloadParse)?;
    let reading = match json.value {
        Some(SensorValue::Text(raw)) if json.available => SensorReading::from_raw(&raw, now),
        Some(value) if json.available => SensorReading::new(value, Availability::Available, now),
        value => SensorReading::new(
            value.unwrap_or_else(|| SensorValue::Text(String::new())),
            Availability::Unavailable,
            now,
        ),
    };
    Ok(reading)
}

/// Encode a move command as a plain integer.
#[must_use]
pub fn encode_position(position: Position) -> Vec<u8> {
    position.value().to_string().into_bytes()
}
