//! Sensor values and the per-pass snapshot the rules read.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::position::Position;
use crate::time::Timestamp;

/// Logical role an external signal plays for a cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorRole {
    Presence,
    WindSpeed,
    Brightness,
    SunElevation,
    SunAzimuth,
    /// Outdoor temperature.
    Temperature,
    IndoorTemperature,
    TemperatureForecast,
    Workday,
    /// On while the resident sleeps.
    Resident,
    /// Window/door contact; a cover may map several.
    Contact,
    /// The cover's own reported position.
    Position,
}

impl fmt::Display for SensorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Presence => "presence",
            Self::WindSpeed => "wind_speed",
            Self::Brightness => "brightness",
            Self::SunElevation => "sun_elevation",
            Self::SunAzimuth => "sun_azimuth",
            Self::Temperature => "temperature",
            Self::IndoorTemperature => "indoor_temperature",
            Self::TemperatureForecast => "temperature_forecast",
            Self::Workday => "workday",
            Self::Resident => "resident",
            Self::Contact => "contact",
            Self::Position => "position",
        };
        f.write_str(name)
    }
}

/// Whether the source currently reports a usable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable,
}

/// A raw value pushed by a sensor source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

const TRUTHY: [&str; 9] = [
    "on", "open", "opening", "true", "home", "yes", "detected", "occupied", "playing",
];
const UNAVAILABLE: [&str; 3] = ["unavailable", "unknown", "none"];

impl SensorValue {
    /// Numeric interpretation, if any.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Boolean interpretation (`on`, `open`, `home`, non-zero, …).
    #[must_use]
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Flag(flag) => *flag,
            #[allow(clippy::float_cmp)]
            Self::Number(n) => *n != 0.0,
            Self::Text(text) => {
                let lowered = text.trim().to_ascii_lowercase();
                TRUTHY.contains(&lowered.as_str())
            }
        }
    }
}

/// Latest value of one source together with its availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub value: SensorValue,
    pub availability: Availability,
    pub timestamp: Timestamp,
}

impl SensorReading {
    #[must_use]
    pub fn new(value: SensorValue, availability: Availability, timestamp: Timestamp) -> Self {
        Self {
            value,
            availability,
            timestamp,
        }
    }

    /// Interpret a plain-text state the way the platform reports it.
    ///
    /// `unavailable`/`unknown`/empty become [`Availability::Unavailable`];
    /// numbers become [`SensorValue::Number`]; anything else is kept as text.
    #[must_use]
    pub fn from_raw(raw: &str, timestamp: Timestamp) -> Self {
        let trimmed = raw.trim();
        let lowered = trimmed.to_ascii_lowercase();
        if trimmed.is_empty() || UNAVAILABLE.contains(&lowered.as_str()) {
            return Self::new(
                SensorValue::Text(trimmed.to_string()),
                Availability::Unavailable,
                timestamp,
            );
        }
        let value = match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => SensorValue::Number(n),
            _ => SensorValue::Text(trimmed.to_string()),
        };
        Self::new(value, Availability::Available, timestamp)
    }

    /// The value, unless unavailable or older than `max_age`.
    #[must_use]
    pub fn usable(&self, now: Timestamp, max_age: Option<Duration>) -> Option<&SensorValue> {
        if self.availability == Availability::Unavailable {
            return None;
        }
        if let Some(max_age) = max_age
            && now - self.timestamp > max_age
        {
            return None;
        }
        Some(&self.value)
    }
}

/// Snapshot of every signal a cover's rules may read, taken once per pass.
///
/// `None` means the signal is not configured, unavailable or stale; rules
/// depending on it are treated as not triggered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    pub presence: Option<bool>,
    pub wind_speed: Option<f64>,
    pub brightness: Option<f64>,
    pub sun_elevation: Option<f64>,
    pub sun_azimuth: Option<f64>,
    pub temperature: Option<f64>,
    pub indoor_temperature: Option<f64>,
    pub temperature_forecast: Option<f64>,
    pub workday: Option<bool>,
    pub resident_asleep: Option<bool>,
    /// `Some(true)` if any usable contact reports open.
    pub contact_open: Option<bool>,
    pub current_position: Option<Position>,
}

impl SensorSnapshot {
    /// True only when a contact is known to be open.
    #[must_use]
    pub fn any_contact_open(&self) -> bool {
        self.contact_open == Some(true)
    }

    /// Days count as workdays unless a workday source says otherwise.
    #[must_use]
    pub fn is_workday(&self) -> bool {
        self.workday.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::minutes;

    fn ts() -> Timestamp {
        "2026-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn should_parse_numeric_raw_state() {
        let r = SensorReading::from_raw(" 12.5 ", ts());
        assert_eq!(r.value, SensorValue::Number(12.5));
        assert_eq!(r.availability, Availability::Available);
    }

    #[test]
    fn should_mark_unavailable_raw_state() {
        for raw in ["unavailable", "Unknown", ""] {
            let r = SensorReading::from_raw(raw, ts());
            assert_eq!(r.availability, Availability::Unavailable, "raw={raw}");
        }
    }

    #[test]
    fn should_interpret_open_states_as_true() {
        for raw in ["on", "OPEN", "home", "true"] {
            assert!(SensorValue::Text(raw.to_string()).as_bool(), "raw={raw}");
        }
        assert!(!SensorValue::Text("off".to_string()).as_bool());
        assert!(!SensorValue::Text("closed".to_string()).as_bool());
        assert!(SensorValue::Number(1.0).as_bool());
        assert!(!SensorValue::Number(0.0).as_bool());
    }

    #[test]
    fn should_not_read_flag_as_number() {
        assert_eq!(SensorValue::Flag(true).as_f64(), None);
        assert_eq!(SensorValue::Text("7".to_string()).as_f64(), Some(7.0));
    }

    #[test]
    fn should_hide_unavailable_value() {
        let r = SensorReading::new(SensorValue::Number(3.0), Availability::Unavailable, ts());
        assert!(r.usable(ts(), None).is_none());
    }

    #[test]
    fn should_hide_stale_value_when_max_age_exceeded() {
        let r = SensorReading::new(SensorValue::Number(3.0), Availability::Available, ts());
        let later = ts() + minutes(31);
        assert!(r.usable(later, Some(minutes(30))).is_none());
        assert!(r.usable(later, None).is_some());
        assert!(r.usable(ts() + minutes(10), Some(minutes(30))).is_some());
    }

    #[test]
    fn should_report_contact_open_only_when_known() {
        let mut snap = SensorSnapshot::default();
        assert!(!snap.any_contact_open());
        snap.contact_open = Some(false);
        assert!(!snap.any_contact_open());
        snap.contact_open = Some(true);
        assert!(snap.any_contact_open());
    }

    #[test]
    fn should_assume_workday_without_workday_source() {
        let mut snap = SensorSnapshot::default();
        assert!(snap.is_workday());
        snap.workday = Some(false);
        assert!(!snap.is_workday());
    }
}
