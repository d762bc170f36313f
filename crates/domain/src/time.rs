//! Time and timestamp helpers.

use std::fmt;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// UTC timestamp used for triggers, override expiry, sensor readings, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// A signed number of minutes as a [`Duration`].
#[must_use]
pub fn minutes(value: i64) -> Duration {
    Duration::minutes(value)
}

/// Parse a wall-clock time in `HH:MM` or `HH:MM:SS` form.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidTime`] when neither form matches.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ConfigurationError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| ConfigurationError::InvalidTime(value.to_string()))
}

/// A local wall-clock time of day, written `HH:MM` or `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    #[must_use]
    pub fn new(time: NaiveTime) -> Self {
        Self(time)
    }

    #[must_use]
    pub fn time(self) -> NaiveTime {
        self.0
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_time_of_day(&value).map(Self)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}
