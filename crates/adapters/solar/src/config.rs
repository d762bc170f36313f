//! Location configuration for the solar calendar.

use serde::Deserialize;

/// Where the covers are, and which wall clock fixed times refer to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Degrees north, negative for the southern hemisphere.
    pub latitude: f64,
    /// Degrees east, negative for the western hemisphere.
    pub longitude: f64,
    /// IANA timezone name (e.g. `"Europe/Berlin"`).
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            timezone: "UTC".to_string(),
        }
    }
}
