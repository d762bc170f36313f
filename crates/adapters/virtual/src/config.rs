//! Virtual integration configuration.

use serde::Deserialize;

/// Configuration for the simulated covers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    /// Whether simulated covers receive commands.
    pub enabled: bool,
    /// Seconds a simulated cover takes to reach its target.
    pub travel_secs: u64,
    /// Position reported for every configured cover on start, if any.
    pub initial_position: Option<u8>,
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            travel_secs: 0,
            initial_position: None,
        }
    }
}
