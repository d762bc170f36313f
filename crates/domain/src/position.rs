//! Cover position: a percentage in `0..=100`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Position of a cover, `0..=100`.
///
/// The numeric direction of "open" is not assumed: each cover declares its
/// own open and close positions, and closing is measured against those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Position(u8);

impl Position {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(100);

    /// Build a position, rejecting values outside `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::PositionOutOfRange`].
    pub fn new(value: i64) -> Result<Self, ConfigurationError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ConfigurationError::PositionOutOfRange(value))
    }

    /// Build a position, clamping into range.
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        // NaN falls through to MIN
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rounded = value.round().clamp(0.0, 100.0) as u8;
        Self(rounded)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Absolute distance between two positions.
    #[must_use]
    pub fn distance(self, other: Self) -> u8 {
        self.0.abs_diff(other.0)
    }
}

impl TryFrom<i64> for Position {
    type Error = ConfigurationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Position> for u8 {
    fn from(value: Position) -> Self {
        value.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
