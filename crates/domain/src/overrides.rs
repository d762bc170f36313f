//! Time-bounded overrides that suppress automated movement.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::cover::MAX_OVERRIDE_MINUTES;
use crate::error::ConfigurationError;
use crate::position::Position;
use crate::time::Timestamp;

/// Why automation is currently suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    /// A person moved the cover or asked for a hold.
    Manual,
    /// Shading armed a hold so schedules do not undo it mid-window.
    Shading,
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Shading => f.write_str("shading"),
        }
    }
}

/// An active hold on a cover. At most one per cover; a new one replaces the old.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub kind: OverrideKind,
    pub until: Timestamp,
    /// Position to hold while the override lasts, if any was requested.
    pub position: Option<Position>,
}

impl Override {
    #[must_use]
    pub fn new(kind: OverrideKind, now: Timestamp, duration: Duration) -> Self {
        Self {
            kind,
            until: now + duration,
            position: None,
        }
    }

    #[must_use]
    pub fn holding(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Active strictly before `until`.
    #[must_use]
    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.until
    }

    /// Time left, zero once expired.
    #[must_use]
    pub fn remaining(&self, now: Timestamp) -> Duration {
        (self.until - now).max(Duration::zero())
    }
}

/// Validate a requested override length in minutes and clamp it to one day.
///
/// # Errors
///
/// Returns [`ConfigurationError::NonPositiveDuration`] for zero or negative values.
pub fn override_duration(minutes: i64) -> Result<Duration, ConfigurationError> {
    if minutes <= 0 {
        return Err(ConfigurationError::NonPositiveDuration);
    }
    Ok(Duration::minutes(minutes.min(i64::from(MAX_OVERRIDE_MINUTES))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::minutes;

    fn ts() -> Timestamp {
        "2026-06-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn should_be_active_until_expiry_exclusive() {
        let hold = Override::new(OverrideKind::Manual, ts(), minutes(30));
        assert!(hold.is_active(ts()));
        assert!(hold.is_active(ts() + minutes(29)));
        assert!(!hold.is_active(ts() + minutes(30)));
    }

    #[test]
    fn should_report_zero_remaining_after_expiry() {
        let hold = Override::new(OverrideKind::Shading, ts(), minutes(10));
        assert_eq!(hold.remaining(ts() + minutes(4)), minutes(6));
        assert_eq!(hold.remaining(ts() + minutes(40)), Duration::zero());
    }

    #[test]
    fn should_reject_non_positive_duration() {
        assert_eq!(
            override_duration(0),
            Err(ConfigurationError::NonPositiveDuration)
        );
        assert!(override_duration(-5).is_err());
    }

    #[test]
    fn should_clamp_duration_to_one_day() {
        assert_eq!(override_duration(5000).unwrap(), Duration::hours(24));
        assert_eq!(override_duration(30).unwrap(), minutes(30));
    }

    #[test]
    fn should_keep_held_position() {
        let p = Position::new(40).unwrap();
        let hold = Override::new(OverrideKind::Manual, ts(), minutes(5)).holding(p);
        assert_eq!(hold.position, Some(p));
    }
}
