//! Trigger arithmetic for sun-based open/close events.
//!
//! Calendars (timezone, astronomy) live behind a port in the application
//! layer; this module only combines already-resolved instants.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Sunrise and sunset of one local date, as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: Timestamp,
    pub sunset: Timestamp,
}

/// Which of the two daily triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Sunrise-based, opens the cover.
    Open,
    /// Sunset-based, closes the cover.
    Close,
}

impl TriggerKind {
    pub const ALL: [Self; 2] = [Self::Open, Self::Close];
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Close => f.write_str("close"),
        }
    }
}

/// What to do with triggers that passed while the engine was not running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedEventPolicy {
    /// Roll past triggers to their next occurrence without firing.
    #[default]
    Skip,
    /// Fire the most recent missed trigger once, then roll forward.
    Replay,
}

/// Trigger instant on the day described by `sun`.
///
/// `fixed` is the configured wall-clock time resolved to that same day; the
/// earlier of the two wins.
#[must_use]
pub fn trigger_on_day(
    kind: TriggerKind,
    sun: &SunTimes,
    offset_minutes: i32,
    fixed: Option<Timestamp>,
) -> Timestamp {
    let event = match kind {
        TriggerKind::Open => sun.sunrise,
        TriggerKind::Close => sun.sunset,
    };
    let shifted = event + Duration::minutes(i64::from(offset_minutes));
    fixed.map_or(shifted, |fixed| fixed.min(shifted))
}

/// First candidate strictly after `now`.
#[must_use]
pub fn first_after(now: Timestamp, candidates: impl IntoIterator<Item = Timestamp>) -> Option<Timestamp> {
    candidates.into_iter().filter(|t| *t > now).min()
}

/// Latest candidate at or before `now`.
#[must_use]
pub fn last_at_or_before(
    now: Timestamp,
    candidates: impl IntoIterator<Item = Timestamp>,
) -> Option<Timestamp> {
    candidates.into_iter().filter(|t| *t <= now).max()
}

/// Which armed triggers `now` has reached, and which of them acts.
///
/// Both may be crossed in a single pass (long gap between passes); the later
/// one defines the action.
#[must_use]
pub fn crossed(
    now: Timestamp,
    next_open: Option<Timestamp>,
    next_close: Option<Timestamp>,
) -> (Vec<TriggerKind>, Option<TriggerKind>) {
    let hits: Vec<(TriggerKind, Timestamp)> = [
        (TriggerKind::Open, next_open),
        (TriggerKind::Close, next_close),
    ]
    .into_iter()
    .filter_map(|(kind, at)| at.filter(|at| *at <= now).map(|at| (kind, at)))
    .collect();
    let acting = hits.iter().max_by_key(|(_, at)| *at).map(|(kind, _)| *kind);
    (hits.into_iter().map(|(kind, _)| kind).collect(), acting)
}
