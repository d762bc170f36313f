//! Mutable per-cover state owned by the engine.

use serde::Serialize;

use crate::overrides::Override;
use crate::position::Position;
use crate::reason::ReasonCode;
use crate::time::Timestamp;

/// Runtime state of one cover, created on first evaluation and dropped
/// when the cover leaves the configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverRuntimeState {
    pub last_commanded: Option<Position>,
    pub last_commanded_at: Option<Timestamp>,
    /// The last command was not delivered; the cover still sits where it was.
    pub delivery_pending: bool,
    pub last_reason: ReasonCode,
    /// Kind and expiry live together so neither can be set without the other.
    pub hold: Option<Override>,
    pub next_open: Option<Timestamp>,
    pub next_close: Option<Timestamp>,
    /// Day kind the fixed trigger times were armed for.
    pub workday: Option<bool>,
    pub last_evaluated: Option<Timestamp>,
}

impl CoverRuntimeState {
    /// The override, if still active at `now`.
    #[must_use]
    pub fn active_override(&self, now: Timestamp) -> Option<&Override> {
        self.hold.as_ref().filter(|hold| hold.is_active(now))
    }

    /// Drop the override once `now ≥ until`. Returns the expired override.
    pub fn expire_override(&mut self, now: Timestamp) -> Option<Override> {
        if self.hold.is_some_and(|hold| !hold.is_active(now)) {
            return self.hold.take();
        }
        None
    }

    /// Whether the cover is in its day phase: the next close comes before the
    /// next open. `None` while triggers are not armed yet.
    #[must_use]
    pub fn is_day(&self) -> Option<bool> {
        match (self.next_open, self.next_close) {
            (Some(open), Some(close)) => Some(close < open),
            _ => None,
        }
    }

    /// True before the first evaluation pass.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.last_evaluated.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::OverrideKind;
    use crate::time::minutes;

    fn ts() -> Timestamp {
        "2026-03-10T08:00:00Z".parse().unwrap()
    }

    #[test]
    fn should_clear_override_atomically_when_expired() {
        let mut state = CoverRuntimeState {
            hold: Some(Override::new(OverrideKind::Manual, ts(), minutes(1))),
            ..CoverRuntimeState::default()
        };
        assert!(state.expire_override(ts()).is_none());
        assert!(state.hold.is_some());

        let expired = state.expire_override(ts() + minutes(1));
        assert_eq!(expired.map(|o| o.kind), Some(OverrideKind::Manual));
        assert!(state.hold.is_none());
        assert!(state.active_override(ts()).is_none());
    }

    #[test]
    fn should_report_day_when_close_comes_first() {
        let state = CoverRuntimeState {
            next_open: Some(ts() + minutes(20 * 60)),
            next_close: Some(ts() + minutes(11 * 60)),
            ..CoverRuntimeState::default()
        };
        assert_eq!(state.is_day(), Some(true));
    }

    #[test]
    fn should_report_unknown_phase_when_triggers_missing() {
        assert_eq!(CoverRuntimeState::default().is_day(), None);
        assert!(CoverRuntimeState::default().is_fresh());
    }
}
