//! Per-cover timer arena.
//!
//! Each cover owns at most three deadlines: the next open trigger, the next
//! close trigger and its override expiry. Firing pops the cover's entry, the
//! evaluation that follows re-arms it from the updated state. Removing a
//! cover drops all of its timers at once.

use std::collections::HashMap;

use shutterctl_domain::id::CoverId;
use shutterctl_domain::runtime::CoverRuntimeState;
use shutterctl_domain::time::Timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CoverTimers {
    open: Option<Timestamp>,
    close: Option<Timestamp>,
    override_expiry: Option<Timestamp>,
}

impl CoverTimers {
    fn earliest(&self) -> Option<Timestamp> {
        [self.open, self.close, self.override_expiry]
            .into_iter()
            .flatten()
            .min()
    }
}

#[derive(Debug, Default)]
pub struct TimerSet {
    covers: HashMap<CoverId, CoverTimers>,
}

impl TimerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re-)arm the timers of `cover` from its runtime state.
    pub fn arm(&mut self, cover: &CoverId, state: &CoverRuntimeState) {
        let timers = CoverTimers {
            open: state.next_open,
            close: state.next_close,
            override_expiry: state.hold.map(|hold| hold.until),
        };
        if timers.earliest().is_some() {
            self.covers.insert(cover.clone(), timers);
        } else {
            self.covers.remove(cover);
        }
    }

    /// Drop every timer of `cover`.
    pub fn cancel(&mut self, cover: &CoverId) {
        self.covers.remove(cover);
    }

    /// Earliest deadline across all covers.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.covers.values().filter_map(CoverTimers::earliest).min()
    }

    /// Remove and return every cover with a deadline at or before `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Vec<CoverId> {
        let mut due: Vec<CoverId> = self
            .covers
            .iter()
            .filter(|(_, timers)| timers.earliest().is_some_and(|at| at <= now))
            .map(|(cover, _)| cover.clone())
            .collect();
        for cover in &due {
            self.covers.remove(cover);
        }
        due.sort();
        due
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.covers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.covers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterctl_domain::overrides::{Override, OverrideKind};
    use shutterctl_domain::time::minutes;

    fn ts() -> Timestamp {
        "2026-04-01T12:00:00Z".parse().unwrap()
    }

    fn state(open: i64, close: i64) -> CoverRuntimeState {
        CoverRuntimeState {
            next_open: Some(ts() + minutes(open)),
            next_close: Some(ts() + minutes(close)),
            ..CoverRuntimeState::default()
        }
    }

    #[test]
    fn should_expose_earliest_deadline_across_covers() {
        let mut timers = TimerSet::new();
        timers.arm(&"cover.a".into(), &state(600, 300));
        timers.arm(&"cover.b".into(), &state(120, 400));
        assert_eq!(timers.next_deadline(), Some(ts() + minutes(120)));
    }

    #[test]
    fn should_include_override_expiry() {
        let mut timers = TimerSet::new();
        let mut s = state(600, 300);
        s.hold = Some(Override::new(OverrideKind::Manual, ts(), minutes(15)));
        timers.arm(&"cover.a".into(), &s);
        assert_eq!(timers.next_deadline(), Some(ts() + minutes(15)));
    }

    #[test]
    fn should_pop_due_covers_only() {
        let mut timers = TimerSet::new();
        timers.arm(&"cover.a".into(), &state(10, 300));
        timers.arm(&"cover.b".into(), &state(120, 400));
        let due = timers.pop_due(ts() + minutes(10));
        assert_eq!(due, vec![CoverId::new("cover.a")]);
        assert_eq!(timers.len(), 1);
        assert!(timers.pop_due(ts() + minutes(10)).is_empty());
    }

    #[test]
    fn should_drop_all_timers_when_cover_cancelled() {
        let mut timers = TimerSet::new();
        timers.arm(&"cover.a".into(), &state(10, 300));
        timers.cancel(&"cover.a".into());
        assert!(timers.is_empty());
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn should_replace_timers_on_rearm() {
        let mut timers = TimerSet::new();
        timers.arm(&"cover.a".into(), &state(10, 300));
        timers.arm(&"cover.a".into(), &state(900, 800));
        assert_eq!(timers.next_deadline(), Some(ts() + minutes(800)));
    }
}
