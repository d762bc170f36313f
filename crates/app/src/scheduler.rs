//! Sun-Event Scheduler: keeps each cover's open/close triggers armed.
//!
//! Triggers are `sun event + offset`, or the configured fixed time when that
//! is earlier, always strictly in the future of the pass that armed them. A
//! trigger that fires is re-armed in the same pass. When astronomy fails the
//! previous triggers stay in place and the next housekeeping tick retries.
//!
//! Fixed times differ between workdays and other days. When the day kind
//! flips, pending triggers are re-armed with the other set of times.

use chrono::{Days, NaiveDate};

use shutterctl_domain::cover::CoverConfig;
use shutterctl_domain::error::SchedulingError;
use shutterctl_domain::runtime::CoverRuntimeState;
use shutterctl_domain::schedule::{self, MissedEventPolicy, TriggerKind};
use shutterctl_domain::time::Timestamp;

use crate::ports::SolarCalendar;

/// Days searched for the next trigger (polar regions may skip several).
const LOOKAHEAD_DAYS: u32 = 3;

/// Result of advancing a cover's triggers in one pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Advance {
    /// Trigger whose action applies in this pass.
    pub fired: Option<TriggerKind>,
    /// Triggers reached in this pass, all of which were consumed.
    pub consumed: Vec<TriggerKind>,
    /// Set when a trigger could not be re-armed.
    pub failure: Option<SchedulingError>,
}

/// Computes triggers from a [`SolarCalendar`].
pub struct SunScheduler<C> {
    calendar: C,
    policy: MissedEventPolicy,
}

impl<C: SolarCalendar> SunScheduler<C> {
    pub fn new(calendar: C, policy: MissedEventPolicy) -> Self {
        Self { calendar, policy }
    }

    #[must_use]
    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    #[must_use]
    pub fn policy(&self) -> MissedEventPolicy {
        self.policy
    }

    fn trigger_on(
        &self,
        config: &CoverConfig,
        kind: TriggerKind,
        date: NaiveDate,
        workday: bool,
    ) -> Result<Timestamp, SchedulingError> {
        let offset = match kind {
            TriggerKind::Open => config.sunrise_offset_minutes,
            TriggerKind::Close => config.sunset_offset_minutes,
        };
        let fixed = match config.fixed_time(kind, workday) {
            Some(time) => Some(self.calendar.local_time(date, time.time())?),
            None => None,
        };
        match self.calendar.sun_times(date) {
            Ok(sun) => Ok(schedule::trigger_on_day(kind, &sun, offset, fixed)),
            Err(err) => fixed.ok_or(err),
        }
    }

    /// Candidate triggers on the local dates `from..from+count`.
    fn candidates(
        &self,
        config: &CoverConfig,
        kind: TriggerKind,
        from: NaiveDate,
        count: u32,
        workday: bool,
    ) -> (Vec<Timestamp>, Option<SchedulingError>) {
        let mut found = Vec::new();
        let mut last_error = None;
        for date in (0..count).filter_map(|n| from.checked_add_days(Days::new(u64::from(n)))) {
            match self.trigger_on(config, kind, date, workday) {
                Ok(at) => found.push(at),
                Err(err) => last_error = Some(err),
            }
        }
        (found, last_error)
    }

    /// Next occurrence of `kind` strictly after `now`.
    ///
    /// # Errors
    ///
    /// Returns the last calendar error, or [`SchedulingError::NoTrigger`].
    pub fn next_trigger(
        &self,
        config: &CoverConfig,
        kind: TriggerKind,
        now: Timestamp,
        workday: bool,
    ) -> Result<Timestamp, SchedulingError> {
        let today = self.calendar.local_date(now);
        // yesterday is included: a negative offset can push its trigger past midnight
        let from = today.pred_opt().unwrap_or(today);
        let (found, error) = self.candidates(config, kind, from, LOOKAHEAD_DAYS + 1, workday);
        schedule::first_after(now, found).ok_or_else(|| {
            error.unwrap_or(SchedulingError::NoTrigger {
                days: LOOKAHEAD_DAYS,
            })
        })
    }

    /// Latest occurrence of `kind` at or before `now`, within the last day.
    #[must_use]
    pub fn previous_trigger(
        &self,
        config: &CoverConfig,
        kind: TriggerKind,
        now: Timestamp,
        workday: bool,
    ) -> Option<Timestamp> {
        let today = self.calendar.local_date(now);
        let from = today.pred_opt()?;
        let (found, _) = self.candidates(config, kind, from, 2, workday);
        schedule::last_at_or_before(now, found)
    }

    /// `scheduleNext`: both triggers strictly after `now`.
    ///
    /// # Errors
    ///
    /// Fails if either trigger cannot be computed.
    pub fn schedule_next(
        &self,
        config: &CoverConfig,
        now: Timestamp,
        workday: bool,
    ) -> Result<(Timestamp, Timestamp), SchedulingError> {
        Ok((
            self.next_trigger(config, TriggerKind::Open, now, workday)?,
            self.next_trigger(config, TriggerKind::Close, now, workday)?,
        ))
    }

    /// Force a recompute of both triggers; on failure the old ones stay.
    ///
    /// # Errors
    ///
    /// Returns the calendar failure.
    pub fn recalculate(
        &self,
        state: &mut CoverRuntimeState,
        config: &CoverConfig,
        now: Timestamp,
        workday: bool,
    ) -> Result<(), SchedulingError> {
        let (open, close) = self.schedule_next(config, now, workday)?;
        state.next_open = Some(open);
        state.next_close = Some(close);
        state.workday = Some(workday);
        Ok(())
    }

    /// Consume crossed triggers and re-arm them.
    ///
    /// On a cover's first pass, past triggers are handled by the
    /// [`MissedEventPolicy`]. Unarmed triggers (earlier failure) are armed
    /// without firing.
    pub fn advance(
        &self,
        state: &mut CoverRuntimeState,
        config: &CoverConfig,
        now: Timestamp,
        workday: bool,
    ) -> Advance {
        let mut result = Advance::default();
        let day_changed = state.workday.is_some_and(|armed| armed != workday);
        state.workday = Some(workday);

        if state.is_fresh() {
            if self.policy == MissedEventPolicy::Replay {
                result.fired = TriggerKind::ALL
                    .into_iter()
                    .filter_map(|kind| {
                        Some((kind, self.previous_trigger(config, kind, now, workday)?))
                    })
                    .max_by_key(|(_, at)| *at)
                    .map(|(kind, _)| kind);
            }
        } else {
            let (consumed, acting) = schedule::crossed(now, state.next_open, state.next_close);
            result.fired = acting;
            result.consumed = consumed;
        }

        for kind in TriggerKind::ALL {
            let slot = match kind {
                TriggerKind::Open => &mut state.next_open,
                TriggerKind::Close => &mut state.next_close,
            };
            let stale = slot.is_none_or(|at| at <= now);
            if !stale && !day_changed {
                continue;
            }
            match self.next_trigger(config, kind, now, workday) {
                Ok(at) => *slot = Some(at),
                Err(err) => {
                    // a fired trigger must not fire again on every pass
                    if stale {
                        *slot = None;
                    }
                    result.failure = Some(err);
                }
            }
        }
        result
    }
}
