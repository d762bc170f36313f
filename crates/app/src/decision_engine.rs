//! Decision Engine: one evaluation pass for one cover.
//!
//! A pass expires stale overrides, notices manual moves, advances the sun
//! triggers, runs the rule cascade and applies the verdict's override effect.
//! It never talks to the outside world; the dispatcher does that.

use chrono::Duration;

use shutterctl_domain::cover::CoverConfig;
use shutterctl_domain::rules::{self, Effect, EvaluationContext, Verdict};
use shutterctl_domain::runtime::CoverRuntimeState;
use shutterctl_domain::schedule::TriggerKind;
use shutterctl_domain::sensor::SensorSnapshot;
use shutterctl_domain::time::Timestamp;

use crate::override_manager::OverrideManager;
use crate::ports::SolarCalendar;
use crate::scheduler::SunScheduler;

/// How long a trigger held back by sun or brightness waits before retrying.
pub const DEFER_RETRY: Duration = Duration::seconds(60);

/// Evaluates covers against their sensors, overrides and schedule.
pub struct DecisionEngine<C> {
    scheduler: SunScheduler<C>,
    overrides: OverrideManager,
}

impl<C: SolarCalendar> DecisionEngine<C> {
    pub fn new(scheduler: SunScheduler<C>) -> Self {
        Self {
            scheduler,
            overrides: OverrideManager,
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> &SunScheduler<C> {
        &self.scheduler
    }

    /// Run one pass and return `(target, reason)` plus the applied effect.
    pub fn evaluate(
        &self,
        config: &CoverConfig,
        state: &mut CoverRuntimeState,
        sensors: &SensorSnapshot,
        now: Timestamp,
    ) -> Verdict {
        if let Some(expired) = self.overrides.expire(state, now) {
            tracing::debug!(cover = %config.id, kind = %expired.kind, "override expired");
        }
        self.overrides
            .detect_manual_movement(state, config, sensors.current_position, now);

        let advance = self
            .scheduler
            .advance(state, config, now, sensors.is_workday());
        if let Some(err) = &advance.failure {
            tracing::warn!(cover = %config.id, error = %err, "sun triggers could not be armed");
        }
        for kind in &advance.consumed {
            tracing::debug!(cover = %config.id, trigger = %kind, "trigger consumed");
        }

        let verdict = rules::evaluate(&EvaluationContext {
            config,
            state,
            sensors,
            now,
            fired: advance.fired,
        });

        match verdict.effect {
            Some(Effect::ClearOverride) => {
                if let Some(cleared) = self.overrides.clear(state) {
                    tracing::info!(cover = %config.id, kind = %cleared.kind, "override cleared by safety rule");
                }
            }
            Some(Effect::ArmShading) => {
                self.overrides
                    .activate_shading(state, config, config.default_override(), now);
            }
            Some(Effect::Defer(kind)) => {
                let retry = now + DEFER_RETRY;
                match kind {
                    TriggerKind::Open => state.next_open = Some(retry),
                    TriggerKind::Close => state.next_close = Some(retry),
                }
                tracing::debug!(cover = %config.id, trigger = %kind, at = %retry, "trigger deferred");
            }
            None => {}
        }
        state.last_evaluated = Some(now);

        tracing::debug!(
            cover = %config.id,
            reason = %verdict.reason,
            target = ?verdict.target.map(u8::from),
            "cover evaluated"
        );
        verdict
    }
}
