//! Rules: the ordered cascade that turns a snapshot into a verdict.
//!
//! Each [`Rule`] is a pure predicate/action pair evaluated against an
//! [`EvaluationContext`]. [`evaluate`] walks [`PRECEDENCE`] and the first rule
//! that matches wins. The contact lockout is a guard rather than a producer:
//! it lets the lower rules decide, then vetoes (or softens) closing moves.
//!
//! Scheduled moves are gated by sun elevation and brightness when those
//! switches are on. A gated trigger is not lost: the verdict asks the engine
//! to retry it shortly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cover::CoverConfig;
use crate::overrides::OverrideKind;
use crate::position::Position;
use crate::reason::ReasonCode;
use crate::runtime::CoverRuntimeState;
use crate::schedule::TriggerKind;
use crate::sensor::SensorSnapshot;
use crate::time::Timestamp;

/// One step of the decision cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Wind,
    ContactLockout,
    ActiveOverride,
    ResidentAsleep,
    PresenceHold,
    ColdProtection,
    Shading,
    ShadingEnd,
    Scheduled,
    SunClose,
}

/// Fixed evaluation order, highest priority first. Idle is the fallback.
pub const PRECEDENCE: [Rule; 10] = [
    Rule::Wind,
    Rule::ContactLockout,
    Rule::ActiveOverride,
    Rule::ResidentAsleep,
    Rule::PresenceHold,
    Rule::ColdProtection,
    Rule::Shading,
    Rule::ShadingEnd,
    Rule::Scheduled,
    Rule::SunClose,
];

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Wind => "wind",
            Self::ContactLockout => "contact_lockout",
            Self::ActiveOverride => "active_override",
            Self::ResidentAsleep => "resident_asleep",
            Self::PresenceHold => "presence_hold",
            Self::ColdProtection => "cold_protection",
            Self::Shading => "shading",
            Self::ShadingEnd => "shading_end",
            Self::Scheduled => "scheduled",
            Self::SunClose => "sun_close",
        };
        f.write_str(name)
    }
}

/// Everything a rule may read during one pass.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub config: &'a CoverConfig,
    pub state: &'a CoverRuntimeState,
    pub sensors: &'a SensorSnapshot,
    pub now: Timestamp,
    /// Trigger that acts in this pass, if one was crossed.
    pub fired: Option<TriggerKind>,
}

/// Side effect a verdict asks the engine to apply to override state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Drop any override; safety preempts holds.
    ClearOverride,
    /// Arm a shading override for the cover's default duration.
    ArmShading,
    /// The trigger fired but sun or brightness held it back; retry it soon.
    Defer(TriggerKind),
}

/// Outcome of a pass. A `None` target means "hold wherever the cover is".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub target: Option<Position>,
    pub reason: ReasonCode,
    pub effect: Option<Effect>,
}

impl Verdict {
    #[must_use]
    pub fn new(target: Option<Position>, reason: ReasonCode) -> Self {
        Self {
            target,
            reason,
            effect: None,
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }

    fn idle(ctx: &EvaluationContext<'_>) -> Self {
        Self::new(ctx.state.last_commanded, ReasonCode::Idle)
    }
}

impl Rule {
    /// The verdict of this rule, or `None` if it does not match.
    #[must_use]
    pub fn check(self, ctx: &EvaluationContext<'_>) -> Option<Verdict> {
        match self {
            Self::Wind => wind(ctx),
            // applied around the lower rules by `evaluate_from`
            Self::ContactLockout => None,
            Self::ActiveOverride => active_override(ctx),
            Self::ResidentAsleep => resident_asleep(ctx),
            Self::PresenceHold => presence_hold(ctx),
            Self::ColdProtection => cold_protection(ctx),
            Self::Shading => shading(ctx),
            Self::ShadingEnd => shading_end(ctx),
            Self::Scheduled => scheduled(ctx),
            Self::SunClose => sun_close(ctx),
        }
    }
}

/// Run the full cascade.
#[must_use]
pub fn evaluate(ctx: &EvaluationContext<'_>) -> Verdict {
    evaluate_from(ctx, &PRECEDENCE)
}

/// Run the cascade over `rules` only, in the given order.
#[must_use]
pub fn evaluate_from(ctx: &EvaluationContext<'_>, rules: &[Rule]) -> Verdict {
    for (idx, rule) in rules.iter().enumerate() {
        if *rule == Rule::ContactLockout {
            let lower = evaluate_from(ctx, &rules[idx + 1..]);
            return guard_contacts(ctx, lower);
        }
        if let Some(verdict) = rule.check(ctx) {
            return verdict;
        }
    }
    Verdict::idle(ctx)
}

fn wind(ctx: &EvaluationContext<'_>) -> Option<Verdict> {
    if !ctx.config.automations.wind {
        return None;
    }
    let limit = ctx.config.wind_speed_limit?;
    let speed = ctx.sensors.wind_speed?;
    (speed > limit).then(|| {
        let verdict = Verdict::new(Some(ctx.config.open_position), ReasonCode::WindProtection);
        if ctx.state.hold.is_some() {
            verdict.with_effect(Effect::ClearOverride)
        } else {
            verdict
        }
    })
}

/// Whether sun elevation and brightness let the cover move the way `kind`
/// moves it. Each check only applies while its switch is on.
#[must_use]
pub fn movement_allowed(ctx: &EvaluationContext<'_>, kind: TriggerKind) -> bool {
    sun_allows(ctx, kind) && brightness_allows(ctx, kind)
}

fn sun_allows(ctx: &EvaluationContext<'_>, kind: TriggerKind) -> bool {
    if !ctx.config.automations.sun {
        return true;
    }
    let Some(elevation) = ctx.sensors.sun_elevation else {
        return false;
    };
    match kind {
        TriggerKind::Open => elevation >= ctx.config.sun_elevation_open,
        TriggerKind::Close => elevation <= ctx.config.sun_elevation_close,
    }
}

fn brightness_allows(ctx: &EvaluationContext<'_>, kind: TriggerKind) -> bool {
    if !ctx.config.automations.brightness {
        return true;
    }
    ctx.sensors.brightness.is_none_or(|lux| match kind {
        TriggerKind::Open => lux >= ctx.config.brightness_open_above,
        TriggerKind::Close => lux <= ctx.config.brightness_close_below,
    })
}

fn guard_contacts(ctx: &EvaluationContext<'_>, lower: Verdict) -> Verdict {
    let guarded = lockout(ctx, lower);
    // a held-back trigger stays pending whatever the lockout decides
    match lower.effect {
        Some(deferral @ Effect::Defer(_)) if guarded.effect.is_none() => {
            guarded.with_effect(deferral)
        }
        _ => guarded,
    }
}

fn lockout(ctx: &EvaluationContext<'_>, lower: Verdict) -> Verdict {
    if !ctx.sensors.any_contact_open() {
        return lower;
    }
    let config = ctx.config;
    let reference = ctx.state.last_commanded.or(ctx.sensors.current_position);
    let closes = match (reference, lower.target) {
        (Some(from), Some(to)) => config.closes(from, to),
        (None, Some(_)) => lower.reason.is_closing_intent(),
        _ => false,
    };
    let blocked = Verdict::new(reference, ReasonCode::BlockedOpenContact);

    if !config.ventilation_lockout {
        return if closes { blocked } else { lower };
    }

    // ventilation lockout: closing intents are refused whatever the direction
    let refused = closes || lower.reason.is_closing_intent();
    let holding = matches!(lower.reason, ReasonCode::Idle | ReasonCode::PresenceHold);
    if !refused && !holding {
        return lower;
    }
    let below_ventilation = reference.is_some_and(|from| {
        config.closes(config.ventilation_position, from)
    });
    if config.automations.ventilate && below_ventilation {
        return Verdict::new(Some(config.ventilation_position), ReasonCode::Ventilation);
    }
    if refused { blocked } else { lower }
}

fn active_override(ctx: &EvaluationContext<'_>) -> Option<Verdict> {
    let hold = ctx.state.active_override(ctx.now)?;
    Some(match hold.kind {
        OverrideKind::Manual => Verdict::new(
            hold.position.or(ctx.state.last_commanded),
            ReasonCode::Manual,
        ),
        OverrideKind::Shading => Verdict::new(
            Some(hold.position.unwrap_or(ctx.config.shading_position)),
            ReasonCode::Shading,
        ),
    })
}

fn resident_asleep(ctx: &EvaluationContext<'_>) -> Option<Verdict> {
    (ctx.sensors.resident_asleep == Some(true))
        .then(|| Verdict::new(Some(ctx.config.close_position), ReasonCode::ResidentAsleep))
}

fn presence_hold(ctx: &EvaluationContext<'_>) -> Option<Verdict> {
    (ctx.config.hold_while_present && ctx.sensors.presence == Some(true))
        .then(|| Verdict::new(ctx.state.last_commanded, ReasonCode::PresenceHold))
}

fn cold_protection(ctx: &EvaluationContext<'_>) -> Option<Verdict> {
    if !ctx.config.automations.cold_protection {
        return None;
    }
    let threshold = ctx.config.cold_protection_threshold?;
    let sun_down = ctx.sensors.sun_elevation.is_none_or(|e| e <= 0.0);
    // the forecast stands in when the outdoor reading is missing or mild
    let cold = [ctx.sensors.temperature, ctx.sensors.temperature_forecast]
        .into_iter()
        .flatten()
        .any(|t| t <= threshold);
    (sun_down && cold).then(|| {
        Verdict::new(Some(ctx.config.close_position), ReasonCode::ColdProtection)
    })
}

/// Whether the shading window holds right now, with hysteresis while shading.
#[must_use]
pub fn shading_condition(ctx: &EvaluationContext<'_>) -> bool {
    let thresholds = &ctx.config.shading;
    let (Some(brightness), Some(elevation)) = (ctx.sensors.brightness, ctx.sensors.sun_elevation)
    else {
        return false;
    };
    let bright = if ctx.state.last_reason == ReasonCode::Shading {
        brightness > thresholds.brightness_end
    } else {
        brightness >= thresholds.brightness_start
    };
    let elevation_ok = (thresholds.elevation_min..=thresholds.elevation_max).contains(&elevation);
    let azimuth_ok = ctx
        .sensors
        .sun_azimuth
        .is_none_or(|az| (thresholds.azimuth_start..=thresholds.azimuth_end).contains(&az));
    bright && elevation_ok && azimuth_ok && warm_enough(ctx)
}

/// Temperature check for shading. Passes when no threshold is configured or
/// none of the relevant readings is available.
fn warm_enough(ctx: &EvaluationContext<'_>) -> bool {
    let Some(threshold) = ctx.config.shading_temperature_threshold else {
        return true;
    };
    let sensors = ctx.sensors;
    let forecast = ctx
        .config
        .shading_forecast_threshold
        .and_then(|limit| sensors.temperature_forecast.map(|t| (t, limit)));
    let readings: Vec<(f64, f64)> = [sensors.indoor_temperature, sensors.temperature]
        .into_iter()
        .flatten()
        .map(|t| (t, threshold))
        .chain(forecast)
        .collect();
    readings.is_empty() || readings.iter().any(|(t, limit)| t >= limit)
}

fn shading(ctx: &EvaluationContext<'_>) -> Option<Verdict> {
    (ctx.config.automations.shading && shading_condition(ctx)).then(|| {
        Verdict::new(Some(ctx.config.shading_position), ReasonCode::Shading)
            .with_effect(Effect::ArmShading)
    })
}

fn shading_end(ctx: &EvaluationContext<'_>) -> Option<Verdict> {
    if ctx.state.last_reason != ReasonCode::Shading {
        return None;
    }
    let day = ctx
        .state
        .is_day()
        .or_else(|| ctx.sensors.sun_elevation.map(|e| e > 0.0))
        .unwrap_or(true);
    let automations = ctx.config.automations;
    if day {
        (automations.open && movement_allowed(ctx, TriggerKind::Open)).then(|| {
            Verdict::new(Some(ctx.config.open_position), ReasonCode::ShadingEndOpen)
        })
    } else {
        (automations.close && movement_allowed(ctx, TriggerKind::Close)).then(|| {
            Verdict::new(Some(ctx.config.close_position), ReasonCode::ShadingEndClose)
        })
    }
}

fn scheduled(ctx: &EvaluationContext<'_>) -> Option<Verdict> {
    let automations = ctx.config.automations;
    let kind = ctx.fired?;
    let (enabled, target, reason) = match kind {
        TriggerKind::Open => (
            automations.open,
            ctx.config.open_position,
            ReasonCode::ScheduledOpen,
        ),
        TriggerKind::Close => (
            automations.close,
            ctx.config.close_position,
            ReasonCode::ScheduledClose,
        ),
    };
    if !enabled {
        return None;
    }
    Some(if movement_allowed(ctx, kind) {
        Verdict::new(Some(target), reason)
    } else {
        Verdict::idle(ctx).with_effect(Effect::Defer(kind))
    })
}

fn sun_close(ctx: &EvaluationContext<'_>) -> Option<Verdict> {
    let automations = ctx.config.automations;
    (automations.sun && automations.close && movement_allowed(ctx, TriggerKind::Close))
        .then(|| Verdict::new(Some(ctx.config.close_position), ReasonCode::SunClose))
}
