//! Controller: owns every cover's configuration, state and timers.
//!
//! Sensor changes, timer firings and service calls all end up as evaluation
//! requests. Requests are coalesced per cover: a cover already waiting for a
//! pass is not queued twice, so a flapping sensor costs one pass, not a
//! backlog. Passes run one at a time, so two passes of the same cover never
//! overlap.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use shutterctl_domain::cover::{CoverConfig, CoverConfigBuilder, CoverDirection, GlobalDefaults};
use shutterctl_domain::error::{ConfigurationError, NotFoundError, ShutterError};
use shutterctl_domain::id::{CoverId, SourceId};
use shutterctl_domain::overrides::override_duration;
use shutterctl_domain::runtime::CoverRuntimeState;
use shutterctl_domain::sensor::{Availability, SensorReading, SensorValue};
use shutterctl_domain::telemetry::Telemetry;
use shutterctl_domain::time::Timestamp;

use crate::decision_engine::DecisionEngine;
use crate::dispatcher::CommandDispatcher;
use crate::override_manager::OverrideManager;
use crate::ports::{CoverCommander, SolarCalendar, TelemetryPublisher};
use crate::sensor_aggregator::SensorAggregator;
use crate::timers::TimerSet;

/// Source id under which the computed sun elevation is published.
pub const SUN_ELEVATION_SOURCE: &str = "sun.elevation";
/// Source id under which the computed sun azimuth is published.
pub const SUN_AZIMUTH_SOURCE: &str = "sun.azimuth";

fn not_found(cover: &CoverId) -> ShutterError {
    NotFoundError {
        entity: "Cover",
        id: cover.to_string(),
    }
    .into()
}

/// Resolve and validate a full configuration, rejecting duplicates.
///
/// # Errors
///
/// Returns the first invalid cover's [`ConfigurationError`].
pub fn build_covers(
    defaults: &GlobalDefaults,
    builders: Vec<CoverConfigBuilder>,
) -> Result<BTreeMap<CoverId, CoverConfig>, ConfigurationError> {
    let mut covers = BTreeMap::new();
    for builder in builders {
        let config = builder.build(defaults)?;
        if covers.contains_key(&config.id) {
            return Err(ConfigurationError::DuplicateCover(config.id.to_string()));
        }
        covers.insert(config.id.clone(), config);
    }
    Ok(covers)
}

/// The single owner of all mutable engine state.
pub struct Controller<C, M, T> {
    defaults: GlobalDefaults,
    covers: BTreeMap<CoverId, CoverConfig>,
    states: HashMap<CoverId, CoverRuntimeState>,
    sensors: SensorAggregator,
    engine: DecisionEngine<C>,
    dispatcher: CommandDispatcher<M, T>,
    timers: TimerSet,
    pending: VecDeque<CoverId>,
    queued: HashSet<CoverId>,
}

impl<C, M, T> Controller<C, M, T>
where
    C: SolarCalendar,
    M: CoverCommander,
    T: TelemetryPublisher,
{
    pub fn new(
        engine: DecisionEngine<C>,
        dispatcher: CommandDispatcher<M, T>,
        sensors: SensorAggregator,
    ) -> Self {
        Self {
            defaults: GlobalDefaults::default(),
            covers: BTreeMap::new(),
            states: HashMap::new(),
            sensors,
            engine,
            dispatcher,
            timers: TimerSet::new(),
            pending: VecDeque::new(),
            queued: HashSet::new(),
        }
    }

    #[must_use]
    pub fn defaults(&self) -> &GlobalDefaults {
        &self.defaults
    }

    /// Configured covers in id order.
    pub fn covers(&self) -> impl Iterator<Item = &CoverConfig> {
        self.covers.values()
    }

    #[must_use]
    pub fn state(&self, cover: &CoverId) -> Option<&CoverRuntimeState> {
        self.states.get(cover)
    }

    /// Ask for one more pass of `cover`. Coalesced while already queued.
    pub fn request(&mut self, cover: CoverId) {
        if self.queued.insert(cover.clone()) {
            self.pending.push_back(cover);
        }
    }

    /// Number of covers waiting for a pass.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Replace the whole configuration. Nothing changes when any cover is
    /// invalid. Returns the ids of removed covers.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`].
    pub fn reconfigure(
        &mut self,
        defaults: GlobalDefaults,
        builders: Vec<CoverConfigBuilder>,
        now: Timestamp,
    ) -> Result<Vec<CoverId>, ConfigurationError> {
        let covers = build_covers(&defaults, builders)?;

        let removed: Vec<CoverId> = self
            .covers
            .keys()
            .filter(|id| !covers.contains_key(*id))
            .cloned()
            .collect();
        for cover in &removed {
            self.states.remove(cover);
            self.timers.cancel(cover);
            self.dispatcher.forget(cover);
            self.queued.remove(cover);
            tracing::info!(cover = %cover, "cover removed");
        }
        self.pending.retain(|cover| covers.contains_key(cover));

        self.defaults = defaults;
        self.covers = covers;
        self.sensors.rebind(self.covers.values());

        let scheduler = self.engine.scheduler();
        for (id, config) in &self.covers {
            let workday = self.sensors.snapshot(config, now).is_workday();
            if let Some(state) = self.states.get_mut(id) {
                if let Err(err) = scheduler.recalculate(state, config, now, workday) {
                    tracing::warn!(cover = %id, error = %err, "schedule recompute failed, keeping previous triggers");
                }
                self.timers.arm(id, state);
            }
        }
        let ids: Vec<CoverId> = self.covers.keys().cloned().collect();
        for id in ids {
            self.request(id);
        }
        tracing::info!(covers = self.covers.len(), removed = removed.len(), "configuration applied");
        Ok(removed)
    }

    /// `onSensorUpdate`: store the reading and queue every affected cover.
    pub fn on_sensor_update(&mut self, source: SourceId, reading: SensorReading) {
        for cover in self.sensors.on_sensor_update(source, reading) {
            self.request(cover);
        }
    }

    /// Feed the computed sun position as if it came from a sensor.
    pub fn feed_sun_position(&mut self, now: Timestamp) {
        let sun = self.engine.scheduler().calendar().sun_position(now);
        for (source, value) in [
            (SUN_ELEVATION_SOURCE, sun.elevation),
            (SUN_AZIMUTH_SOURCE, sun.azimuth),
        ] {
            let reading = SensorReading::new(SensorValue::Number(value), Availability::Available, now);
            self.on_sensor_update(SourceId::new(source), reading);
        }
    }

    /// Queue covers whose timers are due.
    pub fn fire_due(&mut self, now: Timestamp) {
        for cover in self.timers.pop_due(now) {
            tracing::debug!(cover = %cover, "timer fired");
            self.request(cover);
        }
    }

    /// Periodic sweep: due timers, plus covers never evaluated, left
    /// without triggers by an earlier scheduling failure, or waiting to
    /// resend an undelivered command.
    pub fn housekeeping(&mut self, now: Timestamp) {
        self.fire_due(now);
        let retry: Vec<CoverId> = self
            .covers
            .keys()
            .filter(|id| {
                self.states
                    .get(*id)
                    .is_none_or(|state| {
                        state.next_open.is_none()
                            || state.next_close.is_none()
                            || state.delivery_pending
                    })
            })
            .cloned()
            .collect();
        for cover in retry {
            self.request(cover);
        }
    }

    /// Earliest timer deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_deadline()
    }

    /// Run every queued pass.
    pub async fn process_pending(&mut self, now: Timestamp) {
        while let Some(cover) = self.pending.pop_front() {
            self.queued.remove(&cover);
            self.evaluate_cover(&cover, now).await;
        }
    }

    async fn evaluate_cover(&mut self, cover: &CoverId, now: Timestamp) {
        let Some(config) = self.covers.get(cover) else {
            return;
        };
        let snapshot = self.sensors.snapshot(config, now);
        let state = self.states.entry(cover.clone()).or_default();
        let verdict = self.engine.evaluate(config, state, &snapshot, now);
        self.dispatcher
            .apply(cover, state, verdict, snapshot.current_position, now)
            .await;
        self.timers.arm(cover, state);
    }

    fn config(&self, cover: &CoverId) -> Result<&CoverConfig, ShutterError> {
        self.covers.get(cover).ok_or_else(|| not_found(cover))
    }

    /// Evaluate `covers` right away and return their telemetry.
    async fn settle(&mut self, covers: Vec<CoverId>, now: Timestamp) -> Vec<Telemetry> {
        for cover in &covers {
            self.request(cover.clone());
        }
        self.process_pending(now).await;
        covers
            .iter()
            .filter_map(|cover| self.telemetry(cover, now).ok())
            .collect()
    }

    async fn settle_one(&mut self, cover: &CoverId, now: Timestamp) -> Result<Telemetry, ShutterError> {
        self.settle(vec![cover.clone()], now).await;
        self.telemetry(cover, now)
    }

    fn selection(&self, cover: Option<&CoverId>) -> Result<Vec<CoverId>, ShutterError> {
        match cover {
            Some(id) => self.config(id).map(|config| vec![config.id.clone()]),
            None => Ok(self.covers.keys().cloned().collect()),
        }
    }

    /// `setManualOverride`: suppress automation for `minutes`.
    ///
    /// # Errors
    ///
    /// Unknown cover, or non-positive duration. Nothing changes on error.
    pub async fn set_manual_override(
        &mut self,
        cover: &CoverId,
        minutes: i64,
        now: Timestamp,
    ) -> Result<Telemetry, ShutterError> {
        self.config(cover)?;
        let duration = override_duration(minutes)?;
        let state = self.states.entry(cover.clone()).or_default();
        OverrideManager.set_manual(state, duration, None, now);
        tracing::info!(cover = %cover, minutes, "manual override set");
        self.settle_one(cover, now).await
    }

    /// `activateShading`: move to the shading position and hold it for
    /// `minutes`, or the cover's default override duration.
    ///
    /// # Errors
    ///
    /// Unknown cover or a duration outside 1..=1440 minutes.
    pub async fn activate_shading(
        &mut self,
        cover: &CoverId,
        minutes: Option<i64>,
        now: Timestamp,
    ) -> Result<Telemetry, ShutterError> {
        let config = self.covers.get(cover).ok_or_else(|| not_found(cover))?;
        let duration = match minutes {
            Some(minutes) => override_duration(minutes)?,
            None => config.default_override(),
        };
        let state = self.states.entry(cover.clone()).or_default();
        let hold = OverrideManager.activate_shading(state, config, duration, now);
        tracing::info!(cover = %cover, until = %hold.until, "shading activated");
        self.settle_one(cover, now).await
    }

    /// `clearOverride`: cancel any hold and re-evaluate.
    ///
    /// # Errors
    ///
    /// Unknown cover.
    pub async fn clear_override(
        &mut self,
        cover: &CoverId,
        now: Timestamp,
    ) -> Result<Telemetry, ShutterError> {
        self.config(cover)?;
        if let Some(state) = self.states.get_mut(cover)
            && let Some(cleared) = OverrideManager.clear(state)
        {
            tracing::info!(cover = %cover, kind = %cleared.kind, "override cleared");
        }
        self.settle_one(cover, now).await
    }

    /// `moveCovers`: command open/close and hold it for the default duration.
    ///
    /// # Errors
    ///
    /// Unknown cover.
    pub async fn move_covers(
        &mut self,
        direction: CoverDirection,
        cover: Option<&CoverId>,
        now: Timestamp,
    ) -> Result<Vec<Telemetry>, ShutterError> {
        let selected = self.selection(cover)?;
        for id in &selected {
            let Some(config) = self.covers.get(id) else {
                continue;
            };
            let state = self.states.entry(id.clone()).or_default();
            OverrideManager.set_manual(
                state,
                config.default_override(),
                Some(config.position_for(direction)),
                now,
            );
        }
        tracing::info!(?direction, covers = selected.len(), "move requested");
        Ok(self.settle(selected, now).await)
    }

    /// `recalculateSchedule`: recompute triggers now instead of at rollover.
    ///
    /// # Errors
    ///
    /// Unknown cover, or the last scheduling failure (other covers are
    /// still recomputed).
    pub async fn recalculate_schedule(
        &mut self,
        cover: Option<&CoverId>,
        now: Timestamp,
    ) -> Result<Vec<Telemetry>, ShutterError> {
        let selected = self.selection(cover)?;
        let mut failure = None;
        let scheduler = self.engine.scheduler();
        for id in &selected {
            let Some(config) = self.covers.get(id) else {
                continue;
            };
            let workday = self.sensors.snapshot(config, now).is_workday();
            let state = self.states.entry(id.clone()).or_default();
            match scheduler.recalculate(state, config, now, workday) {
                Ok(()) => self.timers.arm(id, state),
                Err(err) => {
                    tracing::warn!(cover = %id, error = %err, "schedule recompute failed");
                    failure = Some(err);
                }
            }
        }
        let telemetry = self.settle(selected, now).await;
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(telemetry),
        }
    }

    /// Latest telemetry of a cover.
    ///
    /// # Errors
    ///
    /// Unknown cover.
    pub fn telemetry(&self, cover: &CoverId, now: Timestamp) -> Result<Telemetry, ShutterError> {
        let config = self.config(cover)?;
        let state = self.states.get(cover).cloned().unwrap_or_default();
        let current = self.sensors.snapshot(config, now).current_position;
        Ok(Telemetry::from_state(cover.clone(), &state, current, now))
    }

    /// Telemetry of every configured cover.
    #[must_use]
    pub fn telemetry_all(&self, now: Timestamp) -> Vec<Telemetry> {
        self.covers
            .keys()
            .filter_map(|cover| self.telemetry(cover, now).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterctl_domain::cover::SensorSources;
    use shutterctl_domain::overrides::OverrideKind;
    use shutterctl_domain::position::Position;
    use shutterctl_domain::reason::ReasonCode;
    use shutterctl_domain::schedule::MissedEventPolicy;
    use shutterctl_domain::time::minutes;

    use crate::dispatcher::tests::{RecordingCommander, RecordingPublisher};
    use crate::scheduler::SunScheduler;
    use crate::scheduler::tests::FixedCalendar;

    type TestController = Controller<FixedCalendar, RecordingCommander, RecordingPublisher>;

    fn at(value: &str) -> Timestamp {
        value.parse().unwrap()
    }

    fn noon() -> Timestamp {
        at("2026-05-10T12:00:00Z")
    }

    fn pos(v: i64) -> Position {
        Position::new(v).unwrap()
    }

    fn defaults() -> GlobalDefaults {
        GlobalDefaults {
            sensors: SensorSources {
                wind_speed: Some("sensor.wind".into()),
                brightness: Some("sensor.lux".into()),
                sun_elevation: Some(SUN_ELEVATION_SOURCE.into()),
                ..SensorSources::default()
            },
            ..GlobalDefaults::default()
        }
    }

    fn builders() -> Vec<CoverConfigBuilder> {
        vec![
            CoverConfig::builder("cover.a")
                .close_position(pos(20))
                .shading_brightness(8000.0, None)
                .shading_elevation(15.0, 70.0)
                .contact_sensor("binary_sensor.window_a"),
            CoverConfig::builder("cover.b"),
        ]
    }

    fn controller() -> (TestController, RecordingCommander, RecordingPublisher) {
        let commander = RecordingCommander::default();
        let publisher = RecordingPublisher::default();
        let engine = DecisionEngine::new(SunScheduler::new(
            FixedCalendar::default(),
            MissedEventPolicy::Skip,
        ));
        let mut controller = Controller::new(
            engine,
            CommandDispatcher::new(commander.clone(), publisher.clone()),
            SensorAggregator::new(None),
        );
        controller.reconfigure(defaults(), builders(), noon()).unwrap();
        (controller, commander, publisher)
    }

    fn reading(raw: &str, now: Timestamp) -> SensorReading {
        SensorReading::from_raw(raw, now)
    }

    #[tokio::test]
    async fn should_coalesce_repeated_requests_for_same_cover() {
        let (mut c, _, _) = controller();
        c.process_pending(noon()).await;
        for value in ["10", "11", "12", "13"] {
            c.on_sensor_update("sensor.wind".into(), reading(value, noon()));
        }
        assert_eq!(c.pending(), 2);
    }

    #[tokio::test]
    async fn should_shade_end_to_end_and_arm_override() {
        let (mut c, commander, _) = controller();
        let cover = CoverId::new("cover.a");
        c.process_pending(noon()).await;

        c.on_sensor_update("sensor.lux".into(), reading("9000", noon()));
        c.on_sensor_update(SUN_ELEVATION_SOURCE.into(), reading("20", noon()));
        c.process_pending(noon()).await;

        let t = c.telemetry(&cover, noon()).unwrap();
        assert_eq!(t.reason, ReasonCode::Shading);
        assert_eq!(t.target, Some(pos(30)));
        assert_eq!(t.override_kind, Some(OverrideKind::Shading));
        assert_eq!(t.override_until, Some(noon() + minutes(90)));
        assert_eq!(commander.moves(), vec![(cover, pos(30))]);
    }

    #[tokio::test]
    async fn should_suppress_sunset_during_manual_override() {
        let (mut c, commander, _) = controller();
        let cover = CoverId::new("cover.a");
        let start = at("2026-05-10T19:50:00Z");
        c.move_covers(CoverDirection::Open, Some(&cover), start).await.unwrap();
        let before = commander.moves().len();

        c.set_manual_override(&cover, 30, start).await.unwrap();
        let sunset = at("2026-05-10T20:00:00Z");
        c.fire_due(sunset);
        c.process_pending(sunset).await;

        let t = c.telemetry(&cover, sunset).unwrap();
        assert_eq!(t.reason, ReasonCode::Manual);
        assert_eq!(t.target, Some(pos(100)));
        assert_eq!(commander.moves().len(), before);
    }

    #[tokio::test]
    async fn should_reject_unknown_cover() {
        let (mut c, _, _) = controller();
        let err = c
            .set_manual_override(&"cover.nope".into(), 10, noon())
            .await
            .unwrap_err();
        assert!(matches!(err, ShutterError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_reject_non_positive_override_without_state_change() {
        let (mut c, _, _) = controller();
        let cover = CoverId::new("cover.a");
        let err = c.set_manual_override(&cover, 0, noon()).await.unwrap_err();
        assert!(matches!(
            err,
            ShutterError::Configuration(ConfigurationError::NonPositiveDuration)
        ));
        assert!(c.state(&cover).is_none_or(|s| s.hold.is_none()));
    }

    #[tokio::test]
    async fn should_hold_shading_for_requested_minutes() {
        let (mut c, commander, _) = controller();
        let cover = CoverId::new("cover.b");
        let t = c.activate_shading(&cover, Some(20), noon()).await.unwrap();
        assert_eq!(t.reason, ReasonCode::Shading);
        assert_eq!(t.override_kind, Some(OverrideKind::Shading));
        assert_eq!(t.override_until, Some(noon() + minutes(20)));
        assert_eq!(commander.moves(), vec![(cover.clone(), pos(30))]);

        let t = c.activate_shading(&cover, None, noon()).await.unwrap();
        assert_eq!(t.override_until, Some(noon() + minutes(90)));

        let err = c.activate_shading(&cover, Some(0), noon()).await.unwrap_err();
        assert!(matches!(
            err,
            ShutterError::Configuration(ConfigurationError::NonPositiveDuration)
        ));
    }

    #[tokio::test]
    async fn should_block_close_when_window_open() {
        let (mut c, commander, _) = controller();
        let cover = CoverId::new("cover.a");
        c.move_covers(CoverDirection::Open, Some(&cover), noon()).await.unwrap();
        c.clear_override(&cover, noon()).await.unwrap();
        c.on_sensor_update("binary_sensor.window_a".into(), reading("on", noon()));
        c.process_pending(noon()).await;

        let sunset = at("2026-05-10T20:00:00Z");
        c.fire_due(sunset);
        c.process_pending(sunset).await;

        let t = c.telemetry(&cover, sunset).unwrap();
        assert_eq!(t.reason, ReasonCode::BlockedOpenContact);
        assert_eq!(t.target, Some(pos(100)));
        assert!(
            commander
                .moves()
                .iter()
                .filter(|(id, _)| *id == cover)
                .all(|(_, p)| *p == pos(100))
        );
    }

    #[tokio::test]
    async fn should_retry_failed_close_instead_of_arming_manual_hold() {
        let (mut c, commander, _) = controller();
        let cover = CoverId::new("cover.a");
        c.move_covers(CoverDirection::Open, Some(&cover), noon()).await.unwrap();
        c.clear_override(&cover, noon()).await.unwrap();
        c.on_sensor_update("cover.a".into(), reading("100", noon()));
        c.process_pending(noon()).await;

        *commander.failing.lock().unwrap() = true;
        let sunset = at("2026-05-10T20:00:00Z");
        c.fire_due(sunset);
        c.process_pending(sunset).await;
        assert!(c.state(&cover).is_some_and(|s| s.delivery_pending));

        *commander.failing.lock().unwrap() = false;
        let later = at("2026-05-10T20:03:00Z");
        c.on_sensor_update("sensor.wind".into(), reading("10", later));
        c.process_pending(later).await;

        let t = c.telemetry(&cover, later).unwrap();
        assert_eq!(t.target, Some(pos(20)));
        assert_eq!(t.override_kind, None);
        assert_eq!(commander.moves().last(), Some(&(cover.clone(), pos(20))));
        assert!(c.state(&cover).is_some_and(|s| !s.delivery_pending));
    }

    #[tokio::test]
    async fn should_drop_state_and_timers_when_cover_removed() {
        let (mut c, _, _) = controller();
        c.process_pending(noon()).await;
        assert!(c.state(&"cover.b".into()).is_some());

        let removed = c
            .reconfigure(defaults(), builders().into_iter().take(1).collect(), noon())
            .unwrap();
        assert_eq!(removed, vec![CoverId::new("cover.b")]);
        assert!(c.state(&"cover.b".into()).is_none());
        assert!(c.telemetry(&"cover.b".into(), noon()).is_err());
    }

    #[tokio::test]
    async fn should_keep_previous_configuration_when_new_one_invalid() {
        let (mut c, _, _) = controller();
        let mut invalid = builders();
        invalid.push(CoverConfig::builder("cover.a"));
        let err = c.reconfigure(defaults(), invalid, noon()).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateCover("cover.a".into()));
        assert_eq!(c.covers().count(), 2);
    }

    #[tokio::test]
    async fn should_hold_moved_position_until_override_expires() {
        let (mut c, commander, _) = controller();
        let cover = CoverId::new("cover.b");
        let ts = c
            .move_covers(CoverDirection::Close, Some(&cover), noon())
            .await
            .unwrap();
        assert_eq!(ts[0].reason, ReasonCode::Manual);
        assert_eq!(ts[0].target, Some(Position::MIN));
        assert_eq!(commander.moves(), vec![(cover.clone(), Position::MIN)]);

        let later = noon() + minutes(91);
        c.fire_due(later);
        c.process_pending(later).await;
        let t = c.telemetry(&cover, later).unwrap();
        assert_eq!(t.reason, ReasonCode::Idle);
        assert_eq!(t.override_kind, None);
    }

    #[tokio::test]
    async fn should_recalculate_triggers_for_all_covers() {
        let (mut c, _, _) = controller();
        let t = c.recalculate_schedule(None, noon()).await.unwrap();
        assert_eq!(t.len(), 2);
        assert!(t.iter().all(|t| t.next_close == Some(at("2026-05-10T20:00:00Z"))));
    }

    #[tokio::test]
    async fn should_feed_sun_position_as_sensor_update() {
        let (mut c, _, _) = controller();
        c.process_pending(noon()).await;
        c.feed_sun_position(noon());
        // only cover.a and cover.b read the elevation source
        assert_eq!(c.pending(), 2);
    }
}
