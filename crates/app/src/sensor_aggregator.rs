//! Sensor State Aggregator: latest value of every referenced source.
//!
//! Holds one [`SensorReading`] per source and a binding table from source to
//! the covers (and roles) that read it. Writes only happen through
//! [`SensorAggregator::on_sensor_update`]; the engine takes a
//! [`SensorSnapshot`] per pass and never sees a half-applied update.

use std::collections::{BTreeSet, HashMap};

use chrono::Duration;

use shutterctl_domain::cover::CoverConfig;
use shutterctl_domain::id::{CoverId, SourceId};
use shutterctl_domain::position::Position;
use shutterctl_domain::sensor::{SensorReading, SensorRole, SensorSnapshot, SensorValue};
use shutterctl_domain::time::Timestamp;

/// Role-keyed read model over all sensor sources.
#[derive(Debug, Default)]
pub struct SensorAggregator {
    readings: HashMap<SourceId, SensorReading>,
    bindings: HashMap<SourceId, Vec<(CoverId, SensorRole)>>,
    max_age: Option<Duration>,
}

impl SensorAggregator {
    /// Readings older than `max_age` count as unavailable.
    #[must_use]
    pub fn new(max_age: Option<Duration>) -> Self {
        Self {
            max_age,
            ..Self::default()
        }
    }

    /// Rebuild the binding table from a full configuration. Readings are kept.
    pub fn rebind<'a>(&mut self, covers: impl IntoIterator<Item = &'a CoverConfig>) {
        self.bindings.clear();
        for cover in covers {
            for (role, source) in cover.bindings() {
                self.bindings
                    .entry(source.clone())
                    .or_default()
                    .push((cover.id.clone(), role));
            }
        }
    }

    /// Store a reading and return the covers that reference its source.
    pub fn on_sensor_update(&mut self, source: SourceId, reading: SensorReading) -> Vec<CoverId> {
        let affected: BTreeSet<CoverId> = self
            .bindings
            .get(&source)
            .into_iter()
            .flatten()
            .map(|(cover, _)| cover.clone())
            .collect();
        tracing::trace!(
            source = %source,
            covers = affected.len(),
            "sensor update stored"
        );
        self.readings.insert(source, reading);
        affected.into_iter().collect()
    }

    /// Usable value of a source, `None` when unknown, unavailable or stale.
    #[must_use]
    pub fn read(&self, source: &SourceId, now: Timestamp) -> Option<&SensorValue> {
        self.readings.get(source)?.usable(now, self.max_age)
    }

    fn number(&self, source: Option<&SourceId>, now: Timestamp) -> Option<f64> {
        self.read(source?, now).and_then(SensorValue::as_f64)
    }

    fn flag(&self, source: Option<&SourceId>, now: Timestamp) -> Option<bool> {
        self.read(source?, now).map(SensorValue::as_bool)
    }

    /// Everything `cover` reads, resolved at `now`.
    #[must_use]
    pub fn snapshot(&self, cover: &CoverConfig, now: Timestamp) -> SensorSnapshot {
        let sources = &cover.sensors;
        let contacts: Vec<bool> = cover
            .contact_sensors
            .iter()
            .filter_map(|source| self.flag(Some(source), now))
            .collect();
        let contact_open = if contacts.is_empty() {
            None
        } else {
            Some(contacts.into_iter().any(|open| open))
        };
        SensorSnapshot {
            presence: self.flag(sources.presence.as_ref(), now),
            wind_speed: self.number(sources.wind_speed.as_ref(), now),
            brightness: self.number(sources.brightness.as_ref(), now),
            sun_elevation: self.number(sources.sun_elevation.as_ref(), now),
            sun_azimuth: self.number(sources.sun_azimuth.as_ref(), now),
            temperature: self.number(sources.temperature.as_ref(), now),
            indoor_temperature: self.number(sources.indoor_temperature.as_ref(), now),
            temperature_forecast: self.number(sources.temperature_forecast.as_ref(), now),
            workday: self.flag(sources.workday.as_ref(), now),
            resident_asleep: self.flag(sources.resident.as_ref(), now),
            contact_open,
            current_position: self
                .number(Some(&cover.position_sensor), now)
                .map(Position::clamped),
        }
    }

    /// Number of sources with a stored reading.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterctl_domain::cover::{GlobalDefaults, SensorSources};
    use shutterctl_domain::sensor::Availability;
    use shutterctl_domain::time::minutes;

    fn ts() -> Timestamp {
        "2026-04-01T12:00:00Z".parse().unwrap()
    }

    fn defaults() -> GlobalDefaults {
        GlobalDefaults {
            sensors: SensorSources {
                wind_speed: Some("sensor.wind".into()),
                brightness: Some("sensor.lux".into()),
                ..SensorSources::default()
            },
            ..GlobalDefaults::default()
        }
    }

    fn covers() -> Vec<CoverConfig> {
        vec![
            CoverConfig::builder("cover.kitchen")
                .contact_sensor("binary_sensor.kitchen_window")
                .build(&defaults())
                .unwrap(),
            CoverConfig::builder("cover.office")
                .build(&defaults())
                .unwrap(),
        ]
    }

    fn aggregator() -> SensorAggregator {
        let mut agg = SensorAggregator::new(Some(minutes(30)));
        agg.rebind(&covers());
        agg
    }

    #[test]
    fn should_return_every_cover_bound_to_global_source() {
        let mut agg = aggregator();
        let affected = agg.on_sensor_update("sensor.wind".into(), SensorReading::from_raw("12", ts()));
        assert_eq!(
            affected,
            vec![CoverId::new("cover.kitchen"), CoverId::new("cover.office")]
        );
    }

    #[test]
    fn should_return_only_owner_of_contact_source() {
        let mut agg = aggregator();
        let affected = agg.on_sensor_update(
            "binary_sensor.kitchen_window".into(),
            SensorReading::from_raw("on", ts()),
        );
        assert_eq!(affected, vec![CoverId::new("cover.kitchen")]);
    }

    #[test]
    fn should_store_unbound_source_without_affecting_covers() {
        let mut agg = aggregator();
        let affected = agg.on_sensor_update("sensor.unused".into(), SensorReading::from_raw("1", ts()));
        assert!(affected.is_empty());
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn should_build_snapshot_from_bound_sources() {
        let mut agg = aggregator();
        agg.on_sensor_update("sensor.wind".into(), SensorReading::from_raw("12.5", ts()));
        agg.on_sensor_update(
            "binary_sensor.kitchen_window".into(),
            SensorReading::from_raw("open", ts()),
        );
        agg.on_sensor_update("cover.kitchen".into(), SensorReading::from_raw("64", ts()));

        let snap = agg.snapshot(&covers()[0], ts());
        assert_eq!(snap.wind_speed, Some(12.5));
        assert_eq!(snap.contact_open, Some(true));
        assert_eq!(snap.current_position, Position::new(64).ok());
        assert_eq!(snap.brightness, None);
        assert_eq!(snap.presence, None);
    }

    #[test]
    fn should_resolve_workday_and_resident_flags() {
        let mut agg = SensorAggregator::new(None);
        let cover = CoverConfig::builder("cover.bedroom")
            .sensors(SensorSources {
                workday: Some("binary_sensor.workday".into()),
                resident: Some("input_boolean.asleep".into()),
                ..SensorSources::default()
            })
            .build(&defaults())
            .unwrap();
        agg.rebind([&cover]);
        let affected = agg.on_sensor_update(
            "binary_sensor.workday".into(),
            SensorReading::from_raw("off", ts()),
        );
        assert_eq!(affected, vec![CoverId::new("cover.bedroom")]);
        agg.on_sensor_update("input_boolean.asleep".into(), SensorReading::from_raw("on", ts()));

        let snap = agg.snapshot(&cover, ts());
        assert_eq!(snap.workday, Some(false));
        assert_eq!(snap.resident_asleep, Some(true));
        assert!(!snap.is_workday());
    }

    #[test]
    fn should_treat_unavailable_source_as_missing() {
        let mut agg = aggregator();
        agg.on_sensor_update(
            "sensor.wind".into(),
            SensorReading::new(SensorValue::Number(80.0), Availability::Unavailable, ts()),
        );
        assert_eq!(agg.snapshot(&covers()[1], ts()).wind_speed, None);
    }

    #[test]
    fn should_treat_stale_reading_as_missing() {
        let mut agg = aggregator();
        agg.on_sensor_update("sensor.lux".into(), SensorReading::from_raw("9000", ts()));
        let later = ts() + minutes(45);
        assert_eq!(agg.snapshot(&covers()[1], later).brightness, None);
    }

    #[test]
    fn should_report_closed_when_all_contacts_closed() {
        let mut agg = aggregator();
        agg.on_sensor_update(
            "binary_sensor.kitchen_window".into(),
            SensorReading::from_raw("off", ts()),
        );
        assert_eq!(agg.snapshot(&covers()[0], ts()).contact_open, Some(false));
    }

    #[test]
    fn should_drop_bindings_of_removed_cover_when_rebound() {
        let mut agg = aggregator();
        agg.rebind(&covers()[1..]);
        let affected = agg.on_sensor_update(
            "binary_sensor.kitchen_window".into(),
            SensorReading::from_raw("on", ts()),
        );
        assert!(affected.is_empty());
    }
}
