//! Cover configuration: immutable per cover, resolved against global defaults.
//!
//! The configuration layer delivers a list of [`CoverConfigBuilder`]s (each
//! field optional) plus one [`GlobalDefaults`]; [`CoverConfigBuilder::build`]
//! fills every missing field from the defaults and validates the result.
//! Reconfiguration always replaces the whole list.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::id::{CoverId, SourceId};
use crate::position::Position;
use crate::schedule::TriggerKind;
use crate::sensor::SensorRole;
use crate::time::TimeOfDay;

/// Longest override window accepted; longer requests are clamped.
pub const MAX_OVERRIDE_MINUTES: u32 = 24 * 60;

/// Sun/brightness window in which a cover shades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingThresholds {
    /// Brightness (lux) at or above which shading starts.
    pub brightness_start: f64,
    /// While shading, brightness must drop to or below this to end it.
    pub brightness_end: f64,
    pub elevation_min: f64,
    pub elevation_max: f64,
    pub azimuth_start: f64,
    pub azimuth_end: f64,
}

impl Default for ShadingThresholds {
    fn default() -> Self {
        Self {
            brightness_start: 20_000.0,
            brightness_end: 15_000.0,
            elevation_min: 10.0,
            elevation_max: 70.0,
            azimuth_start: 90.0,
            azimuth_end: 270.0,
        }
    }
}

/// Per-rule on/off switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationFlags {
    pub open: bool,
    pub close: bool,
    pub shading: bool,
    pub wind: bool,
    pub ventilate: bool,
    pub cold_protection: bool,
    /// Gate open/close on sun elevation and close once the sun is low.
    pub sun: bool,
    /// Gate open/close on ambient brightness.
    pub brightness: bool,
}

impl Default for AutomationFlags {
    fn default() -> Self {
        Self {
            open: true,
            close: true,
            shading: true,
            wind: true,
            ventilate: true,
            cold_protection: false,
            sun: false,
            brightness: true,
        }
    }
}

/// Sources for the shared (non-contact) roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSources {
    pub presence: Option<SourceId>,
    pub wind_speed: Option<SourceId>,
    pub brightness: Option<SourceId>,
    pub sun_elevation: Option<SourceId>,
    pub sun_azimuth: Option<SourceId>,
    /// Outdoor temperature.
    pub temperature: Option<SourceId>,
    pub indoor_temperature: Option<SourceId>,
    /// Forecast low (cold protection) or high (shading), numeric.
    pub temperature_forecast: Option<SourceId>,
    /// On when today is a workday.
    pub workday: Option<SourceId>,
    /// On while the resident sleeps.
    pub resident: Option<SourceId>,
}

impl SensorSources {
    fn merged_over(self, fallback: &Self) -> Self {
        Self {
            presence: self.presence.or_else(|| fallback.presence.clone()),
            wind_speed: self.wind_speed.or_else(|| fallback.wind_speed.clone()),
            brightness: self.brightness.or_else(|| fallback.brightness.clone()),
            sun_elevation: self.sun_elevation.or_else(|| fallback.sun_elevation.clone()),
            sun_azimuth: self.sun_azimuth.or_else(|| fallback.sun_azimuth.clone()),
            temperature: self.temperature.or_else(|| fallback.temperature.clone()),
            indoor_temperature: self
                .indoor_temperature
                .or_else(|| fallback.indoor_temperature.clone()),
            temperature_forecast: self
                .temperature_forecast
                .or_else(|| fallback.temperature_forecast.clone()),
            workday: self.workday.or_else(|| fallback.workday.clone()),
            resident: self.resident.or_else(|| fallback.resident.clone()),
        }
    }

    fn bindings(&self) -> impl Iterator<Item = (SensorRole, &SourceId)> {
        [
            (SensorRole::Presence, self.presence.as_ref()),
            (SensorRole::WindSpeed, self.wind_speed.as_ref()),
            (SensorRole::Brightness, self.brightness.as_ref()),
            (SensorRole::SunElevation, self.sun_elevation.as_ref()),
            (SensorRole::SunAzimuth, self.sun_azimuth.as_ref()),
            (SensorRole::Temperature, self.temperature.as_ref()),
            (SensorRole::IndoorTemperature, self.indoor_temperature.as_ref()),
            (SensorRole::TemperatureForecast, self.temperature_forecast.as_ref()),
            (SensorRole::Workday, self.workday.as_ref()),
            (SensorRole::Resident, self.resident.as_ref()),
        ]
        .into_iter()
        .filter_map(|(role, source)| source.map(|s| (role, s)))
    }
}

/// Fallback values for every field a cover does not set itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalDefaults {
    pub open_position: Position,
    pub close_position: Position,
    pub shading_position: Position,
    pub ventilation_position: Position,
    pub position_tolerance: u8,
    pub sunrise_offset_minutes: i32,
    pub sunset_offset_minutes: i32,
    pub open_time: Option<TimeOfDay>,
    pub close_time: Option<TimeOfDay>,
    pub open_time_non_workday: Option<TimeOfDay>,
    pub close_time_non_workday: Option<TimeOfDay>,
    pub sun_elevation_open: f64,
    pub sun_elevation_close: f64,
    pub brightness_open_above: f64,
    pub brightness_close_below: f64,
    pub shading: ShadingThresholds,
    pub shading_temperature_threshold: Option<f64>,
    pub shading_forecast_threshold: Option<f64>,
    pub wind_speed_limit: Option<f64>,
    pub ventilation_lockout: bool,
    pub override_minutes: u32,
    pub hold_while_present: bool,
    pub cold_protection_threshold: Option<f64>,
    pub automations: AutomationFlags,
    pub sensors: SensorSources,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            open_position: Position::MAX,
            close_position: Position::MIN,
            shading_position: Position::clamped(30.0),
            ventilation_position: Position::clamped(50.0),
            position_tolerance: 3,
            sunrise_offset_minutes: 0,
            sunset_offset_minutes: 0,
            open_time: None,
            close_time: None,
            open_time_non_workday: None,
            close_time_non_workday: None,
            sun_elevation_open: -2.0,
            sun_elevation_close: -4.0,
            brightness_open_above: 500.0,
            brightness_close_below: 100.0,
            shading: ShadingThresholds::default(),
            shading_temperature_threshold: None,
            shading_forecast_threshold: None,
            wind_speed_limit: Some(50.0),
            ventilation_lockout: false,
            override_minutes: 90,
            hold_while_present: false,
            cold_protection_threshold: None,
            automations: AutomationFlags::default(),
            sensors: SensorSources::default(),
        }
    }
}

/// Direction of an explicit move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverDirection {
    Open,
    Close,
}

/// Fully resolved configuration of one cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverConfig {
    pub id: CoverId,
    pub name: Option<String>,
    pub open_position: Position,
    pub close_position: Position,
    pub shading_position: Position,
    pub ventilation_position: Position,
    pub position_tolerance: u8,
    pub sunrise_offset_minutes: i32,
    pub sunset_offset_minutes: i32,
    pub open_time: Option<TimeOfDay>,
    pub close_time: Option<TimeOfDay>,
    /// Fixed times on non-workdays; the workday times apply when unset.
    pub open_time_non_workday: Option<TimeOfDay>,
    pub close_time_non_workday: Option<TimeOfDay>,
    /// With the sun switch on, opening needs elevation at or above this.
    pub sun_elevation_open: f64,
    /// With the sun switch on, closing needs elevation at or below this.
    pub sun_elevation_close: f64,
    pub brightness_open_above: f64,
    pub brightness_close_below: f64,
    pub shading: ShadingThresholds,
    /// Shading also needs indoor or outdoor temperature at or above this.
    pub shading_temperature_threshold: Option<f64>,
    /// A forecast at or above this satisfies the shading temperature check.
    pub shading_forecast_threshold: Option<f64>,
    pub wind_speed_limit: Option<f64>,
    pub ventilation_lockout: bool,
    pub contact_sensors: Vec<SourceId>,
    pub position_sensor: SourceId,
    pub override_minutes: u32,
    pub hold_while_present: bool,
    pub cold_protection_threshold: Option<f64>,
    pub automations: AutomationFlags,
    pub sensors: SensorSources,
}

impl CoverConfig {
    /// Start a builder for the cover with the given id.
    #[must_use]
    pub fn builder(id: impl Into<CoverId>) -> CoverConfigBuilder {
        CoverConfigBuilder {
            id: id.into(),
            ..CoverConfigBuilder::default()
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated [`ConfigurationError`].
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.id.is_empty() {
            return Err(ConfigurationError::EmptyCoverId);
        }
        if self.override_minutes == 0 {
            return Err(ConfigurationError::NonPositiveDuration);
        }
        if self.open_position == self.close_position {
            return Err(ConfigurationError::OpenEqualsClose);
        }
        if self.shading.brightness_end > self.shading.brightness_start {
            return Err(ConfigurationError::InvertedBrightness {
                start: self.shading.brightness_start,
                end: self.shading.brightness_end,
            });
        }
        if self.brightness_close_below > self.brightness_open_above {
            return Err(ConfigurationError::InvertedBrightnessLimits {
                open_above: self.brightness_open_above,
                close_below: self.brightness_close_below,
            });
        }
        if self.shading.elevation_min > self.shading.elevation_max {
            return Err(ConfigurationError::InvertedElevation {
                min: self.shading.elevation_min,
                max: self.shading.elevation_max,
            });
        }
        Ok(())
    }

    /// Whether moving `from` → `to` lowers the cover, following the
    /// direction from its open position towards its close position.
    #[must_use]
    pub fn closes(&self, from: Position, to: Position) -> bool {
        if self.open_position > self.close_position {
            to < from
        } else {
            to > from
        }
    }

    /// Fixed wall-clock time of a trigger for the given kind of day.
    #[must_use]
    pub fn fixed_time(&self, kind: TriggerKind, workday: bool) -> Option<TimeOfDay> {
        match (kind, workday) {
            (TriggerKind::Open, true) => self.open_time,
            (TriggerKind::Open, false) => self.open_time_non_workday.or(self.open_time),
            (TriggerKind::Close, true) => self.close_time,
            (TriggerKind::Close, false) => self.close_time_non_workday.or(self.close_time),
        }
    }

    /// Configured position for a direction.
    #[must_use]
    pub fn position_for(&self, direction: CoverDirection) -> Position {
        match direction {
            CoverDirection::Open => self.open_position,
            CoverDirection::Close => self.close_position,
        }
    }

    /// Default override window, clamped to [`MAX_OVERRIDE_MINUTES`].
    #[must_use]
    pub fn default_override(&self) -> Duration {
        Duration::minutes(i64::from(self.override_minutes.min(MAX_OVERRIDE_MINUTES)))
    }

    /// Every `(role, source)` pair this cover reads.
    pub fn bindings(&self) -> impl Iterator<Item = (SensorRole, &SourceId)> {
        self.sensors
            .bindings()
            .chain(
                self.contact_sensors
                    .iter()
                    .map(|source| (SensorRole::Contact, source)),
            )
            .chain(std::iter::once((SensorRole::Position, &self.position_sensor)))
    }
}

/// Step-by-step builder for [`CoverConfig`]; doubles as the per-cover
/// configuration record, every unset field falling back to [`GlobalDefaults`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoverConfigBuilder {
    id: CoverId,
    name: Option<String>,
    open_position: Option<Position>,
    close_position: Option<Position>,
    shading_position: Option<Position>,
    ventilation_position: Option<Position>,
    position_tolerance: Option<u8>,
    sunrise_offset_minutes: Option<i32>,
    sunset_offset_minutes: Option<i32>,
    open_time: Option<TimeOfDay>,
    close_time: Option<TimeOfDay>,
    open_time_non_workday: Option<TimeOfDay>,
    close_time_non_workday: Option<TimeOfDay>,
    sun_elevation_open: Option<f64>,
    sun_elevation_close: Option<f64>,
    brightness_open_above: Option<f64>,
    brightness_close_below: Option<f64>,
    shading_temperature_threshold: Option<f64>,
    shading_forecast_threshold: Option<f64>,
    shading_brightness_start: Option<f64>,
    shading_brightness_end: Option<f64>,
    shading_elevation_min: Option<f64>,
    shading_elevation_max: Option<f64>,
    shading_azimuth_start: Option<f64>,
    shading_azimuth_end: Option<f64>,
    wind_speed_limit: Option<f64>,
    ventilation_lockout: Option<bool>,
    contact_sensors: Vec<SourceId>,
    position_sensor: Option<SourceId>,
    override_minutes: Option<u32>,
    hold_while_present: Option<bool>,
    cold_protection_threshold: Option<f64>,
    automations: Option<AutomationFlags>,
    sensors: SensorSources,
}

impl CoverConfigBuilder {
    /// Id this builder will produce a config for.
    #[must_use]
    pub fn id(&self) -> &CoverId {
        &self.id
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn open_position(mut self, position: Position) -> Self {
        self.open_position = Some(position);
        self
    }

    #[must_use]
    pub fn close_position(mut self, position: Position) -> Self {
        self.close_position = Some(position);
        self
    }

    #[must_use]
    pub fn shading_position(mut self, position: Position) -> Self {
        self.shading_position = Some(position);
        self
    }

    #[must_use]
    pub fn ventilation_position(mut self, position: Position) -> Self {
        self.ventilation_position = Some(position);
        self
    }

    #[must_use]
    pub fn position_tolerance(mut self, tolerance: u8) -> Self {
        self.position_tolerance = Some(tolerance);
        self
    }

    #[must_use]
    pub fn sunrise_offset_minutes(mut self, minutes: i32) -> Self {
        self.sunrise_offset_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn sunset_offset_minutes(mut self, minutes: i32) -> Self {
        self.sunset_offset_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn open_time(mut self, time: TimeOfDay) -> Self {
        self.open_time = Some(time);
        self
    }

    #[must_use]
    pub fn close_time(mut self, time: TimeOfDay) -> Self {
        self.close_time = Some(time);
        self
    }

    /// Fixed open/close times on non-workdays.
    #[must_use]
    pub fn non_workday_times(mut self, open: Option<TimeOfDay>, close: Option<TimeOfDay>) -> Self {
        self.open_time_non_workday = open;
        self.close_time_non_workday = close;
        self
    }

    /// Sun elevation limits for opening and closing.
    #[must_use]
    pub fn sun_elevation_limits(mut self, open: f64, close: f64) -> Self {
        self.sun_elevation_open = Some(open);
        self.sun_elevation_close = Some(close);
        self
    }

    /// Brightness limits for opening and closing.
    #[must_use]
    pub fn brightness_limits(mut self, open_above: f64, close_below: f64) -> Self {
        self.brightness_open_above = Some(open_above);
        self.brightness_close_below = Some(close_below);
        self
    }

    #[must_use]
    pub fn shading_temperature(mut self, threshold: f64, forecast: Option<f64>) -> Self {
        self.shading_temperature_threshold = Some(threshold);
        self.shading_forecast_threshold = forecast;
        self
    }

    /// Brightness at which shading starts; `end` defaults to the global end.
    #[must_use]
    pub fn shading_brightness(mut self, start: f64, end: Option<f64>) -> Self {
        self.shading_brightness_start = Some(start);
        self.shading_brightness_end = end;
        self
    }

    #[must_use]
    pub fn shading_elevation(mut self, min: f64, max: f64) -> Self {
        self.shading_elevation_min = Some(min);
        self.shading_elevation_max = Some(max);
        self
    }

    #[must_use]
    pub fn shading_azimuth(mut self, start: f64, end: f64) -> Self {
        self.shading_azimuth_start = Some(start);
        self.shading_azimuth_end = Some(end);
        self
    }

    #[must_use]
    pub fn wind_speed_limit(mut self, limit: f64) -> Self {
        self.wind_speed_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn ventilation_lockout(mut self, enabled: bool) -> Self {
        self.ventilation_lockout = Some(enabled);
        self
    }

    #[must_use]
    pub fn contact_sensor(mut self, source: impl Into<SourceId>) -> Self {
        self.contact_sensors.push(source.into());
        self
    }

    #[must_use]
    pub fn position_sensor(mut self, source: impl Into<SourceId>) -> Self {
        self.position_sensor = Some(source.into());
        self
    }

    #[must_use]
    pub fn override_minutes(mut self, minutes: u32) -> Self {
        self.override_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn hold_while_present(mut self, hold: bool) -> Self {
        self.hold_while_present = Some(hold);
        self
    }

    #[must_use]
    pub fn cold_protection_threshold(mut self, threshold: f64) -> Self {
        self.cold_protection_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn automations(mut self, flags: AutomationFlags) -> Self {
        self.automations = Some(flags);
        self
    }

    #[must_use]
    pub fn sensors(mut self, sources: SensorSources) -> Self {
        self.sensors = sources;
        self
    }

    /// Resolve against `defaults`, validate, and return a [`CoverConfig`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the resolved config is invalid.
    pub fn build(self, defaults: &GlobalDefaults) -> Result<CoverConfig, ConfigurationError> {
        let shading = ShadingThresholds {
            brightness_start: self
                .shading_brightness_start
                .unwrap_or(defaults.shading.brightness_start),
            brightness_end: self
                .shading_brightness_end
                .unwrap_or(defaults.shading.brightness_end),
            elevation_min: self
                .shading_elevation_min
                .unwrap_or(defaults.shading.elevation_min),
            elevation_max: self
                .shading_elevation_max
                .unwrap_or(defaults.shading.elevation_max),
            azimuth_start: self
                .shading_azimuth_start
                .unwrap_or(defaults.shading.azimuth_start),
            azimuth_end: self
                .shading_azimuth_end
                .unwrap_or(defaults.shading.azimuth_end),
        };
        let position_sensor = self
            .position_sensor
            .unwrap_or_else(|| SourceId::new(self.id.as_str()));

        let config = CoverConfig {
            position_sensor,
            name: self.name,
            open_position: self.open_position.unwrap_or(defaults.open_position),
            close_position: self.close_position.unwrap_or(defaults.close_position),
            shading_position: self.shading_position.unwrap_or(defaults.shading_position),
            ventilation_position: self
                .ventilation_position
                .unwrap_or(defaults.ventilation_position),
            position_tolerance: self
                .position_tolerance
                .unwrap_or(defaults.position_tolerance),
            sunrise_offset_minutes: self
                .sunrise_offset_minutes
                .unwrap_or(defaults.sunrise_offset_minutes),
            sunset_offset_minutes: self
                .sunset_offset_minutes
                .unwrap_or(defaults.sunset_offset_minutes),
            open_time: self.open_time.or(defaults.open_time),
            close_time: self.close_time.or(defaults.close_time),
            open_time_non_workday: self
                .open_time_non_workday
                .or(defaults.open_time_non_workday),
            close_time_non_workday: self
                .close_time_non_workday
                .or(defaults.close_time_non_workday),
            sun_elevation_open: self.sun_elevation_open.unwrap_or(defaults.sun_elevation_open),
            sun_elevation_close: self
                .sun_elevation_close
                .unwrap_or(defaults.sun_elevation_close),
            brightness_open_above: self
                .brightness_open_above
                .unwrap_or(defaults.brightness_open_above),
            brightness_close_below: self
                .brightness_close_below
                .unwrap_or(defaults.brightness_close_below),
            shading,
            shading_temperature_threshold: self
                .shading_temperature_threshold
                .or(defaults.shading_temperature_threshold),
            shading_forecast_threshold: self
                .shading_forecast_threshold
                .or(defaults.shading_forecast_threshold),
            wind_speed_limit: self.wind_speed_limit.or(defaults.wind_speed_limit),
            ventilation_lockout: self
                .ventilation_lockout
                .unwrap_or(defaults.ventilation_lockout),
            contact_sensors: self.contact_sensors,
            override_minutes: self.override_minutes.unwrap_or(defaults.override_minutes),
            hold_while_present: self
                .hold_while_present
                .unwrap_or(defaults.hold_while_present),
            cold_protection_threshold: self
                .cold_protection_threshold
                .or(defaults.cold_protection_threshold),
            automations: self.automations.unwrap_or(defaults.automations),
            sensors: self.sensors.merged_over(&defaults.sensors),
            id: self.id,
        };
        config.validate()?;
        Ok(config)
    }
}
