//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `shutterctl.toml` in the working directory, or the file named by
//! `SHUTTERCTL_CONFIG`. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use shutterctl_adapter_mqtt::{MqttConfig, MqttError};
use shutterctl_adapter_solar::LocationConfig;
use shutterctl_adapter_virtual::VirtualConfig;
use shutterctl_app::controller::{self, SUN_AZIMUTH_SOURCE, SUN_ELEVATION_SOURCE};
use shutterctl_app::runner::RunnerConfig;
use shutterctl_domain::cover::{CoverConfigBuilder, GlobalDefaults};
use shutterctl_domain::error::ConfigurationError;
use shutterctl_domain::schedule::MissedEventPolicy;

const DEFAULT_PATH: &str = "shutterctl.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Where the covers are.
    pub location: LocationConfig,
    /// Control loop settings.
    pub engine: EngineConfig,
    /// MQTT bridge.
    pub mqtt: MqttConfig,
    /// Other integrations.
    pub integrations: IntegrationsConfig,
    /// Values every cover falls back to.
    pub defaults: GlobalDefaults,
    /// One entry per controlled cover.
    pub covers: Vec<CoverConfigBuilder>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Control loop configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between housekeeping sweeps.
    pub housekeeping_secs: u64,
    /// Readings older than this are treated as unavailable.
    pub sensor_max_age_minutes: Option<u32>,
    /// What to do with triggers missed while the engine was down.
    pub missed_events: MissedEventPolicy,
    /// Feed the computed sun position as `sun.elevation` / `sun.azimuth`.
    pub publish_sun_position: bool,
    /// Capacity of the control loop's request queue.
    pub queue_capacity: usize,
}

/// Per-integration settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Simulated covers.
    #[serde(rename = "virtual")]
    pub virtual_covers: VirtualConfig,
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SHUTTERCTL_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SHUTTERCTL_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("SHUTTERCTL_PORT")
            && let Ok(port) = val.parse()
        {
            self.server.port = port;
        }
        if let Ok(val) = std::env::var("SHUTTERCTL_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("SHUTTERCTL_MQTT_HOST") {
            self.mqtt.broker_host = val;
            self.mqtt.enabled = true;
        }
        if let Ok(val) = std::env::var("SHUTTERCTL_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] for invalid server, engine or cover settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.engine.housekeeping_secs == 0 {
            return Err(ConfigError::Validation(
                "engine.housekeeping_secs must be non-zero".to_string(),
            ));
        }
        if self.engine.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "engine.queue_capacity must be non-zero".to_string(),
            ));
        }
        if self.mqtt.enabled {
            self.mqtt.validate()?;
        }
        controller::build_covers(&self.effective_defaults(), self.covers.clone())?;
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Global defaults with the computed sun position wired in as the sun
    /// sources when none is configured.
    #[must_use]
    pub fn effective_defaults(&self) -> GlobalDefaults {
        let mut defaults = self.defaults.clone();
        if self.engine.publish_sun_position {
            let sensors = &mut defaults.sensors;
            sensors
                .sun_elevation
                .get_or_insert_with(|| SUN_ELEVATION_SOURCE.into());
            sensors
                .sun_azimuth
                .get_or_insert_with(|| SUN_AZIMUTH_SOURCE.into());
        }
        defaults
    }

    #[must_use]
    pub fn runner(&self) -> RunnerConfig {
        RunnerConfig {
            housekeeping: Duration::from_secs(self.engine.housekeeping_secs),
            publish_sun_position: self.engine.publish_sun_position,
        }
    }

    #[must_use]
    pub fn sensor_max_age(&self) -> Option<chrono::Duration> {
        self.engine
            .sensor_max_age_minutes
            .map(|minutes| chrono::Duration::minutes(i64::from(minutes)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "shutterctld=info,shutterctl=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            housekeeping_secs: 60,
            sensor_max_age_minutes: None,
            missed_events: MissedEventPolicy::Skip,
            publish_sun_position: true,
            queue_capacity: 256,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// A cover or the defaults are invalid.
    #[error("invalid cover configuration")]
    Cover(#[from] ConfigurationError),
    /// The enabled MQTT bridge is misconfigured.
    #[error("invalid MQTT configuration")]
    Mqtt(#[from] MqttError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterctl_domain::position::Position;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.location.timezone, "UTC");
        assert_eq!(config.engine.housekeeping_secs, 60);
        assert_eq!(config.engine.missed_events, MissedEventPolicy::Skip);
        assert!(!config.mqtt.enabled);
        assert!(config.integrations.virtual_covers.enabled);
        assert!(config.covers.is_empty());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = r#"
            [server]
            host = '127.0.0.1'
            port = 9090

            [logging]
            filter = 'debug'

            [location]
            latitude = 48.85
            longitude = 2.35
            timezone = "Europe/Paris"

            [engine]
            housekeeping_secs = 30
            sensor_max_age_minutes = 15
            missed_events = "replay"
            publish_sun_position = false

            [mqtt]
            enabled = true
            broker_host = "broker.lan"

            [integrations.virtual]
            enabled = false

            [defaults]
            override_minutes = 45
            wind_speed_limit = 40.0

            [defaults.sensors]
            wind_speed = "sensor.wind"

            [[covers]]
            id = "cover.living_room"
            shading_position = 25
            contact_sensors = ["binary_sensor.terrace_door"]

            [[covers]]
            id = "cover.bedroom"
            close_time = "21:30"
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.location.timezone, "Europe/Paris");
        assert_eq!(config.engine.housekeeping_secs, 30);
        assert_eq!(config.engine.missed_events, MissedEventPolicy::Replay);
        assert!(!config.engine.publish_sun_position);
        assert_eq!(
            config.sensor_max_age(),
            Some(chrono::Duration::minutes(15))
        );
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.broker_host, "broker.lan");
        assert!(!config.integrations.virtual_covers.enabled);
        assert_eq!(config.defaults.override_minutes, 45);
        assert_eq!(config.covers.len(), 2);
        assert_eq!(config.covers[0].id().as_str(), "cover.living_room");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_check_mqtt_settings_only_when_bridge_enabled() {
        let mut config = Config::default();
        config.mqtt.base_topic = "home/#".to_string();
        assert!(config.validate().is_ok());

        config.mqtt.enabled = true;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Mqtt(MqttError::InvalidBaseTopic(_)))
        ));
    }

    #[test]
    fn should_reject_zero_housekeeping_interval() {
        let mut config = Config::default();
        config.engine.housekeeping_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_duplicate_cover_ids() {
        let toml = r#"
            [[covers]]
            id = "cover.a"

            [[covers]]
            id = "cover.a"
        "#;
        let config = Config::parse(toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Cover(ConfigurationError::DuplicateCover(_)))
        ));
    }

    #[test]
    fn should_reject_cover_without_id() {
        let config = Config::parse("[[covers]]\nshading_position = 20").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Cover(ConfigurationError::EmptyCoverId))
        ));
    }

    #[test]
    fn should_read_day_kind_and_gate_settings_per_cover() {
        let toml = r#"
            [defaults.sensors]
            workday = "binary_sensor.workday"
            resident = "binary_sensor.kids_asleep"

            [[covers]]
            id = "cover.a"
            open_time = "06:00"
            open_time_non_workday = "07:30"
            sun_elevation_open = -1.5
            shading_temperature_threshold = 25.0

            [[covers]]
            id = "cover.b"
            brightness_open_above = 50.0
            brightness_close_below = 400.0
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(
            config.defaults.sensors.workday.as_ref().map(|s| s.as_str()),
            Some("binary_sensor.workday")
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Cover(
                ConfigurationError::InvertedBrightnessLimits { .. }
            ))
        ));
    }

    #[test]
    fn should_reject_out_of_range_position() {
        let toml = r#"
            [[covers]]
            id = "cover.a"
            open_position = 120
        "#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn should_wire_computed_sun_sources_by_default() {
        let config = Config::default();
        let defaults = config.effective_defaults();
        assert_eq!(
            defaults.sensors.sun_elevation.as_ref().map(|s| s.as_str()),
            Some(SUN_ELEVATION_SOURCE)
        );
        assert_eq!(
            defaults.sensors.sun_azimuth.as_ref().map(|s| s.as_str()),
            Some(SUN_AZIMUTH_SOURCE)
        );
    }

    #[test]
    fn should_keep_configured_sun_sources() {
        let config = Config::parse(
            r#"
            [defaults.sensors]
            sun_elevation = "sensor.sun_elevation"
        "#,
        )
        .unwrap();
        let defaults = config.effective_defaults();
        assert_eq!(
            defaults.sensors.sun_elevation.as_ref().map(|s| s.as_str()),
            Some("sensor.sun_elevation")
        );
    }

    #[test]
    fn should_not_wire_sun_sources_when_publishing_disabled() {
        let mut config = Config::default();
        config.engine.publish_sun_position = false;
        assert_eq!(config.effective_defaults().sensors.sun_elevation, None);
    }

    #[test]
    fn should_format_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn should_keep_default_positions_when_not_configured() {
        let config = Config::default();
        assert_eq!(config.defaults.open_position, Position::MAX);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        assert!(matches!(
            Config::parse("invalid {{{"),
            Err(ConfigError::Parse(_))
        ));
    }
}
