//! MQTT integration configuration: the `[mqtt]` table of the daemon config.

use std::time::Duration;

use rumqttc::{MqttOptions, QoS};
use serde::Deserialize;

use crate::error::MqttError;

/// Delivery guarantee used for subscriptions, commands and telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl From<Delivery> for QoS {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::AtMostOnce => QoS::AtMostOnce,
            Delivery::AtLeastOnce => QoS::AtLeastOnce,
            Delivery::ExactlyOnce => QoS::ExactlyOnce,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Whether the bridge is started at all.
    pub enabled: bool,
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sensors are read from `{base_topic}/sensors/#`, covers are driven
    /// under `{base_topic}/covers/`.
    pub base_topic: String,
    pub keep_alive_secs: u16,
    pub delivery: Delivery,
    /// Publish telemetry retained, so late subscribers see the last decision.
    pub retain_telemetry: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "shutterctl".to_string(),
            username: None,
            password: None,
            base_topic: "shutterctl".to_string(),
            keep_alive_secs: 30,
            delivery: Delivery::default(),
            retain_telemetry: true,
        }
    }
}

impl MqttConfig {
    /// # Errors
    ///
    /// A base topic that is empty, carries a wildcard or starts/ends with a
    /// slash, or a password without a username.
    pub fn validate(&self) -> Result<(), MqttError> {
        let base = self.base_topic.as_str();
        if base.is_empty() || base.starts_with('/') || base.ends_with('/') || base.contains(['+', '#']) {
            return Err(MqttError::InvalidBaseTopic(self.base_topic.clone()));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(MqttError::PasswordWithoutUsername);
        }
        Ok(())
    }

    #[must_use]
    pub fn qos(&self) -> QoS {
        self.delivery.into()
    }

    /// Client options for the configured broker.
    #[must_use]
    pub fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.broker_host, self.broker_port);
        options.set_keep_alive(Duration::from_secs(u64::from(self.keep_alive_secs)));
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.as_deref().unwrap_or_default());
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> MqttConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn should_build_client_options_for_configured_broker() {
        let config = parse(
            r#"
            broker_host = "mqtt.lan"
            broker_port = 8883
            keep_alive_secs = 45
            username = "shutters"
            password = "secret"
        "#,
        );
        assert!(config.validate().is_ok());
        let options = config.options();
        assert_eq!(options.broker_address(), ("mqtt.lan".to_string(), 8883));
        assert_eq!(options.keep_alive(), Duration::from_secs(45));
    }

    #[test]
    fn should_map_delivery_to_qos() {
        assert_eq!(MqttConfig::default().qos(), QoS::AtLeastOnce);
        let config = parse(r#"delivery = "exactly_once""#);
        assert_eq!(config.qos(), QoS::ExactlyOnce);
        assert!(toml::from_str::<MqttConfig>(r#"delivery = "twice""#).is_err());
    }

    #[test]
    fn should_reject_base_topics_that_break_the_topic_tree() {
        for base in ["", "/home", "home/", "home/+", "covers/#"] {
            let config = MqttConfig {
                base_topic: base.to_string(),
                ..MqttConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(MqttError::InvalidBaseTopic(_))),
                "{base:?} accepted"
            );
        }
        let nested = MqttConfig {
            base_topic: "home/ground-floor".to_string(),
            ..MqttConfig::default()
        };
        assert!(nested.validate().is_ok());
    }

    #[test]
    fn should_reject_password_without_username() {
        let config = parse(r#"password = "secret""#);
        assert!(matches!(
            config.validate(),
            Err(MqttError::PasswordWithoutUsername)
        ));
    }
}
