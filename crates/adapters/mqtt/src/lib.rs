//! # shutterctl-adapter-mqtt
//!
//! MQTT adapter: bridges an MQTT broker into shutterctl.
//!
//! ## Responsibilities
//! - Connect to the broker and re-subscribe after every reconnect
//! - Translate `{base}/sensors/{source}` messages into sensor updates
//! - Publish move commands to `{base}/covers/{cover}/set`
//! - Publish retained telemetry to `{base}/covers/{cover}/telemetry`
//!
//! ## Dependency rule
//! Same as other adapters: depends on `shutterctl-app` and `shutterctl-domain`.

pub mod bridge;
pub mod config;
pub mod error;
pub mod payload;
pub mod topics;

pub use bridge::{MqttBridge, MqttPublisher};
pub use config::{Delivery, MqttConfig};
pub use error::MqttError;
