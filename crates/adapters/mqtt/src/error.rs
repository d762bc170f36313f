//! Errors raised by the MQTT bridge.
//!
//! Everything that crosses a port boundary becomes
//! [`ShutterError::Delivery`]; the bridge never rejects a decision, it only
//! fails to hand it over.

use shutterctl_domain::error::ShutterError;
use shutterctl_domain::id::CoverId;

#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// `start` ran on a bridge whose event loop was already handed out.
    #[error("MQTT bridge already started")]
    AlreadyStarted,

    #[error("base topic {0:?} must be non-empty, without wildcards or outer slashes")]
    InvalidBaseTopic(String),

    #[error("MQTT password configured without a username")]
    PasswordWithoutUsername,

    /// The client request queue refused the message.
    #[error("could not queue publish on {topic}")]
    Publish {
        topic: String,
        #[source]
        source: rumqttc::ClientError,
    },

    #[error("sensor payload is not valid UTF-8")]
    PayloadEncoding(#[source] std::str::Utf8Error),

    #[error("sensor payload is not a valid JSON reading")]
    PayloadParse(#[source] serde_json::Error),

    #[error("failed to encode telemetry of {cover}")]
    Encode {
        cover: CoverId,
        #[source]
        source: serde_json::Error,
    },
}

impl From<MqttError> for ShutterError {
    fn from(err: MqttError) -> Self {
        ShutterError::delivery(err)
    }
}
