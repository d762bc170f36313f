//! Solar adapter error types.

/// Invalid location settings, reported at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolarError {
    #[error("unknown timezone {0:?}")]
    UnknownTimezone(String),

    #[error("latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),
}
