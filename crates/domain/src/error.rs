//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`ShutterError`] via `#[from]` when crossing a port boundary.

use chrono::NaiveDate;

/// Top-level error for every fallible engine operation.
#[derive(Debug, thiserror::Error)]
pub enum ShutterError {
    /// The triggering operation was rejected before any state changed.
    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),

    /// The operation referenced something that does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// Astronomical data could not be obtained; prior triggers stay in place.
    #[error("scheduling data unavailable")]
    Scheduling(#[from] SchedulingError),

    /// A move command or telemetry update could not be delivered.
    #[error("command delivery failed")]
    Delivery(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The control loop is gone (shutting down or crashed).
    #[error("engine is not running")]
    EngineStopped,
}

/// Invalid configuration or invalid operation arguments.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("cover id must not be empty")]
    EmptyCoverId,

    #[error("cover {0} is configured more than once")]
    DuplicateCover(String),

    #[error("override duration must be greater than zero minutes")]
    NonPositiveDuration,

    #[error("position {0} is outside 0..=100")]
    PositionOutOfRange(i64),

    #[error("open and close positions must differ")]
    OpenEqualsClose,

    #[error("shading brightness end ({end}) must not exceed start ({start})")]
    InvertedBrightness { start: f64, end: f64 },

    #[error("close brightness limit ({close_below}) must not exceed open limit ({open_above})")]
    InvertedBrightnessLimits { open_above: f64, close_below: f64 },

    #[error("shading elevation min ({min}) must not exceed max ({max})")]
    InvertedElevation { min: f64, max: f64 },

    #[error("invalid time of day {0:?}")]
    InvalidTime(String),
}

/// A referenced cover (or other object) does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Sun-event data could not be computed for a date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    /// The sun does not rise or set on this date at the configured location.
    #[error("no sunrise/sunset on {0}")]
    NoSunEvent(NaiveDate),

    /// A local wall-clock time does not exist on this date (DST gap).
    #[error("local time does not exist on {0}")]
    NonexistentLocalTime(NaiveDate),

    /// No trigger could be found within the lookahead window.
    #[error("no trigger within {days} days")]
    NoTrigger { days: u32 },
}

impl ShutterError {
    /// Wrap any adapter error as a delivery failure.
    pub fn delivery<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Delivery(Box::new(err))
    }
}
