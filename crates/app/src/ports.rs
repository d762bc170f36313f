//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod calendar;
pub mod commander;
pub mod integration;
pub mod sensor_sink;
pub mod telemetry;

pub use calendar::{SolarCalendar, SunPosition};
pub use commander::CoverCommander;
pub use integration::Integration;
pub use sensor_sink::{SensorSink, SensorUpdate};
pub use telemetry::TelemetryPublisher;
