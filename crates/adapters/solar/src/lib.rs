//! # shutterctl-adapter-solar
//!
//! Solar calendar adapter: computes sunrise, sunset and the sun's position
//! for the configured location, and resolves local wall-clock times in its
//! timezone.
//!
//! ## Dependency rule
//! Same as other adapters: depends on `shutterctl-app` and `shutterctl-domain`.

mod astronomy;
pub mod calendar;
pub mod config;
pub mod error;

pub use calendar::NoaaCalendar;
pub use config::LocationConfig;
pub use error::SolarError;
