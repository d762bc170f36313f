//! Sensor sink port: where integrations push sensor changes.

use std::future::Future;

use shutterctl_domain::error::ShutterError;
use shutterctl_domain::id::SourceId;
use shutterctl_domain::sensor::SensorReading;

/// A single pushed change of an external signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorUpdate {
    pub source: SourceId,
    pub reading: SensorReading,
}

impl SensorUpdate {
    #[must_use]
    pub fn new(source: impl Into<SourceId>, reading: SensorReading) -> Self {
        Self {
            source: source.into(),
            reading,
        }
    }
}

/// Accepts sensor updates from integrations.
///
/// The binary wires the engine's control handle in; adapters never see the
/// engine itself.
pub trait SensorSink: Send + Sync {
    fn push(&self, update: SensorUpdate) -> impl Future<Output = Result<(), ShutterError>> + Send;
}
