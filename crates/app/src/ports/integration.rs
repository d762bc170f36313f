//! Integration port: lifecycle of protocol bridges.
//!
//! An integration bridges an external protocol (MQTT, simulated covers, …)
//! into the engine: it pushes sensor changes through a [`SensorSink`] and
//! usually also implements [`CoverCommander`](super::CoverCommander).

use std::future::Future;

use shutterctl_domain::error::ShutterError;

use super::SensorSink;

/// A pluggable integration.
///
/// The binary crate calls the lifecycle methods in order:
///
/// 1. [`start`](Self::start): connect and spawn background tasks
/// 2. (the engine runs, commanding covers through the integration)
/// 3. [`teardown`](Self::teardown): stop tasks and release connections
pub trait Integration {
    /// Unique name identifying this integration (e.g. `"mqtt"`).
    fn name(&self) -> &'static str;

    /// Connect and spawn long-running tasks that feed `sink`. Returns
    /// immediately.
    fn start(
        &mut self,
        sink: impl SensorSink + Clone + 'static,
    ) -> impl Future<Output = Result<(), ShutterError>> + Send;

    /// Called on graceful shutdown.
    fn teardown(&mut self) -> impl Future<Output = Result<(), ShutterError>> + Send;
}
