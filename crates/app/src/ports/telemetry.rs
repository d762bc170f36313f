//! Telemetry port: publishes the latest decision of a cover.

use std::future::Future;

use shutterctl_domain::error::ShutterError;
use shutterctl_domain::telemetry::Telemetry;

/// Publishes telemetry to interested consumers (UI, broker, …).
pub trait TelemetryPublisher {
    fn publish(&self, telemetry: Telemetry) -> impl Future<Output = Result<(), ShutterError>> + Send;
}

impl<T: TelemetryPublisher + Send + Sync> TelemetryPublisher for std::sync::Arc<T> {
    fn publish(&self, telemetry: Telemetry) -> impl Future<Output = Result<(), ShutterError>> + Send {
        (**self).publish(telemetry)
    }
}

impl<T: TelemetryPublisher + Send + Sync> TelemetryPublisher for Option<T> {
    async fn publish(&self, telemetry: Telemetry) -> Result<(), ShutterError> {
        match self {
            Some(inner) => inner.publish(telemetry).await,
            None => Ok(()),
        }
    }
}

impl<A, B> TelemetryPublisher for (A, B)
where
    A: TelemetryPublisher + Send + Sync,
    B: TelemetryPublisher + Send + Sync,
{
    async fn publish(&self, telemetry: Telemetry) -> Result<(), ShutterError> {
        let first = self.0.publish(telemetry.clone()).await;
        let second = self.1.publish(telemetry).await;
        first.and(second)
    }
}
