//! Shared application state for axum handlers.

use std::sync::Arc;

use shutterctl_app::telemetry_feed::TelemetryFeed;
use shutterctl_app::runner::ControlHandle;

/// Application state shared across all axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Client of the control loop.
    pub control: ControlHandle,
    /// Feed the SSE stream subscribes to.
    pub telemetry: Arc<TelemetryFeed>,
}

impl AppState {
    pub fn new(control: ControlHandle, telemetry: Arc<TelemetryFeed>) -> Self {
        Self { control, telemetry }
    }
}
