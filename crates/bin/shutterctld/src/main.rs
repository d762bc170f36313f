//! # shutterctld: shutterctl daemon
//!
//! Composition root that wires all adapters together and starts the engine.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Construct the solar calendar, integrations and telemetry bus (adapters)
//! - Construct the controller and spawn the control loop
//! - Build the axum router, injecting the control handle
//! - Bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use shutterctl_adapter_http_axum::state::AppState;
use shutterctl_adapter_mqtt::MqttBridge;
use shutterctl_adapter_solar::NoaaCalendar;
use shutterctl_adapter_virtual::VirtualIntegration;
use shutterctl_app::controller::Controller;
use shutterctl_app::decision_engine::DecisionEngine;
use shutterctl_app::dispatcher::CommandDispatcher;
use shutterctl_app::telemetry_feed::TelemetryFeed;
use shutterctl_app::ports::Integration;
use shutterctl_app::runner::{self, ControlHandle};
use shutterctl_app::scheduler::SunScheduler;
use shutterctl_app::sensor_aggregator::SensorAggregator;

use crate::config::Config;

const TELEMETRY_FEED_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging.filter);

    let calendar = NoaaCalendar::from_config(&config.location).context("invalid [location]")?;
    tracing::info!(
        latitude = config.location.latitude,
        longitude = config.location.longitude,
        timezone = %calendar.timezone(),
        "solar calendar ready"
    );

    // Integrations
    let virtual_config = &config.integrations.virtual_covers;
    let mut virtual_covers = virtual_config
        .enabled
        .then(|| VirtualIntegration::new(virtual_config));
    let mut mqtt = config.mqtt.enabled.then(|| MqttBridge::new(&config.mqtt));

    // Engine
    let telemetry_feed = Arc::new(TelemetryFeed::new(TELEMETRY_FEED_CAPACITY));
    let commander = (
        virtual_covers.as_ref().map(VirtualIntegration::commander),
        mqtt.as_ref().map(MqttBridge::publisher),
    );
    let publisher = (
        Arc::clone(&telemetry_feed),
        mqtt.as_ref().map(MqttBridge::publisher),
    );
    let controller = Controller::new(
        DecisionEngine::new(SunScheduler::new(calendar, config.engine.missed_events)),
        CommandDispatcher::new(commander, publisher),
        SensorAggregator::new(config.sensor_max_age()),
    );
    let (control, receiver) = runner::channel(config.engine.queue_capacity);
    let engine = tokio::spawn(runner::run(controller, receiver, config.runner()));

    control
        .reconfigure(config.effective_defaults(), config.covers.clone())
        .await
        .context("failed to apply cover configuration")?;

    if let Some(integration) = virtual_covers.as_mut() {
        if let Some(position) = virtual_config.initial_position {
            for cover in &config.covers {
                integration.add_cover(cover.id().clone(), position).await?;
            }
        }
        start_integration(integration, control.clone()).await?;
    }
    if let Some(integration) = mqtt.as_mut() {
        start_integration(integration, control.clone()).await?;
    }

    // HTTP
    let state = AppState::new(control.clone(), telemetry_feed);
    let app = shutterctl_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, covers = config.covers.len(), "shutterctld listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    if let Some(integration) = mqtt.as_mut() {
        stop_integration(integration).await;
    }
    if let Some(integration) = virtual_covers.as_mut() {
        stop_integration(integration).await;
    }
    control.shutdown().await;
    engine.await.context("control loop panicked")?;

    Ok(())
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?} ({err}), falling back to info");
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn start_integration(
    integration: &mut impl Integration,
    sink: ControlHandle,
) -> anyhow::Result<()> {
    let name = integration.name();
    integration
        .start(sink)
        .await
        .with_context(|| format!("failed to start {name} integration"))?;
    tracing::info!(integration = name, "integration started");
    Ok(())
}

async fn stop_integration(integration: &mut impl Integration) {
    let name = integration.name();
    if let Err(err) = integration.teardown().await {
        tracing::warn!(integration = name, error = %err, "integration teardown failed");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
