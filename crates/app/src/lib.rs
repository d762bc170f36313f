//! # shutterctl-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `CoverCommander`: send a move command to a cover
//!   - `TelemetryPublisher`: publish the latest decision of a cover
//!   - `SolarCalendar`: sun events, sun position and local time
//!   - `SensorSink` / `Integration`: how protocol bridges feed sensor changes
//! - Provide the engine's use-cases:
//!   - `SensorAggregator`: latest value of every referenced source
//!   - `SunScheduler`: arms and re-arms sunrise/sunset triggers
//!   - `OverrideManager`: manual and shading holds
//!   - `DecisionEngine`: one evaluation pass per cover
//!   - `CommandDispatcher`: debounced move commands and telemetry
//!   - `Controller` + `runner`: coalesced evaluation queue, timers, control loop
//! - Provide **in-process infrastructure** (telemetry feed with a per-cover snapshot) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `shutterctl-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod controller;
pub mod decision_engine;
pub mod dispatcher;
pub mod override_manager;
pub mod ports;
pub mod runner;
pub mod scheduler;
pub mod sensor_aggregator;
pub mod telemetry_feed;
pub mod timers;
