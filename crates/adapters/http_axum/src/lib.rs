//! # shutterctl-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a JSON API for the engine's operator commands
//!   (`/api/covers`, `/api/covers/{id}/override`, `/api/schedule/recalculate`, …)
//! - Stream telemetry as Server-Sent Events (`/api/telemetry/stream`)
//! - Map HTTP requests into control-loop calls (driving adapter)
//! - Map engine errors into HTTP status codes
//!
//! ## Dependency rule
//! Depends on `shutterctl-app` (for the control handle and telemetry bus) and
//! `shutterctl-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
