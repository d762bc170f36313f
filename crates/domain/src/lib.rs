//! # shutterctl-domain
//!
//! Pure domain model for the shutterctl cover automation engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Covers** (immutable per-cover configuration with global fallbacks)
//! - Define **Sensor values** and the per-pass **sensor snapshot**
//! - Define **Overrides** (manual pause / active shading hold windows)
//! - Define the per-cover **runtime state** and the **telemetry** it publishes
//! - Define the ordered **rule evaluator** that turns state into a decision
//! - Contain the scheduling arithmetic for sun-event triggers
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod cover;
pub mod overrides;
pub mod position;
pub mod reason;
pub mod rules;
pub mod runtime;
pub mod schedule;
pub mod sensor;
pub mod telemetry;
