//! Telemetry: the latest decision of a cover, as published to the platform.

use serde::{Deserialize, Serialize};

use crate::id::{CoverId, TelemetryId};
use crate::overrides::OverrideKind;
use crate::position::Position;
use crate::reason::ReasonCode;
use crate::runtime::CoverRuntimeState;
use crate::time::Timestamp;

/// Snapshot of one cover's decision and schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub id: TelemetryId,
    pub cover_id: CoverId,
    pub target: Option<Position>,
    pub reason: ReasonCode,
    /// Next sunrise-based trigger.
    pub next_open: Option<Timestamp>,
    /// Next sunset-based trigger.
    pub next_close: Option<Timestamp>,
    pub override_until: Option<Timestamp>,
    pub override_kind: Option<OverrideKind>,
    pub current_position: Option<Position>,
    pub published_at: Timestamp,
}

impl Telemetry {
    /// Build telemetry from runtime state.
    #[must_use]
    pub fn from_state(
        cover_id: CoverId,
        state: &CoverRuntimeState,
        current_position: Option<Position>,
        now: Timestamp,
    ) -> Self {
        let hold = state.active_override(now);
        Self {
            id: TelemetryId::new(),
            cover_id,
            target: state.last_commanded,
            reason: state.last_reason,
            next_open: state.next_open,
            next_close: state.next_close,
            override_until: hold.map(|h| h.until),
            override_kind: hold.map(|h| h.kind),
            current_position,
            published_at: now,
        }
    }

    /// Same decision, schedule and hold; ignores id, timestamp and position.
    #[must_use]
    pub fn same_decision(&self, other: &Self) -> bool {
        self.cover_id == other.cover_id
            && self.target == other.target
            && self.reason == other.reason
            && self.next_open == other.next_open
            && self.next_close == other.next_close
            && self.override_until == other.override_until
            && self.override_kind == other.override_kind
    }
}
