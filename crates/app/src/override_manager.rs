//! Override Manager: arms, clears and expires per-cover holds.
//!
//! Expiry has no timer of its own: every evaluation pass calls
//! [`OverrideManager::expire`] first.

use chrono::Duration;

use shutterctl_domain::cover::CoverConfig;
use shutterctl_domain::overrides::{Override, OverrideKind};
use shutterctl_domain::position::Position;
use shutterctl_domain::runtime::CoverRuntimeState;
use shutterctl_domain::time::Timestamp;

/// Commands moved within this window count as still travelling.
pub const MOVE_SETTLE: Duration = Duration::seconds(120);

/// Stateless operations over a cover's [`CoverRuntimeState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OverrideManager;

impl OverrideManager {
    /// Hold the cover for `duration`, optionally at a fixed position.
    pub fn set_manual(
        self,
        state: &mut CoverRuntimeState,
        duration: Duration,
        position: Option<Position>,
        now: Timestamp,
    ) -> Override {
        let mut hold = Override::new(OverrideKind::Manual, now, duration);
        hold.position = position;
        state.hold = Some(hold);
        tracing::debug!(until = %hold.until, "manual override armed");
        hold
    }

    /// Hold the shading position for `duration`.
    pub fn activate_shading(
        self,
        state: &mut CoverRuntimeState,
        config: &CoverConfig,
        duration: Duration,
        now: Timestamp,
    ) -> Override {
        let hold = Override::new(OverrideKind::Shading, now, duration)
            .holding(config.shading_position);
        state.hold = Some(hold);
        tracing::debug!(cover = %config.id, until = %hold.until, "shading override armed");
        hold
    }

    pub fn clear(self, state: &mut CoverRuntimeState) -> Option<Override> {
        state.hold.take()
    }

    #[must_use]
    pub fn is_active(self, state: &CoverRuntimeState, now: Timestamp) -> bool {
        state.active_override(now).is_some()
    }

    /// Drop the hold once `now ≥ until`.
    pub fn expire(self, state: &mut CoverRuntimeState, now: Timestamp) -> Option<Override> {
        let expired = state.expire_override(now);
        debug_assert!(state.hold.is_none_or(|hold| hold.is_active(now)));
        expired
    }

    /// Arm a manual override if the cover was moved by hand.
    ///
    /// A move counts as manual when the reported position is further than the
    /// tolerance from the last command, no hold is active, and the last
    /// command was delivered and had time to settle.
    pub fn detect_manual_movement(
        self,
        state: &mut CoverRuntimeState,
        config: &CoverConfig,
        reported: Option<Position>,
        now: Timestamp,
    ) -> Option<Override> {
        let reported = reported?;
        let commanded = state.last_commanded?;
        // an undelivered command never moved the cover
        if state.delivery_pending {
            return None;
        }
        if self.is_active(state, now) || reported.distance(commanded) <= config.position_tolerance {
            return None;
        }
        if state
            .last_commanded_at
            .is_some_and(|at| now - at < MOVE_SETTLE)
        {
            return None;
        }
        tracing::info!(
            cover = %config.id,
            commanded = %commanded,
            reported = %reported,
            "manual movement detected"
        );
        Some(self.set_manual(state, config.default_override(), Some(reported), now))
    }
}
