//! Command Dispatcher: turns verdicts into move commands and telemetry.
//!
//! A command is sent only when the target differs from the last commanded
//! position. Reason-only changes refresh telemetry without moving the cover.
//! The state records intent: a failed delivery is not rolled back. It is
//! flagged on the cover's state and retried on its next evaluation.

use std::collections::HashMap;

use shutterctl_domain::id::CoverId;
use shutterctl_domain::position::Position;
use shutterctl_domain::rules::Verdict;
use shutterctl_domain::runtime::CoverRuntimeState;
use shutterctl_domain::telemetry::Telemetry;
use shutterctl_domain::time::Timestamp;

use crate::ports::{CoverCommander, TelemetryPublisher};

/// What [`CommandDispatcher::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Same target, same reason, same schedule; nothing sent.
    Unchanged,
    /// Telemetry refreshed, the cover was not moved.
    Refreshed,
    /// A move command was delivered.
    Moved(Position),
    /// The move command could not be delivered; it will be retried.
    Failed(Position),
}

/// Applies verdicts through the commander and telemetry publisher ports.
pub struct CommandDispatcher<M, T> {
    commander: M,
    publisher: T,
    published: HashMap<CoverId, Telemetry>,
}

impl<M, T> CommandDispatcher<M, T>
where
    M: CoverCommander,
    T: TelemetryPublisher,
{
    pub fn new(commander: M, publisher: T) -> Self {
        Self {
            commander,
            publisher,
            published: HashMap::new(),
        }
    }

    /// Apply `verdict` to `cover`, updating `state` with the new intent.
    pub async fn apply(
        &mut self,
        cover: &CoverId,
        state: &mut CoverRuntimeState,
        verdict: Verdict,
        current_position: Option<Position>,
        now: Timestamp,
    ) -> Dispatch {
        let mut outcome = Dispatch::Unchanged;

        if let Some(target) = verdict.target {
            let changed = state.last_commanded != Some(target);
            if changed || state.delivery_pending {
                state.last_commanded = Some(target);
                state.last_commanded_at = Some(now);
                outcome = match self.commander.move_cover(cover, target).await {
                    Ok(()) => {
                        state.delivery_pending = false;
                        tracing::info!(
                            cover = %cover,
                            position = %target,
                            reason = %verdict.reason,
                            "cover commanded"
                        );
                        Dispatch::Moved(target)
                    }
                    Err(err) => {
                        state.delivery_pending = true;
                        tracing::warn!(
                            cover = %cover,
                            position = %target,
                            reason = %verdict.reason,
                            error = %err,
                            "command delivery failed"
                        );
                        Dispatch::Failed(target)
                    }
                };
            }
        }
        state.last_reason = verdict.reason;

        let telemetry = Telemetry::from_state(cover.clone(), state, current_position, now);
        let fresh = self
            .published
            .get(cover)
            .is_none_or(|previous| !previous.same_decision(&telemetry));
        if fresh {
            self.published.insert(cover.clone(), telemetry.clone());
            if let Err(err) = self.publisher.publish(telemetry).await {
                tracing::warn!(cover = %cover, error = %err, "telemetry publish failed");
            }
            if outcome == Dispatch::Unchanged {
                outcome = Dispatch::Refreshed;
            }
        }
        outcome
    }

    /// Latest published telemetry of a cover.
    #[must_use]
    pub fn last_published(&self, cover: &CoverId) -> Option<&Telemetry> {
        self.published.get(cover)
    }

    /// Forget everything about a removed cover.
    pub fn forget(&mut self, cover: &CoverId) {
        self.published.remove(cover);
    }
}
