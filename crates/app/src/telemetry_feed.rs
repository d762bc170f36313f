//! Telemetry feed: fans published telemetry out to live subscribers.
//!
//! The feed remembers the latest telemetry of every cover, so a subscriber
//! that joins late starts from the current picture instead of waiting for
//! the next pass of each cover.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use shutterctl_domain::error::ShutterError;
use shutterctl_domain::id::CoverId;
use shutterctl_domain::telemetry::Telemetry;

use crate::ports::TelemetryPublisher;

/// What a new subscriber receives.
#[derive(Debug)]
pub struct Subscription {
    /// Latest telemetry per cover at subscription time, ordered by cover id.
    pub snapshot: Vec<Telemetry>,
    /// Everything published afterwards.
    pub updates: broadcast::Receiver<Telemetry>,
}

pub struct TelemetryFeed {
    sender: broadcast::Sender<Telemetry>,
    latest: Mutex<BTreeMap<CoverId, Telemetry>>,
}

impl TelemetryFeed {
    /// `capacity` bounds how far a slow subscriber may lag before it skips.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            latest: Mutex::new(BTreeMap::new()),
        }
    }

    fn latest(&self) -> MutexGuard<'_, BTreeMap<CoverId, Telemetry>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let latest = self.latest();
        // subscribing under the lock: no update lands between snapshot and receiver
        let updates = self.sender.subscribe();
        Subscription {
            snapshot: latest.values().cloned().collect(),
            updates,
        }
    }
}

impl TelemetryPublisher for TelemetryFeed {
    fn publish(&self, telemetry: Telemetry) -> impl Future<Output = Result<(), ShutterError>> + Send {
        let mut latest = self.latest();
        latest.insert(telemetry.cover_id.clone(), telemetry.clone());
        // no receivers is not an error
        let _ = self.sender.send(telemetry);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterctl_domain::position::Position;
    use shutterctl_domain::reason::ReasonCode;
    use shutterctl_domain::runtime::CoverRuntimeState;
    use shutterctl_domain::time::now;

    fn telemetry(cover: &str, target: i64, reason: ReasonCode) -> Telemetry {
        let state = CoverRuntimeState {
            last_commanded: Position::new(target).ok(),
            last_reason: reason,
            ..CoverRuntimeState::default()
        };
        Telemetry::from_state(cover.into(), &state, None, now())
    }

    #[tokio::test]
    async fn should_start_late_subscriber_from_latest_decision_per_cover() {
        let feed = TelemetryFeed::new(16);
        feed.publish(telemetry("cover.b", 100, ReasonCode::ScheduledOpen))
            .await
            .unwrap();
        feed.publish(telemetry("cover.a", 100, ReasonCode::Idle)).await.unwrap();
        feed.publish(telemetry("cover.a", 40, ReasonCode::Shading)).await.unwrap();

        let subscription = feed.subscribe();
        let seen: Vec<(&str, ReasonCode)> = subscription
            .snapshot
            .iter()
            .map(|t| (t.cover_id.as_str(), t.reason))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("cover.a", ReasonCode::Shading),
                ("cover.b", ReasonCode::ScheduledOpen)
            ]
        );
    }

    #[tokio::test]
    async fn should_stream_decisions_made_after_subscribing() {
        let feed = TelemetryFeed::new(16);
        let Subscription {
            snapshot,
            mut updates,
        } = feed.subscribe();
        assert!(snapshot.is_empty());

        feed.publish(telemetry("cover.a", 20, ReasonCode::WindProtection))
            .await
            .unwrap();
        let received = updates.recv().await.unwrap();
        assert_eq!(received.reason, ReasonCode::WindProtection);
        assert_eq!(received.target, Position::new(20).ok());
    }
}
