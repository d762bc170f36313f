//! # shutterctl-adapter-virtual
//!
//! Virtual/demo integration: simulated covers for testing and demonstration.
//!
//! Every move command is accepted, the simulated cover "travels" for the
//! configured time and then reports its new position through the sensor
//! sink, using the cover id as the source id. Covers configured without an
//! explicit position sensor therefore see their own echo.
//!
//! ## Dependency rule
//!
//! Depends on `shutterctl-app` (port traits) and `shutterctl-domain` only.

pub mod config;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use shutterctl_app::ports::{CoverCommander, Integration, SensorSink, SensorUpdate};
use shutterctl_domain::error::ShutterError;
use shutterctl_domain::id::CoverId;
use shutterctl_domain::position::Position;
use shutterctl_domain::sensor::{Availability, SensorReading, SensorValue};

pub use config::VirtualConfig;

#[derive(Debug, thiserror::Error)]
#[error("virtual covers are stopped")]
pub struct Stopped;

type Positions = Arc<Mutex<HashMap<CoverId, Position>>>;

/// Command side of the simulated covers, cheap to clone.
///
/// Commands are queued; the integration task applies them. This keeps the
/// control loop from waiting on its own sensor sink.
#[derive(Clone)]
pub struct VirtualCommander {
    positions: Positions,
    moves: mpsc::UnboundedSender<(CoverId, Position)>,
}

impl VirtualCommander {
    /// Last position reached by a simulated cover.
    pub async fn position(&self, cover: &CoverId) -> Option<Position> {
        self.positions.lock().await.get(cover).copied()
    }
}

impl CoverCommander for VirtualCommander {
    async fn move_cover(&self, cover: &CoverId, position: Position) -> Result<(), ShutterError> {
        tracing::debug!(%cover, position = position.value(), "virtual cover moving");
        self.moves
            .send((cover.clone(), position))
            .map_err(|_| ShutterError::delivery(Stopped))
    }
}

/// Virtual integration owning the simulated covers.
pub struct VirtualIntegration {
    commander: VirtualCommander,
    receiver: Option<mpsc::UnboundedReceiver<(CoverId, Position)>>,
    travel: Duration,
    task: Option<JoinHandle<()>>,
}

impl VirtualIntegration {
    #[must_use]
    pub fn new(config: &VirtualConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            commander: VirtualCommander {
                positions: Arc::default(),
                moves: sender,
            },
            receiver: Some(receiver),
            travel: Duration::from_secs(config.travel_secs),
            task: None,
        }
    }

    /// Seed a simulated cover; its position is reported on start.
    ///
    /// # Errors
    ///
    /// Returns [`ShutterError::Configuration`] for positions above 100.
    pub async fn add_cover(&self, cover: CoverId, position: u8) -> Result<(), ShutterError> {
        let position = Position::new(i64::from(position))?;
        self.commander.positions.lock().await.insert(cover, position);
        Ok(())
    }

    #[must_use]
    pub fn commander(&self) -> VirtualCommander {
        self.commander.clone()
    }
}

fn position_update(cover: &CoverId, position: Position) -> SensorUpdate {
    SensorUpdate::new(
        cover.as_str(),
        SensorReading::new(
            SensorValue::Number(f64::from(position.value())),
            Availability::Available,
            shutterctl_domain::time::now(),
        ),
    )
}

impl Integration for VirtualIntegration {
    fn name(&self) -> &'static str {
        "virtual"
    }

    async fn start(&mut self, sink: impl SensorSink + Clone + 'static) -> Result<(), ShutterError> {
        let mut receiver = self.receiver.take().ok_or(ShutterError::delivery(Stopped))?;

        let seeded: Vec<SensorUpdate> = self
            .commander
            .positions
            .lock()
            .await
            .iter()
            .map(|(cover, position)| position_update(cover, *position))
            .collect();
        for update in seeded {
            sink.push(update).await?;
        }

        let positions = self.commander.positions.clone();
        let travel = self.travel;
        self.task = Some(tokio::spawn(async move {
            while let Some((cover, position)) = receiver.recv().await {
                if !travel.is_zero() {
                    tokio::time::sleep(travel).await;
                }
                positions.lock().await.insert(cover.clone(), position);
                if let Err(err) = sink.push(position_update(&cover, position)).await {
                    tracing::warn!(%cover, error = %err, "virtual cover position not delivered");
                }
            }
        }));
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), ShutterError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingSink {
        updates: Arc<StdMutex<Vec<SensorUpdate>>>,
        notify: Arc<tokio::sync::Notify>,
    }

    impl SensorSink for RecordingSink {
        async fn push(&self, update: SensorUpdate) -> Result<(), ShutterError> {
            self.updates.lock().unwrap().push(update);
            self.notify.notify_one();
            Ok(())
        }
    }

    fn pos(value: i64) -> Position {
        Position::new(value).unwrap()
    }

    #[tokio::test]
    async fn should_return_virtual_as_name() {
        let integration = VirtualIntegration::new(&VirtualConfig::default());
        assert_eq!(integration.name(), "virtual");
    }

    #[tokio::test]
    async fn should_report_seeded_positions_on_start() {
        let mut integration = VirtualIntegration::new(&VirtualConfig::default());
        integration.add_cover("cover.a".into(), 100).await.unwrap();
        let sink = RecordingSink::default();

        integration.start(sink.clone()).await.unwrap();

        let updates = sink.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].source.as_str(), "cover.a");
        assert_eq!(updates[0].reading.value, SensorValue::Number(100.0));
    }

    #[tokio::test]
    async fn should_echo_commanded_position() {
        let mut integration = VirtualIntegration::new(&VirtualConfig::default());
        let sink = RecordingSink::default();
        integration.start(sink.clone()).await.unwrap();
        let commander = integration.commander();

        commander.move_cover(&"cover.a".into(), pos(30)).await.unwrap();
        sink.notify.notified().await;

        assert_eq!(commander.position(&"cover.a".into()).await, Some(pos(30)));
        let updates = sink.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].reading.value, SensorValue::Number(30.0));
    }

    #[tokio::test(start_paused = true)]
    async fn should_wait_for_travel_time_before_reporting() {
        let config = VirtualConfig {
            travel_secs: 20,
            ..VirtualConfig::default()
        };
        let mut integration = VirtualIntegration::new(&config);
        let sink = RecordingSink::default();
        integration.start(sink.clone()).await.unwrap();
        let commander = integration.commander();

        commander.move_cover(&"cover.a".into(), pos(0)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(sink.updates.lock().unwrap().is_empty());

        sink.notify.notified().await;
        assert_eq!(sink.updates.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_reject_seed_above_hundred() {
        let integration = VirtualIntegration::new(&VirtualConfig::default());
        let result = integration.add_cover("cover.a".into(), 150).await;
        assert!(matches!(result, Err(ShutterError::Configuration(_))));
    }

    #[tokio::test]
    async fn should_fail_commands_after_integration_dropped() {
        let integration = VirtualIntegration::new(&VirtualConfig::default());
        let commander = integration.commander();
        drop(integration);

        let result = commander.move_cover(&"cover.a".into(), pos(10)).await;
        assert!(matches!(result, Err(ShutterError::Delivery(_))));
    }

    #[tokio::test]
    async fn should_teardown_successfully() {
        let mut integration = VirtualIntegration::new(&VirtualConfig::default());
        integration.start(RecordingSink::default()).await.unwrap();
        assert!(integration.teardown().await.is_ok());
    }
}
