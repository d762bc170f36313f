//! Control loop: the single task that owns the [`Controller`].
//!
//! Everything else talks to it through a cloneable [`ControlHandle`]:
//! requests travel over an `mpsc` channel and answers come back on a
//! `oneshot`. Between messages the loop sleeps until the earliest cover timer
//! or the next housekeeping tick.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use shutterctl_domain::cover::{CoverConfigBuilder, CoverDirection, GlobalDefaults};
use shutterctl_domain::error::ShutterError;
use shutterctl_domain::id::CoverId;
use shutterctl_domain::telemetry::Telemetry;
use shutterctl_domain::time::{self, Timestamp};

use crate::controller::Controller;
use crate::ports::{CoverCommander, SensorSink, SensorUpdate, SolarCalendar, TelemetryPublisher};

type Reply<T> = oneshot::Sender<Result<T, ShutterError>>;

/// A request for the control loop.
#[derive(Debug)]
pub enum ControlMessage {
    Sensor(SensorUpdate),
    Reconfigure {
        defaults: GlobalDefaults,
        covers: Vec<CoverConfigBuilder>,
        reply: Reply<Vec<CoverId>>,
    },
    SetManualOverride {
        cover: CoverId,
        minutes: i64,
        reply: Reply<Telemetry>,
    },
    ActivateShading {
        cover: CoverId,
        /// Hold duration; the cover's default when absent.
        minutes: Option<i64>,
        reply: Reply<Telemetry>,
    },
    ClearOverride {
        cover: CoverId,
        reply: Reply<Telemetry>,
    },
    MoveCovers {
        direction: CoverDirection,
        cover: Option<CoverId>,
        reply: Reply<Vec<Telemetry>>,
    },
    RecalculateSchedule {
        cover: Option<CoverId>,
        reply: Reply<Vec<Telemetry>>,
    },
    Telemetry {
        cover: CoverId,
        reply: Reply<Telemetry>,
    },
    TelemetryAll {
        reply: oneshot::Sender<Vec<Telemetry>>,
    },
    Shutdown,
}

/// Cloneable client of the control loop.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    sender: mpsc::Sender<ControlMessage>,
}

/// Create a handle and the receiver the control loop consumes.
#[must_use]
pub fn channel(capacity: usize) -> (ControlHandle, mpsc::Receiver<ControlMessage>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (ControlHandle { sender }, receiver)
}

impl ControlHandle {
    async fn call<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> ControlMessage,
    ) -> Result<R, ShutterError> {
        let (reply, answer) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| ShutterError::EngineStopped)?;
        answer.await.map_err(|_| ShutterError::EngineStopped)
    }

    /// Replace the configuration.
    ///
    /// # Errors
    ///
    /// Configuration errors, or [`ShutterError::EngineStopped`].
    pub async fn reconfigure(
        &self,
        defaults: GlobalDefaults,
        covers: Vec<CoverConfigBuilder>,
    ) -> Result<Vec<CoverId>, ShutterError> {
        self.call(|reply| ControlMessage::Reconfigure {
            defaults,
            covers,
            reply,
        })
        .await?
    }

    /// # Errors
    ///
    /// Unknown cover, non-positive duration, or a stopped engine.
    pub async fn set_manual_override(
        &self,
        cover: CoverId,
        minutes: i64,
    ) -> Result<Telemetry, ShutterError> {
        self.call(|reply| ControlMessage::SetManualOverride {
            cover,
            minutes,
            reply,
        })
        .await?
    }

    /// # Errors
    ///
    /// Unknown cover, invalid duration, or a stopped engine.
    pub async fn activate_shading(
        &self,
        cover: CoverId,
        minutes: Option<i64>,
    ) -> Result<Telemetry, ShutterError> {
        self.call(|reply| ControlMessage::ActivateShading {
            cover,
            minutes,
            reply,
        })
        .await?
    }

    /// # Errors
    ///
    /// Unknown cover, or a stopped engine.
    pub async fn clear_override(&self, cover: CoverId) -> Result<Telemetry, ShutterError> {
        self.call(|reply| ControlMessage::ClearOverride { cover, reply })
            .await?
    }

    /// # Errors
    ///
    /// Unknown cover, or a stopped engine.
    pub async fn move_covers(
        &self,
        direction: CoverDirection,
        cover: Option<CoverId>,
    ) -> Result<Vec<Telemetry>, ShutterError> {
        self.call(|reply| ControlMessage::MoveCovers {
            direction,
            cover,
            reply,
        })
        .await?
    }

    /// # Errors
    ///
    /// Unknown cover, scheduling failure, or a stopped engine.
    pub async fn recalculate_schedule(
        &self,
        cover: Option<CoverId>,
    ) -> Result<Vec<Telemetry>, ShutterError> {
        self.call(|reply| ControlMessage::RecalculateSchedule { cover, reply })
            .await?
    }

    /// # Errors
    ///
    /// Unknown cover, or a stopped engine.
    pub async fn telemetry(&self, cover: CoverId) -> Result<Telemetry, ShutterError> {
        self.call(|reply| ControlMessage::Telemetry { cover, reply })
            .await?
    }

    /// # Errors
    ///
    /// [`ShutterError::EngineStopped`].
    pub async fn telemetry_all(&self) -> Result<Vec<Telemetry>, ShutterError> {
        self.call(|reply| ControlMessage::TelemetryAll { reply })
            .await
    }

    /// Ask the loop to stop after the current message.
    pub async fn shutdown(&self) {
        // already stopped is fine
        let _ = self.sender.send(ControlMessage::Shutdown).await;
    }
}

impl SensorSink for ControlHandle {
    async fn push(&self, update: SensorUpdate) -> Result<(), ShutterError> {
        self.sender
            .send(ControlMessage::Sensor(update))
            .await
            .map_err(|_| ShutterError::EngineStopped)
    }
}

/// Timing of the control loop.
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    /// Period of the housekeeping sweep (scheduling retries, sun position).
    pub housekeeping: Duration,
    /// Compute sun elevation/azimuth and feed them as sensor updates.
    pub publish_sun_position: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            housekeeping: Duration::from_secs(60),
            publish_sun_position: true,
        }
    }
}

fn until(deadline: Timestamp, now: Timestamp) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

async fn sleep_for(wake: Option<Duration>) {
    match wake {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Handle one message. Returns `false` on shutdown.
async fn handle<C, M, T>(
    controller: &mut Controller<C, M, T>,
    message: ControlMessage,
    now: Timestamp,
) -> bool
where
    C: SolarCalendar,
    M: CoverCommander,
    T: TelemetryPublisher,
{
    // a dropped reply receiver means the caller gave up; nothing to do
    match message {
        ControlMessage::Sensor(update) => {
            controller.on_sensor_update(update.source, update.reading);
        }
        ControlMessage::Reconfigure {
            defaults,
            covers,
            reply,
        } => {
            let result = controller
                .reconfigure(defaults, covers, now)
                .map_err(ShutterError::from);
            let _ = reply.send(result);
        }
        ControlMessage::SetManualOverride {
            cover,
            minutes,
            reply,
        } => {
            let _ = reply.send(controller.set_manual_override(&cover, minutes, now).await);
        }
        ControlMessage::ActivateShading {
            cover,
            minutes,
            reply,
        } => {
            let _ = reply.send(controller.activate_shading(&cover, minutes, now).await);
        }
        ControlMessage::ClearOverride { cover, reply } => {
            let _ = reply.send(controller.clear_override(&cover, now).await);
        }
        ControlMessage::MoveCovers {
            direction,
            cover,
            reply,
        } => {
            let _ = reply.send(controller.move_covers(direction, cover.as_ref(), now).await);
        }
        ControlMessage::RecalculateSchedule { cover, reply } => {
            let _ = reply.send(controller.recalculate_schedule(cover.as_ref(), now).await);
        }
        ControlMessage::Telemetry { cover, reply } => {
            let _ = reply.send(controller.telemetry(&cover, now));
        }
        ControlMessage::TelemetryAll { reply } => {
            let _ = reply.send(controller.telemetry_all(now));
        }
        ControlMessage::Shutdown => return false,
    }
    true
}

/// Run the control loop until [`ControlHandle::shutdown`] or until every
/// handle is dropped.
pub async fn run<C, M, T>(
    mut controller: Controller<C, M, T>,
    mut receiver: mpsc::Receiver<ControlMessage>,
    config: RunnerConfig,
) where
    C: SolarCalendar,
    M: CoverCommander,
    T: TelemetryPublisher,
{
    let mut housekeeping = tokio::time::interval(config.housekeeping);
    housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(
        housekeeping_secs = config.housekeeping.as_secs(),
        publish_sun_position = config.publish_sun_position,
        "control loop started"
    );

    loop {
        let wake = controller
            .next_deadline()
            .map(|deadline| until(deadline, time::now()));
        tokio::select! {
            message = receiver.recv() => {
                let Some(message) = message else {
                    break;
                };
                if !handle(&mut controller, message, time::now()).await {
                    break;
                }
            }
            () = sleep_for(wake) => {
                controller.fire_due(time::now());
            }
            _ = housekeeping.tick() => {
                let now = time::now();
                if config.publish_sun_position {
                    controller.feed_sun_position(now);
                }
                controller.housekeeping(now);
            }
        }
        controller.process_pending(time::now()).await;
    }
    tracing::info!("control loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterctl_domain::cover::{CoverConfig, SensorSources};
    use shutterctl_domain::reason::ReasonCode;
    use shutterctl_domain::schedule::MissedEventPolicy;
    use shutterctl_domain::sensor::SensorReading;

    use crate::decision_engine::DecisionEngine;
    use crate::dispatcher::CommandDispatcher;
    use crate::dispatcher::tests::{RecordingCommander, RecordingPublisher};
    use crate::scheduler::SunScheduler;
    use crate::scheduler::tests::FixedCalendar;
    use crate::sensor_aggregator::SensorAggregator;

    fn spawn() -> (ControlHandle, RecordingCommander, tokio::task::JoinHandle<()>) {
        let commander = RecordingCommander::default();
        let controller = Controller::new(
            DecisionEngine::new(SunScheduler::new(
                FixedCalendar::default(),
                MissedEventPolicy::Skip,
            )),
            CommandDispatcher::new(commander.clone(), RecordingPublisher::default()),
            SensorAggregator::new(None),
        );
        let (handle, receiver) = channel(16);
        let task = tokio::spawn(run(
            controller,
            receiver,
            RunnerConfig {
                housekeeping: Duration::from_secs(3600),
                publish_sun_position: false,
            },
        ));
        (handle, commander, task)
    }

    fn defaults() -> GlobalDefaults {
        GlobalDefaults {
            sensors: SensorSources {
                wind_speed: Some("sensor.wind".into()),
                ..SensorSources::default()
            },
            ..GlobalDefaults::default()
        }
    }

    #[tokio::test]
    async fn should_answer_telemetry_for_configured_covers() {
        let (handle, _, _) = spawn();
        handle
            .reconfigure(defaults(), vec![CoverConfig::builder("cover.a")])
            .await
            .unwrap();
        let all = handle.telemetry_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].cover_id.as_str(), "cover.a");
    }

    #[tokio::test]
    async fn should_evaluate_after_sensor_push() {
        let (handle, commander, _) = spawn();
        handle
            .reconfigure(defaults(), vec![CoverConfig::builder("cover.a")])
            .await
            .unwrap();
        handle
            .push(SensorUpdate::new(
                "sensor.wind",
                SensorReading::from_raw("80", time::now()),
            ))
            .await
            .unwrap();

        let t = handle.telemetry("cover.a".into()).await.unwrap();
        assert_eq!(t.reason, ReasonCode::WindProtection);
        assert_eq!(commander.moves().len(), 1);
    }

    #[tokio::test]
    async fn should_surface_not_found_through_handle() {
        let (handle, _, _) = spawn();
        let err = handle
            .set_manual_override("cover.ghost".into(), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ShutterError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_stop_on_shutdown_and_report_stopped_engine() {
        let (handle, _, task) = spawn();
        handle.shutdown().await;
        task.await.unwrap();
        let err = handle.telemetry_all().await.unwrap_err();
        assert!(matches!(err, ShutterError::EngineStopped));
    }
}
