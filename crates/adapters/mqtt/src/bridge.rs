//! The MQTT bridge: sensor subscriptions in, commands and telemetry out.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Packet, Publish, QoS};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use shutterctl_app::ports::{CoverCommander, Integration, SensorSink, SensorUpdate, TelemetryPublisher};
use shutterctl_domain::error::ShutterError;
use shutterctl_domain::id::CoverId;
use shutterctl_domain::position::Position;
use shutterctl_domain::telemetry::Telemetry;

use crate::config::MqttConfig;
use crate::error::MqttError;
use crate::payload::{decode_reading, encode_position};
use crate::topics::Topics;

const CHANNEL_CAPACITY: usize = 20;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Outbound side of the bridge, cheap to clone.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    topics: Topics,
    qos: QoS,
    retain_telemetry: bool,
}

impl MqttPublisher {
    /// Queue without waiting: the event loop may itself be blocked on the
    /// engine, so a full request queue surfaces as a delivery error instead.
    fn send(&self, topic: String, retain: bool, payload: Vec<u8>) -> Result<(), MqttError> {
        self.client
            .try_publish(topic.as_str(), self.qos, retain, payload)
            .map_err(|source| MqttError::Publish { topic, source })
    }
}

impl CoverCommander for MqttPublisher {
    async fn move_cover(&self, cover: &CoverId, position: Position) -> Result<(), ShutterError> {
        tracing::debug!(%cover, position = position.value(), "publishing move command");
        self.send(self.topics.command(cover), false, encode_position(position))?;
        Ok(())
    }
}

impl TelemetryPublisher for MqttPublisher {
    async fn publish(&self, telemetry: Telemetry) -> Result<(), ShutterError> {
        let payload = serde_json::to_vec(&telemetry).map_err(|source| MqttError::Encode {
            cover: telemetry.cover_id.clone(),
            source,
        })?;
        self.send(
            self.topics.telemetry(&telemetry.cover_id),
            self.retain_telemetry,
            payload,
        )?;
        Ok(())
    }
}

/// MQTT integration.
///
/// The client is created eagerly so [`publisher`](Self::publisher) can be
/// wired into the engine before [`start`](Integration::start) connects.
pub struct MqttBridge {
    publisher: MqttPublisher,
    eventloop: Option<EventLoop>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MqttBridge {
    #[must_use]
    pub fn new(config: &MqttConfig) -> Self {
        let (client, eventloop) = AsyncClient::new(config.options(), CHANNEL_CAPACITY);
        Self {
            publisher: MqttPublisher {
                client,
                topics: Topics::new(&config.base_topic),
                qos: config.qos(),
                retain_telemetry: config.retain_telemetry,
            },
            eventloop: Some(eventloop),
            shutdown: None,
            task: None,
        }
    }

    #[must_use]
    pub fn publisher(&self) -> MqttPublisher {
        self.publisher.clone()
    }
}

impl Integration for MqttBridge {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn start(&mut self, sink: impl SensorSink + Clone + 'static) -> Result<(), ShutterError> {
        let eventloop = self.eventloop.take().ok_or(MqttError::AlreadyStarted)?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let publisher = self.publisher.clone();
        self.task = Some(tokio::spawn(run_event_loop(
            eventloop,
            publisher,
            sink,
            shutdown_rx,
        )));
        self.shutdown = Some(shutdown_tx);
        tracing::info!(filter = %self.publisher.topics.sensors_filter(), "MQTT bridge started");
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), ShutterError> {
        if let Err(err) = self.publisher.client.try_disconnect() {
            tracing::debug!(error = %err, "MQTT disconnect failed");
        }
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        Ok(())
    }
}

async fn run_event_loop<S: SensorSink>(
    mut eventloop: EventLoop,
    publisher: MqttPublisher,
    sink: S,
    mut shutdown: oneshot::Receiver<()>,
) {
    let filter = publisher.topics.sensors_filter();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("MQTT connected");
                    // the broker may have dropped the session
                    if let Err(err) = publisher.client.try_subscribe(filter.as_str(), publisher.qos) {
                        tracing::error!(error = %err, %filter, "MQTT subscribe failed");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(message))) => {
                    handle_publish(&publisher.topics, &sink, &message).await;
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    tracing::warn!("MQTT disconnected");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "MQTT connection error");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        () = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }
    tracing::debug!("MQTT event loop stopped");
}

async fn handle_publish<S: SensorSink>(topics: &Topics, sink: &S, message: &Publish) {
    let Some(source) = topics.sensor_source(&message.topic) else {
        tracing::trace!(topic = %message.topic, "ignoring topic");
        return;
    };
    let reading = match decode_reading(&message.payload, shutterctl_domain::time::now()) {
        Ok(reading) => reading,
        Err(err) => {
            tracing::warn!(topic = %message.topic, error = %err, "dropping sensor payload");
            return;
        }
    };
    if let Err(err) = sink.push(SensorUpdate::new(source, reading)).await {
        tracing::warn!(%source, error = %err, "sensor update rejected");
    }
}
