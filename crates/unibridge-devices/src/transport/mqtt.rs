//! MQTT transport backed by rumqttc.

use super::{IncomingMessage, Transport};
use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use unibridge_core::config::MqttSettings;

/// Back-off between failed event loop polls.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Device-network transport over an MQTT broker.
///
/// Publishes and (un)subscriptions are queued with the non-blocking `try_*`
/// calls. A background task polls the event loop, forwards incoming
/// publishes into a bounded channel and re-subscribes every active filter
/// after each ConnAck.
pub struct MqttTransport {
    client: AsyncClient,
    filters: Arc<Mutex<BTreeSet<String>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Create the client and spawn its event loop task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(settings: &MqttSettings) -> (Self, mpsc::Receiver<IncomingMessage>) {
        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs));
        options.set_clean_session(settings.clean_session);
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            options.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(options, settings.request_capacity);
        let (tx, rx) = mpsc::channel(settings.incoming_capacity);
        let filters = Arc::new(Mutex::new(BTreeSet::new()));

        let broker = format!("{}:{}", settings.host, settings.port);
        let task = tokio::spawn(poll_loop(
            eventloop,
            client.clone(),
            filters.clone(),
            tx,
            broker.clone(),
        ));
        info!("MQTT transport connecting to {}", broker);

        (
            Self {
                client,
                filters,
                task: Mutex::new(Some(task)),
            },
            rx,
        )
    }

    /// Filters re-subscribed on reconnect.
    pub fn active_filters(&self) -> Vec<String> {
        self.filters.lock().iter().cloned().collect()
    }

    /// Stop the event loop task. Incoming channel closes afterwards.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        if let Err(e) = self.client.try_disconnect() {
            debug!("MQTT disconnect not queued: {}", e);
        }
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Transport for MqttTransport {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .map_err(|e| BridgeError::TransportFailure(format!("publish to {}: {}", topic, e)))
    }

    fn subscribe(&self, filter: &str) -> Result<()> {
        self.client
            .try_subscribe(filter, QoS::AtLeastOnce)
            .map_err(|e| BridgeError::TransportFailure(format!("subscribe to {}: {}", filter, e)))?;
        self.filters.lock().insert(filter.to_string());
        Ok(())
    }

    fn unsubscribe(&self, filter: &str) -> Result<()> {
        self.filters.lock().remove(filter);
        self.client
            .try_unsubscribe(filter)
            .map_err(|e| BridgeError::TransportFailure(format!("unsubscribe from {}: {}", filter, e)))
    }
}

async fn poll_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    filters: Arc<Mutex<BTreeSet<String>>>,
    tx: mpsc::Sender<IncomingMessage>,
    broker: String,
) {
    let mut error_count: u32 = 0;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                error_count = 0;
                let message = IncomingMessage::new(publish.topic, publish.payload.to_vec());
                if tx.send(message).await.is_err() {
                    debug!("Incoming channel closed, stopping MQTT loop for {}", broker);
                    break;
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                error_count = 0;
                let active: Vec<String> = filters.lock().iter().cloned().collect();
                info!(
                    "MQTT broker {} connection acknowledged, restoring {} subscriptions",
                    broker,
                    active.len()
                );
                for filter in active {
                    if let Err(e) = client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                        warn!("Failed to restore subscription {} on {}: {}", filter, broker, e);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                error_count += 1;
                if error_count == 1 {
                    error!("MQTT broker {} connection error: {}", broker, e);
                } else {
                    warn!("MQTT broker {} error ({} in a row): {}", broker, error_count, e);
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }

    info!("MQTT broker {} event loop stopped", broker);
}
