//! Device-network transport abstraction.
//!
//! The engine only needs three non-blocking calls. Delivery of incoming
//! messages happens through a channel owned by the caller, consumed by
//! [`crate::Bridge::run`] in arrival order.

use crate::error::Result;

pub mod memory;
#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use memory::InMemoryTransport;
#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

/// A message received from the device network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl IncomingMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publish/subscribe primitives of the device network.
///
/// All calls return as soon as the request is queued; a refusal is reported
/// as [`crate::BridgeError::TransportFailure`].
pub trait Transport: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()>;

    fn subscribe(&self, filter: &str) -> Result<()>;

    fn unsubscribe(&self, filter: &str) -> Result<()>;
}
