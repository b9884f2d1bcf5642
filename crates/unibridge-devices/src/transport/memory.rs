//! Recording transport for tests and offline runs.

use super::Transport;
use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use std::collections::BTreeSet;

#[derive(Default)]
struct Recorded {
    published: Vec<(String, Vec<u8>)>,
    subscriptions: BTreeSet<String>,
    rejecting: bool,
}

/// Transport that records publishes and subscription filters.
#[derive(Default)]
pub struct InMemoryTransport {
    inner: Mutex<Recorded>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every subsequent publish and subscribe.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.inner.lock().rejecting = rejecting;
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.inner.lock().published.clone()
    }

    pub fn take_published(&self) -> Vec<(String, Vec<u8>)> {
        std::mem::take(&mut self.inner.lock().published)
    }

    /// Decoded JSON body of the last publish on `topic`.
    pub fn last_json(&self, topic: &str) -> Option<serde_json::Value> {
        self.inner
            .lock()
            .published
            .iter()
            .rev()
            .find(|(t, _)| t == topic)
            .and_then(|(_, payload)| serde_json::from_slice(payload).ok())
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.lock().subscriptions.iter().cloned().collect()
    }

    pub fn is_subscribed(&self, filter: &str) -> bool {
        self.inner.lock().subscriptions.contains(filter)
    }
}

impl Transport for InMemoryTransport {
    fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.rejecting {
            return Err(BridgeError::TransportFailure(format!("publish to {} refused", topic)));
        }
        inner.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn subscribe(&self, filter: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.rejecting {
            return Err(BridgeError::TransportFailure(format!("subscribe to {} refused", filter)));
        }
        inner.subscriptions.insert(filter.to_string());
        Ok(())
    }

    fn unsubscribe(&self, filter: &str) -> Result<()> {
        self.inner.lock().subscriptions.remove(filter);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_rejects() {
        let transport = InMemoryTransport::new();
        transport.subscribe("by-id/+/State").unwrap();
        transport.publish("a/b", br#"{"value":1}"#).unwrap();
        assert!(transport.is_subscribed("by-id/+/State"));
        assert_eq!(transport.last_json("a/b"), Some(serde_json::json!({"value": 1})));

        transport.set_rejecting(true);
        assert!(matches!(
            transport.publish("a/b", b"{}"),
            Err(BridgeError::TransportFailure(_))
        ));
        assert_eq!(transport.take_published().len(), 1);
        assert!(transport.published().is_empty());

        transport.unsubscribe("by-id/+/State").unwrap();
        assert!(transport.subscriptions().is_empty());
    }
}
