//! Bridge event types.
//!
//! Every lifecycle change inside the translation engine is announced as a
//! [`BridgeEvent`] on the event bus. Events are informational: nothing in
//! the engine depends on a subscriber being present.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified event type for the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    // ========== Discovery Events ==========
    /// A device-network node was seen for the first time.
    NodeDiscovered {
        node_id: String,
        network_status: String,
        timestamp: i64,
    },

    /// A device endpoint was exposed as a dynamic fabric endpoint.
    EndpointExposed {
        node_id: String,
        device_endpoint: u8,
        fabric_endpoint: u16,
        device_types: Vec<u32>,
        clusters: Vec<u32>,
        timestamp: i64,
    },

    /// A dynamic fabric endpoint was removed.
    EndpointRemoved {
        node_id: String,
        device_endpoint: u8,
        fabric_endpoint: u16,
        timestamp: i64,
    },

    /// A node went offline or came back.
    NodeReachabilityChanged {
        node_id: String,
        reachable: bool,
        timestamp: i64,
    },

    // ========== Attribute Events ==========
    /// A device report changed a cached attribute value.
    AttributeUpdated {
        fabric_endpoint: u16,
        cluster_id: u32,
        attribute_id: u32,
        value: serde_json::Value,
        timestamp: i64,
    },

    /// A device report was dropped because it failed validation.
    ReportRejected {
        node_id: String,
        device_endpoint: u8,
        cluster: String,
        attribute: String,
        reason: String,
        timestamp: i64,
    },

    // ========== Group Events ==========
    /// A fabric group was mapped onto a device-network group.
    GroupMapped {
        fabric_index: u8,
        fabric_group: u16,
        device_group: u16,
        timestamp: i64,
    },

    /// A group mapping was removed.
    GroupUnmapped {
        fabric_index: u8,
        fabric_group: u16,
        device_group: u16,
        timestamp: i64,
    },
}

impl BridgeEvent {
    /// Get the event type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NodeDiscovered { .. } => "NodeDiscovered",
            Self::EndpointExposed { .. } => "EndpointExposed",
            Self::EndpointRemoved { .. } => "EndpointRemoved",
            Self::NodeReachabilityChanged { .. } => "NodeReachabilityChanged",
            Self::AttributeUpdated { .. } => "AttributeUpdated",
            Self::ReportRejected { .. } => "ReportRejected",
            Self::GroupMapped { .. } => "GroupMapped",
            Self::GroupUnmapped { .. } => "GroupUnmapped",
        }
    }

    /// Get the event timestamp.
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::NodeDiscovered { timestamp, .. }
            | Self::EndpointExposed { timestamp, .. }
            | Self::EndpointRemoved { timestamp, .. }
            | Self::NodeReachabilityChanged { timestamp, .. }
            | Self::AttributeUpdated { timestamp, .. }
            | Self::ReportRejected { timestamp, .. }
            | Self::GroupMapped { timestamp, .. }
            | Self::GroupUnmapped { timestamp, .. } => *timestamp,
        }
    }

    /// Check if this is a node or endpoint lifecycle event.
    pub fn is_endpoint_event(&self) -> bool {
        matches!(
            self,
            Self::NodeDiscovered { .. }
                | Self::EndpointExposed { .. }
                | Self::EndpointRemoved { .. }
                | Self::NodeReachabilityChanged { .. }
        )
    }

    /// Check if this is an attribute event.
    pub fn is_attribute_event(&self) -> bool {
        matches!(
            self,
            Self::AttributeUpdated { .. } | Self::ReportRejected { .. }
        )
    }

    /// Check if this is a group event.
    pub fn is_group_event(&self) -> bool {
        matches!(self, Self::GroupMapped { .. } | Self::GroupUnmapped { .. })
    }
}

impl fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Current UNIX timestamp in seconds, used to stamp events.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Event metadata.
///
/// Attached to each event for tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub event_id: String,
    /// Event source (component that published)
    pub source: String,
    /// Event timestamp
    pub timestamp: i64,
}

impl EventMetadata {
    /// Create new event metadata.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            timestamp: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = BridgeEvent::GroupMapped {
            fabric_index: 1,
            fabric_group: 1,
            device_group: 7,
            timestamp: 42,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "GroupMapped");
        assert_eq!(json["device_group"], 7);

        let back: BridgeEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_classification() {
        let exposed = BridgeEvent::EndpointExposed {
            node_id: "zw-1".into(),
            device_endpoint: 1,
            fabric_endpoint: 2,
            device_types: vec![0x0100],
            clusters: vec![0x0006],
            timestamp: 0,
        };
        assert!(exposed.is_endpoint_event());
        assert!(!exposed.is_group_event());
        assert_eq!(exposed.to_string(), "EndpointExposed");

        let rejected = BridgeEvent::ReportRejected {
            node_id: "zw-1".into(),
            device_endpoint: 1,
            cluster: "OnOff".into(),
            attribute: "OnOff".into(),
            reason: "expected bool".into(),
            timestamp: 9,
        };
        assert!(rejected.is_attribute_event());
        assert_eq!(rejected.timestamp(), 9);
    }

    #[test]
    fn test_metadata_ids_are_unique() {
        let a = EventMetadata::new("nsm");
        let b = EventMetadata::new("nsm");
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.source, "nsm");
    }
}
