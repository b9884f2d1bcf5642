//! Translation and dispatch engine for Unibridge.
//!
//! This crate exposes device-network nodes (MQTT topics carrying JSON
//! attribute reports) as dynamic endpoints of the typed fabric data model.
//!
//! ## Architecture
//!
//! ```text
//! transport ──▶ MessageRouter ──┬─▶ NodeStateMonitor ──▶ FabricStack (register endpoint)
//!                               │         │ attach/detach
//!                               │         ▼
//!                               └─▶ ClusterTranslator / CommandTranslator ──▶ FabricStack (store, notify)
//!                                          ▲
//! fabric stack ── read / write / invoke ───┘──▶ Transport (publish)
//! ```
//!
//! The [`node_state::EndpointMap`] is the single source of truth for the
//! fabric endpoint ↔ device endpoint relation; every translator consults it.

pub mod bridge;
pub mod capability;
pub mod commands;
pub mod error;
pub mod fabric;
pub mod groups;
pub mod model;
pub mod node_state;
pub mod router;
pub mod stats;
pub mod topic;
pub mod translators;
pub mod transport;

pub use bridge::Bridge;
pub use capability::CapabilityTranslator;
pub use error::{BridgeError, Result};
pub use fabric::{
    AttributeId, AttributePath, ClusterId, CommandFields, CommandId, CommandPath,
    EndpointDescriptor, EndpointId, FabricIndex, FabricStack, FabricValue, GroupId,
    InvokeContext, Status,
};
pub use fabric::InMemoryFabric;
pub use groups::{GroupMapping, GroupStore, GroupTranslator};
pub use model::{DeviceCluster, DeviceEndpoint, DeviceNode, EndpointState, NetworkStatus};
pub use node_state::{EndpointMap, FabricEndpointMapping, NodeStateMonitor};
pub use router::MessageRouter;
pub use stats::{BridgeStats, StatsSnapshot};
pub use topic::{Topic, TopicScheme};
pub use translators::{
    AttributeTranslator, ClusterBinding, ClusterTranslator, EndpointBinding, ReportOutcome,
    TranslatorContext, TranslatorRegistry,
};
pub use commands::{CommandTranslator, InvokeResult, TableCommandTranslator};
pub use transport::{InMemoryTransport, IncomingMessage, Transport};
#[cfg(feature = "mqtt")]
pub use transport::MqttTransport;
