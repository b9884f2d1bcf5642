//! Per-cluster translators and their registry.
//!
//! Every supported fabric cluster has at most one [`AttributeTranslator`] and
//! at most one [`crate::commands::CommandTranslator`]. One instance serves
//! every endpoint the cluster is attached to. The [`TranslatorRegistry`] is
//! built once per bridge and shared by the node state monitor, the router
//! and the fabric-side entry points.

mod cluster;
mod subscriptions;

pub use cluster::{ClusterTranslator, ReportScope};
pub use subscriptions::SubscriptionSet;

use crate::capability::tables::{self, ids};
use crate::commands::{CommandTranslator, TableCommandTranslator};
use crate::error::{BridgeError, Result};
use crate::fabric::{AttributeId, AttributePath, ClusterId, EndpointId, FabricStack, FabricValue, Status};
use crate::groups::{GroupStore, GroupTranslator};
use crate::model::DeviceCluster;
use crate::node_state::EndpointMap;
use crate::stats::BridgeStats;
use crate::topic::TopicScheme;
use crate::transport::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use unibridge_core::event::BridgeEvent;
use unibridge_core::eventbus::SharedEventBus;

/// What a translator is told when its cluster is attached to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointBinding {
    pub fabric_endpoint: EndpointId,
    pub node_id: String,
    /// Device endpoint backing the fabric endpoint.
    pub device_endpoint: u8,
    /// Device endpoint hosting `cluster`. Differs from `device_endpoint`
    /// only for node-scoped clusters.
    pub source_endpoint: u8,
    pub cluster: DeviceCluster,
}

impl EndpointBinding {
    pub fn new(fabric_endpoint: EndpointId, node_id: impl Into<String>, device_endpoint: u8, cluster: DeviceCluster) -> Self {
        Self {
            fabric_endpoint,
            node_id: node_id.into(),
            device_endpoint,
            source_endpoint: device_endpoint,
            cluster,
        }
    }

    pub fn with_source_endpoint(mut self, source_endpoint: u8) -> Self {
        self.source_endpoint = source_endpoint;
        self
    }
}

/// Result of feeding a device-network message to a translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Value stored; at least one endpoint changed.
    Applied,
    /// Valid, but equal to the cached value.
    Unchanged,
    /// Empty payload removed the cached value.
    Cleared,
    /// No mapping for the endpoint or attribute.
    Ignored,
    /// Payload failed validation.
    Rejected,
}

/// Attachment lifecycle shared by attribute and command translators.
pub trait ClusterBinding: Send + Sync {
    fn cluster_id(&self) -> ClusterId;

    /// Start serving `binding`. Attaching an already-bound endpoint again
    /// refreshes what it knows about the device cluster.
    fn attach(&self, binding: &EndpointBinding) -> Result<()>;

    /// Stop serving an endpoint. Unknown endpoints are ignored.
    fn detach(&self, endpoint: EndpointId);
}

/// Read/Write/OnDeviceReport capability of one fabric cluster.
pub trait AttributeTranslator: ClusterBinding {
    fn read(&self, path: &AttributePath) -> std::result::Result<FabricValue, Status>;

    fn write(&self, path: &AttributePath, value: &FabricValue) -> Status;

    fn on_device_report(
        &self,
        node_id: &str,
        device_endpoint: u8,
        attribute: &str,
        payload: &[u8],
    ) -> ReportOutcome;

    /// Set a bridge-maintained value on a bound endpoint.
    fn seed(&self, endpoint: EndpointId, attribute: AttributeId, value: FabricValue);
}

/// Collaborators every translator needs.
#[derive(Clone)]
pub struct TranslatorContext {
    pub map: Arc<EndpointMap>,
    pub transport: Arc<dyn Transport>,
    pub fabric: Arc<dyn FabricStack>,
    pub topics: TopicScheme,
    pub stats: Arc<BridgeStats>,
    pub events: Option<SharedEventBus>,
}

impl TranslatorContext {
    /// Serialize and publish, counting the outcome.
    pub fn publish_json(&self, topic: &str, body: &serde_json::Value) -> Result<()> {
        let payload = serde_json::to_vec(body)?;
        let result = self.transport.publish(topic, &payload);
        self.stats.publish_result(&result);
        if let Err(e) = &result {
            warn!(topic = %topic, "Publish failed: {}", e);
        }
        result
    }

    pub fn emit(&self, event: BridgeEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

/// Translators keyed by fabric cluster id.
#[derive(Default)]
pub struct TranslatorRegistry {
    attributes: HashMap<ClusterId, Arc<dyn AttributeTranslator>>,
    commands: HashMap<ClusterId, Arc<dyn CommandTranslator>>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One table-driven translator per supported cluster, the Groups
    /// cluster handled by a [`GroupTranslator`].
    pub fn with_defaults(ctx: &TranslatorContext, groups: Arc<GroupStore>) -> Result<Self> {
        let mut registry = Self::new();
        for spec in tables::clusters() {
            registry.register_attribute(Arc::new(ClusterTranslator::new(spec, ctx.clone())))?;
            if spec.id == ids::GROUPS {
                registry.register_command(Arc::new(GroupTranslator::new(ctx.clone(), groups.clone())))?;
            } else if !spec.commands.is_empty() {
                registry.register_command(Arc::new(TableCommandTranslator::new(
                    spec,
                    ctx.clone(),
                    groups.clone(),
                )))?;
            }
        }
        Ok(registry)
    }

    pub fn register_attribute(&mut self, translator: Arc<dyn AttributeTranslator>) -> Result<()> {
        let cluster = translator.cluster_id();
        if self.attributes.contains_key(&cluster) {
            return Err(BridgeError::DuplicateExists(format!(
                "attribute translator for cluster {}",
                cluster
            )));
        }
        self.attributes.insert(cluster, translator);
        Ok(())
    }

    pub fn register_command(&mut self, translator: Arc<dyn CommandTranslator>) -> Result<()> {
        let cluster = translator.cluster_id();
        if self.commands.contains_key(&cluster) {
            return Err(BridgeError::DuplicateExists(format!(
                "command translator for cluster {}",
                cluster
            )));
        }
        self.commands.insert(cluster, translator);
        Ok(())
    }

    pub fn attribute(&self, cluster: ClusterId) -> Option<Arc<dyn AttributeTranslator>> {
        self.attributes.get(&cluster).cloned()
    }

    pub fn command(&self, cluster: ClusterId) -> Option<Arc<dyn CommandTranslator>> {
        self.commands.get(&cluster).cloned()
    }

    pub fn clusters(&self) -> Vec<ClusterId> {
        let mut clusters: Vec<ClusterId> = self
            .attributes
            .keys()
            .chain(self.commands.keys())
            .copied()
            .collect();
        clusters.sort_unstable();
        clusters.dedup();
        clusters
    }

    /// Attach every translator registered for `cluster`.
    pub fn attach(&self, cluster: ClusterId, binding: &EndpointBinding) -> Result<()> {
        if let Some(translator) = self.attributes.get(&cluster) {
            translator.attach(binding)?;
        }
        if let Some(translator) = self.commands.get(&cluster) {
            if let Err(e) = translator.attach(binding) {
                if let Some(attributes) = self.attributes.get(&cluster) {
                    attributes.detach(binding.fabric_endpoint);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn detach(&self, cluster: ClusterId, endpoint: EndpointId) {
        if let Some(translator) = self.attributes.get(&cluster) {
            translator.detach(endpoint);
        }
        if let Some(translator) = self.commands.get(&cluster) {
            translator.detach(endpoint);
        }
    }
}
