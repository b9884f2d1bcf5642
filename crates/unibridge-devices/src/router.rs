//! Routes device-network messages to the monitor and the translators.

use crate::capability::CapabilityTranslator;
use crate::error::{BridgeError, Result};
use crate::model::NetworkStatus;
use crate::node_state::NodeStateMonitor;
use crate::stats::BridgeStats;
use crate::topic::{Topic, TopicScheme};
use crate::translators::{ReportOutcome, TranslatorRegistry};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Deserialize)]
struct NodeStatePayload {
    #[serde(rename = "NetworkStatus")]
    network_status: String,
}

#[derive(Debug, Deserialize)]
struct SupportedCommandsPayload {
    value: Vec<String>,
}

/// Single consumer of the inbound message stream.
pub struct MessageRouter {
    topics: TopicScheme,
    capabilities: CapabilityTranslator,
    monitor: Arc<NodeStateMonitor>,
    registry: Arc<TranslatorRegistry>,
    stats: Arc<BridgeStats>,
}

impl MessageRouter {
    pub fn new(
        topics: TopicScheme,
        monitor: Arc<NodeStateMonitor>,
        registry: Arc<TranslatorRegistry>,
        stats: Arc<BridgeStats>,
    ) -> Self {
        Self {
            topics,
            capabilities: CapabilityTranslator::new(),
            monitor,
            registry,
            stats,
        }
    }

    /// Handle one message. Topics outside the layout are ignored; malformed
    /// discovery payloads are returned as errors for the caller to log.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let parsed = match self.topics.parse(topic) {
            Some(parsed) => parsed,
            None => {
                trace!(topic = %topic, "Ignoring foreign topic");
                return Ok(());
            }
        };

        match parsed {
            Topic::NodeState { node_id } => {
                let status = parse_node_state(payload)?;
                self.monitor.on_node_state(&node_id, status)?;
            }
            Topic::SupportedCommands {
                node_id,
                endpoint,
                cluster,
            } => {
                let commands = if payload.is_empty() {
                    None
                } else {
                    let body: SupportedCommandsPayload = serde_json::from_slice(payload)
                        .map_err(|e| BridgeError::Malformed(format!("{}: {}", topic, e)))?;
                    Some(body.value)
                };
                self.monitor
                    .on_supported_commands(&node_id, endpoint, &cluster, commands)?;
            }
            Topic::AttributeReported {
                node_id,
                endpoint,
                cluster,
                attribute,
            } => {
                let cluster_id = match self.capabilities.resolve_cluster(&cluster) {
                    Ok(id) => id,
                    Err(_) => {
                        self.stats.report_unmapped();
                        debug!(node_id = %node_id, cluster = %cluster, "Report for unsupported cluster");
                        return Ok(());
                    }
                };
                if !payload.is_empty() {
                    self.monitor
                        .on_attribute_declared(&node_id, endpoint, &cluster, &attribute);
                }
                if let Some(translator) = self.registry.attribute(cluster_id) {
                    let outcome = translator.on_device_report(&node_id, endpoint, &attribute, payload);
                    trace!(topic = %topic, ?outcome, "Report handled");
                }
            }
            Topic::CommandResponse {
                node_id,
                endpoint,
                cluster,
                command,
            } => {
                let outcome = self
                    .capabilities
                    .resolve_cluster(&cluster)
                    .ok()
                    .and_then(|id| self.registry.command(id))
                    .map(|translator| translator.on_device_response(&node_id, endpoint, &command, payload))
                    .unwrap_or(ReportOutcome::Ignored);
                trace!(topic = %topic, ?outcome, "Command response handled");
            }
        }
        Ok(())
    }
}

/// `None` is the empty payload: the node left the network.
fn parse_node_state(payload: &[u8]) -> Result<Option<NetworkStatus>> {
    if payload.is_empty() {
        return Ok(None);
    }
    let body: NodeStatePayload = serde_json::from_slice(payload)
        .map_err(|e| BridgeError::Malformed(format!("node state: {}", e)))?;
    NetworkStatus::parse(&body.network_status)
        .map(Some)
        .ok_or_else(|| BridgeError::Malformed(format!("unknown network status {:?}", body.network_status)))
}
