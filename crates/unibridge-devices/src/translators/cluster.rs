//! Table-driven attribute translator.

use super::{AttributeTranslator, ClusterBinding, EndpointBinding, ReportOutcome, SubscriptionSet, TranslatorContext};
use crate::capability::tables::{ids, AttributeSpec, ClusterSpec, CLUSTER_REVISION, FEATURE_MAP};
use crate::capability::value::{from_device, to_device};
use crate::error::{BridgeError, Result};
use crate::fabric::{AttributeId, AttributePath, ClusterId, EndpointId, FabricValue, Status};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, trace, warn};
use unibridge_core::event::{now, BridgeEvent};

/// Which device reports feed a bound endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    /// Reports from the backing device endpoint only.
    Endpoint,
    /// Reports from any endpoint of the node.
    Node,
}

#[derive(Debug)]
struct Bound {
    node_id: String,
    device_endpoint: u8,
    source_endpoint: u8,
    filters: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct ClusterState {
    bound: HashMap<EndpointId, Bound>,
    cache: HashMap<(EndpointId, AttributeId), FabricValue>,
    subscriptions: SubscriptionSet,
}

/// Attribute translator for one cluster of the capability tables.
///
/// Holds the per-endpoint value cache. Reads are served from the cache;
/// writes are published to the device and confirmed later by a report.
/// Reports and writes race with last-write-wins by arrival order.
pub struct ClusterTranslator {
    spec: &'static ClusterSpec,
    scope: ReportScope,
    ctx: TranslatorContext,
    state: Mutex<ClusterState>,
}

impl ClusterTranslator {
    pub fn new(spec: &'static ClusterSpec, ctx: TranslatorContext) -> Self {
        let scope = if spec.id == ids::BRIDGED_DEVICE_BASIC_INFORMATION {
            ReportScope::Node
        } else {
            ReportScope::Endpoint
        };
        Self {
            spec,
            scope,
            ctx,
            state: Mutex::new(ClusterState::default()),
        }
    }

    pub fn spec(&self) -> &'static ClusterSpec {
        self.spec
    }

    pub fn scope(&self) -> ReportScope {
        self.scope
    }

    pub fn bound_endpoints(&self) -> Vec<EndpointId> {
        let mut endpoints: Vec<_> = self.state.lock().bound.keys().copied().collect();
        endpoints.sort_unstable();
        endpoints
    }

    /// Device attributes to subscribe for a binding. An empty declared set
    /// means the device has not reported anything yet: take every attribute.
    fn report_filters(&self, binding: &EndpointBinding) -> BTreeSet<String> {
        let declared = &binding.cluster.attributes;
        self.spec
            .attributes
            .iter()
            .filter_map(|attr| attr.device_name)
            .filter(|name| declared.is_empty() || declared.contains(*name))
            .map(|name| match self.scope {
                ReportScope::Endpoint => self.ctx.topics.attribute_reported(
                    &binding.node_id,
                    binding.device_endpoint,
                    self.spec.device_name,
                    name,
                ),
                ReportScope::Node => {
                    self.ctx
                        .topics
                        .attribute_reported_any_endpoint(&binding.node_id, self.spec.device_name, name)
                }
            })
            .collect()
    }

    /// Shared validation of the Read and Write paths.
    fn check_path(&self, path: &AttributePath) -> std::result::Result<Option<&'static AttributeSpec>, Status> {
        if path.cluster != self.spec.id {
            return Err(Status::UnsupportedCluster);
        }
        if !self.ctx.map.contains(path.endpoint) {
            return Err(Status::UnsupportedEndpoint);
        }
        if !self.state.lock().bound.contains_key(&path.endpoint) {
            return Err(Status::UnsupportedAttribute);
        }
        if path.attribute == CLUSTER_REVISION || path.attribute == FEATURE_MAP {
            return Ok(None);
        }
        self.spec
            .attribute(path.attribute)
            .map(Some)
            .ok_or(Status::UnsupportedAttribute)
    }

    /// Fabric endpoints a report from `node_id`/`device_endpoint` applies to.
    fn targets(&self, state: &ClusterState, node_id: &str, device_endpoint: u8) -> Vec<EndpointId> {
        match self.scope {
            ReportScope::Endpoint => self
                .ctx
                .map
                .lookup(node_id, device_endpoint)
                .filter(|id| state.bound.contains_key(id))
                .into_iter()
                .collect(),
            ReportScope::Node => {
                let mut ids: Vec<_> = state
                    .bound
                    .iter()
                    .filter(|(_, bound)| bound.node_id == node_id)
                    .map(|(id, _)| *id)
                    .collect();
                ids.sort_unstable();
                ids
            }
        }
    }

    /// Push changed values into the fabric store, outside the state lock.
    fn publish_changes(&self, attribute: AttributeId, changed: &[(EndpointId, FabricValue)]) {
        for (endpoint, value) in changed {
            let path = AttributePath::new(*endpoint, self.spec.id, attribute);
            self.ctx.fabric.store_attribute(&path, value);
            if self.ctx.fabric.is_subscribed(&path) {
                self.ctx.fabric.notify_attribute_change(&path);
            }
            self.ctx.emit(BridgeEvent::AttributeUpdated {
                fabric_endpoint: endpoint.0,
                cluster_id: self.spec.id.0,
                attribute_id: attribute.0,
                value: value.to_json(),
                timestamp: now(),
            });
        }
    }

    fn reject(&self, node_id: &str, device_endpoint: u8, attribute: &str, reason: String) -> ReportOutcome {
        self.ctx.stats.report_malformed();
        warn!(
            node_id = %node_id,
            endpoint = device_endpoint,
            cluster = self.spec.device_name,
            attribute = %attribute,
            "Dropping malformed report: {}",
            reason
        );
        self.ctx.emit(BridgeEvent::ReportRejected {
            node_id: node_id.to_string(),
            device_endpoint,
            cluster: self.spec.device_name.to_string(),
            attribute: attribute.to_string(),
            reason,
            timestamp: now(),
        });
        ReportOutcome::Rejected
    }
}

/// Extract `value` from a `{"value": ...}` report body.
fn report_value(payload: &[u8]) -> std::result::Result<Value, String> {
    let body: Value = serde_json::from_slice(payload).map_err(|e| e.to_string())?;
    match body {
        Value::Object(mut object) => object
            .remove("value")
            .ok_or_else(|| "missing \"value\" field".to_string()),
        other => Err(format!("expected an object, got {}", other)),
    }
}

impl ClusterBinding for ClusterTranslator {
    fn cluster_id(&self) -> ClusterId {
        self.spec.id
    }

    fn attach(&self, binding: &EndpointBinding) -> Result<()> {
        if binding.cluster.name != self.spec.device_name {
            return Err(BridgeError::Unsupported(format!(
                "cluster {} bound to the {} translator",
                binding.cluster.name, self.spec.name
            )));
        }

        let wanted = self.report_filters(binding);
        let mut state = self.state.lock();
        let held = state
            .bound
            .get(&binding.fabric_endpoint)
            .map(|bound| bound.filters.clone())
            .unwrap_or_default();

        // Filters only grow while an endpoint stays bound.
        let mut added: Vec<String> = Vec::new();
        for filter in wanted.difference(&held) {
            if state.subscriptions.acquire(filter) {
                if let Err(e) = self.ctx.transport.subscribe(filter) {
                    state.subscriptions.release(filter);
                    for done in &added {
                        if state.subscriptions.release(done) {
                            let _ = self.ctx.transport.unsubscribe(done);
                        }
                    }
                    return Err(e);
                }
            }
            added.push(filter.clone());
        }

        let mut filters = held;
        filters.extend(added);
        debug!(
            endpoint = %binding.fabric_endpoint,
            cluster = self.spec.name,
            filters = filters.len(),
            "Attribute translator attached"
        );
        state.bound.insert(
            binding.fabric_endpoint,
            Bound {
                node_id: binding.node_id.clone(),
                device_endpoint: binding.device_endpoint,
                source_endpoint: binding.source_endpoint,
                filters,
            },
        );
        Ok(())
    }

    fn detach(&self, endpoint: EndpointId) {
        let (bound, cleared) = {
            let mut state = self.state.lock();
            let bound = match state.bound.remove(&endpoint) {
                Some(bound) => bound,
                None => return,
            };
            for filter in &bound.filters {
                if state.subscriptions.release(filter) {
                    if let Err(e) = self.ctx.transport.unsubscribe(filter) {
                        warn!("Failed to unsubscribe {}: {}", filter, e);
                    }
                }
            }
            let cleared: Vec<AttributeId> = state
                .cache
                .keys()
                .filter(|(ep, _)| *ep == endpoint)
                .map(|(_, attr)| *attr)
                .collect();
            for attr in &cleared {
                state.cache.remove(&(endpoint, *attr));
            }
            (bound, cleared)
        };

        // The endpoint may stay exposed without this cluster.
        for attr in cleared {
            self.ctx
                .fabric
                .clear_attribute(&AttributePath::new(endpoint, self.spec.id, attr));
        }
        debug!(
            endpoint = %endpoint,
            node_id = %bound.node_id,
            device_endpoint = bound.device_endpoint,
            cluster = self.spec.name,
            "Attribute translator detached"
        );
    }
}

impl AttributeTranslator for ClusterTranslator {
    fn read(&self, path: &AttributePath) -> std::result::Result<FabricValue, Status> {
        let attr = match self.check_path(path)? {
            Some(attr) => attr,
            None if path.attribute == CLUSTER_REVISION => {
                return Ok(FabricValue::Uint(u64::from(self.spec.revision)))
            }
            None => return Ok(FabricValue::Uint(u64::from(self.spec.feature_map))),
        };
        self.state
            .lock()
            .cache
            .get(&(path.endpoint, attr.id))
            .cloned()
            .ok_or(Status::NotFound)
    }

    fn write(&self, path: &AttributePath, value: &FabricValue) -> Status {
        let attr = match self.check_path(path) {
            Ok(Some(attr)) => attr,
            Ok(None) => return Status::UnsupportedWrite,
            Err(status) => return status,
        };
        let device_name = match attr.device_name {
            Some(name) if attr.writable => name,
            _ => return Status::UnsupportedWrite,
        };
        let encoded = match to_device(value, &attr.data_type, attr.nullable) {
            Ok(encoded) => encoded,
            Err(e) => {
                debug!(path = %path, "Rejected write: {}", e);
                return e.write_status();
            }
        };

        let (node_id, source_endpoint) = match self.state.lock().bound.get(&path.endpoint) {
            Some(bound) => (bound.node_id.clone(), bound.source_endpoint),
            None => return Status::UnsupportedAttribute,
        };
        let topic = self
            .ctx
            .topics
            .write_attributes(&node_id, source_endpoint, self.spec.device_name);
        let mut body = Map::new();
        body.insert(device_name.to_string(), encoded);

        match self.ctx.publish_json(&topic, &Value::Object(body)) {
            Ok(()) => Status::Success,
            Err(_) => Status::Failure,
        }
    }

    fn on_device_report(
        &self,
        node_id: &str,
        device_endpoint: u8,
        attribute: &str,
        payload: &[u8],
    ) -> ReportOutcome {
        let attr = match self.spec.attribute_by_device_name(attribute) {
            Some(attr) => attr,
            None => {
                self.ctx.stats.report_unmapped();
                trace!(cluster = self.spec.device_name, attribute = %attribute, "No mapping for attribute");
                return ReportOutcome::Ignored;
            }
        };

        if payload.is_empty() {
            let cleared: Vec<EndpointId> = {
                let mut state = self.state.lock();
                let targets = self.targets(&state, node_id, device_endpoint);
                targets
                    .into_iter()
                    .filter(|ep| state.cache.remove(&(*ep, attr.id)).is_some())
                    .collect()
            };
            for endpoint in &cleared {
                let path = AttributePath::new(*endpoint, self.spec.id, attr.id);
                self.ctx.fabric.clear_attribute(&path);
            }
            return ReportOutcome::Cleared;
        }

        let value = match report_value(payload)
            .and_then(|raw| from_device(&raw, &attr.data_type, attr.nullable).map_err(|e| e.to_string()))
        {
            Ok(value) => value,
            Err(reason) => return self.reject(node_id, device_endpoint, attribute, reason),
        };

        let changed: Vec<(EndpointId, FabricValue)> = {
            let mut state = self.state.lock();
            let targets = self.targets(&state, node_id, device_endpoint);
            if targets.is_empty() {
                drop(state);
                self.ctx.stats.report_unmapped();
                debug!(
                    node_id = %node_id,
                    endpoint = device_endpoint,
                    cluster = self.spec.device_name,
                    "Report for unexposed endpoint dropped"
                );
                return ReportOutcome::Ignored;
            }
            let mut changed = Vec::new();
            for ep in targets {
                if state.cache.get(&(ep, attr.id)) != Some(&value) {
                    state.cache.insert((ep, attr.id), value.clone());
                    changed.push((ep, value.clone()));
                }
            }
            changed
        };

        self.ctx.stats.report_applied();
        if changed.is_empty() {
            return ReportOutcome::Unchanged;
        }
        self.publish_changes(attr.id, &changed);
        ReportOutcome::Applied
    }

    fn seed(&self, endpoint: EndpointId, attribute: AttributeId, value: FabricValue) {
        let changed = {
            let mut state = self.state.lock();
            if !state.bound.contains_key(&endpoint) {
                return;
            }
            let key = (endpoint, attribute);
            if state.cache.get(&key) == Some(&value) {
                false
            } else {
                state.cache.insert(key, value.clone());
                true
            }
        };
        if changed {
            self.publish_changes(attribute, &[(endpoint, value)]);
        }
    }
}
