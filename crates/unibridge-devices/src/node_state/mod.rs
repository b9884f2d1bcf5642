//! Node state monitor: discovery accumulation and dynamic endpoint lifecycle.
//!
//! ```text
//! Unknown ──▶ Discovering ──▶ Exposed(id) ──▶ Removed
//!                  ▲              │
//!                  └──────────────┘  (supported clusters withdrawn)
//! ```
//!
//! All discovery and removal runs under the monitor's lock, so add/remove of
//! the same node never interleave. Translators never call back into the
//! monitor, which keeps the lock order monitor → translator → transport.

mod endpoint_map;

pub use endpoint_map::{EndpointMap, FabricEndpointMapping};

use crate::capability::tables::{ids, REACHABLE, UNIQUE_ID};
use crate::capability::CapabilityTranslator;
use crate::error::{BridgeError, Result};
use crate::fabric::{ClusterId, EndpointDescriptor, EndpointId, FabricStack, FabricValue};
use crate::model::{DeviceCluster, DeviceEndpoint, DeviceNode, EndpointState, NetworkStatus};
use crate::stats::BridgeStats;
use crate::translators::{EndpointBinding, TranslatorRegistry};
use parking_lot::Mutex;
use lru::LruCache;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use unibridge_core::event::{now, BridgeEvent};
use unibridge_core::eventbus::SharedEventBus;

const BASIC_CLUSTER: &str = "Basic";
const UNIQUE_ID_MAX_LEN: usize = 32;
/// Removed node ids remembered for [`EndpointState::Removed`].
const REMOVED_NODE_MEMORY: usize = 256;

#[derive(Debug)]
struct Exposed {
    id: EndpointId,
    descriptor: EndpointDescriptor,
    attached: BTreeSet<ClusterId>,
}

#[derive(Debug)]
struct MonitorState {
    nodes: BTreeMap<String, DeviceNode>,
    exposed: HashMap<(String, u8), Exposed>,
    /// Recently removed node ids, oldest evicted first.
    removed: LruCache<String, ()>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            exposed: HashMap::new(),
            removed: LruCache::new(NonZeroUsize::new(REMOVED_NODE_MEMORY).unwrap_or(NonZeroUsize::MIN)),
        }
    }
}

/// Owns the device model and the fabric endpoints created for it.
pub struct NodeStateMonitor {
    capabilities: CapabilityTranslator,
    map: Arc<EndpointMap>,
    registry: Arc<TranslatorRegistry>,
    fabric: Arc<dyn FabricStack>,
    stats: Arc<BridgeStats>,
    events: Option<SharedEventBus>,
    state: Mutex<MonitorState>,
}

impl NodeStateMonitor {
    pub fn new(
        map: Arc<EndpointMap>,
        registry: Arc<TranslatorRegistry>,
        fabric: Arc<dyn FabricStack>,
        stats: Arc<BridgeStats>,
    ) -> Self {
        Self {
            capabilities: CapabilityTranslator::new(),
            map,
            registry,
            fabric,
            stats,
            events: None,
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn with_event_bus(mut self, events: SharedEventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: BridgeEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }

    /// Expose every supported endpoint of `node`.
    ///
    /// Already exposed endpoints keep their fabric id. Endpoints that lost
    /// all supported clusters, or vanished from the snapshot, are removed.
    /// Every endpoint is attempted; the first failure is returned.
    pub fn on_device_node_added(&self, node: &DeviceNode) -> Result<Vec<EndpointId>> {
        let mut state = self.state.lock();
        self.add_locked(&mut state, node.clone())
    }

    /// Remove every fabric endpoint owned by `node_id`. Unknown or never
    /// exposed nodes are fine.
    pub fn on_device_node_removed(&self, node_id: &str) -> Vec<EndpointId> {
        let mut state = self.state.lock();
        let keys: Vec<(String, u8)> = state
            .exposed
            .keys()
            .filter(|(node, _)| node == node_id)
            .cloned()
            .collect();

        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(exposed) = state.exposed.remove(&key) {
                removed.push(exposed.id);
                self.withdraw(&key.0, key.1, exposed);
            }
        }
        removed.sort_unstable();

        let known = state.nodes.remove(node_id).is_some();
        if known || !removed.is_empty() {
            state.removed.put(node_id.to_string(), ());
            info!(node_id = %node_id, endpoints = removed.len(), "Node removed");
        }
        removed
    }

    /// `by-id/<node>/State`. `None` is the empty payload: the node is gone.
    pub fn on_node_state(&self, node_id: &str, status: Option<NetworkStatus>) -> Result<Vec<EndpointId>> {
        let status = match status {
            Some(status) => status,
            None => {
                self.on_device_node_removed(node_id);
                return Ok(Vec::new());
            }
        };

        let mut state = self.state.lock();
        state.removed.pop(node_id);
        let is_new = !state.nodes.contains_key(node_id);
        let node = state
            .nodes
            .entry(node_id.to_string())
            .or_insert_with(|| DeviceNode::new(node_id));
        let was_reachable = node.status.map(|s| s.is_reachable());
        node.status = Some(status);
        let snapshot = node.clone();

        if is_new {
            info!(node_id = %node_id, status = %status, "Node discovered");
            self.emit(BridgeEvent::NodeDiscovered {
                node_id: node_id.to_string(),
                network_status: status.as_str().to_string(),
                timestamp: now(),
            });
        }

        if was_reachable.is_some() && was_reachable != Some(status.is_reachable()) {
            self.update_reachability(&state, node_id, status.is_reachable());
        }

        if status.is_exposable() {
            self.add_locked(&mut state, snapshot)
        } else {
            debug!(node_id = %node_id, status = %status, "Node not exposable yet");
            Ok(self.exposed_ids(&state, node_id))
        }
    }

    /// `.../ep<N>/<Cluster>/SupportedCommands`. `None` withdraws the cluster.
    pub fn on_supported_commands(
        &self,
        node_id: &str,
        device_endpoint: u8,
        cluster: &str,
        commands: Option<Vec<String>>,
    ) -> Result<Vec<EndpointId>> {
        let mut state = self.state.lock();
        if !state.nodes.contains_key(node_id) {
            state.removed.pop(node_id);
            self.emit(BridgeEvent::NodeDiscovered {
                node_id: node_id.to_string(),
                network_status: String::new(),
                timestamp: now(),
            });
        }
        let node = state
            .nodes
            .entry(node_id.to_string())
            .or_insert_with(|| DeviceNode::new(node_id));

        match commands {
            Some(commands) => {
                let endpoint = node.endpoint_mut(device_endpoint);
                let entry = endpoint
                    .clusters
                    .entry(cluster.to_string())
                    .or_insert_with(|| DeviceCluster::new(cluster));
                entry.commands = commands.into_iter().collect();
            }
            None => {
                let now_empty = match node.endpoints.get_mut(&device_endpoint) {
                    Some(endpoint) => {
                        endpoint.clusters.remove(cluster);
                        endpoint.clusters.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    node.endpoints.remove(&device_endpoint);
                }
            }
        }

        let exposable = node.status.map(|s| s.is_exposable()).unwrap_or(false);
        let snapshot = node.clone();
        if exposable {
            self.add_locked(&mut state, snapshot)
        } else {
            Ok(self.exposed_ids(&state, node_id))
        }
    }

    /// Record that `attribute` was reported for a known cluster. Returns
    /// whether the declared attribute set grew.
    pub fn on_attribute_declared(&self, node_id: &str, device_endpoint: u8, cluster: &str, attribute: &str) -> bool {
        let mut state = self.state.lock();
        state
            .nodes
            .get_mut(node_id)
            .and_then(|node| node.endpoints.get_mut(&device_endpoint))
            .and_then(|endpoint| endpoint.clusters.get_mut(cluster))
            .map(|cluster| cluster.attributes.insert(attribute.to_string()))
            .unwrap_or(false)
    }

    pub fn lookup(&self, node_id: &str, device_endpoint: u8) -> Result<EndpointId> {
        self.map.lookup(node_id, device_endpoint).ok_or_else(|| {
            BridgeError::NotFound(format!("no fabric endpoint for {}/ep{}", node_id, device_endpoint))
        })
    }

    pub fn lookup_device(&self, endpoint: EndpointId) -> Result<FabricEndpointMapping> {
        self.map
            .device_of(endpoint)
            .ok_or_else(|| BridgeError::NotFound(format!("fabric endpoint {}", endpoint)))
    }

    pub fn nodes(&self) -> Vec<String> {
        self.state.lock().nodes.keys().cloned().collect()
    }

    pub fn node(&self, node_id: &str) -> Option<DeviceNode> {
        self.state.lock().nodes.get(node_id).cloned()
    }

    pub fn endpoint_state(&self, node_id: &str, device_endpoint: u8) -> EndpointState {
        let state = self.state.lock();
        if let Some(exposed) = state.exposed.get(&(node_id.to_string(), device_endpoint)) {
            return EndpointState::Exposed(exposed.id);
        }
        match state.nodes.get(node_id) {
            Some(node) if node.endpoint(device_endpoint).is_some() => EndpointState::Discovering,
            Some(_) => EndpointState::Unknown,
            None if state.removed.contains(node_id) => EndpointState::Removed,
            None => EndpointState::Unknown,
        }
    }

    pub fn descriptor(&self, endpoint: EndpointId) -> Option<EndpointDescriptor> {
        self.state
            .lock()
            .exposed
            .values()
            .find(|exposed| exposed.id == endpoint)
            .map(|exposed| exposed.descriptor.clone())
    }

    fn exposed_ids(&self, state: &MonitorState, node_id: &str) -> Vec<EndpointId> {
        let mut ids: Vec<EndpointId> = state
            .exposed
            .iter()
            .filter(|((node, _), _)| node == node_id)
            .map(|(_, exposed)| exposed.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn add_locked(&self, state: &mut MonitorState, node: DeviceNode) -> Result<Vec<EndpointId>> {
        state.removed.pop(&node.id);
        if !state.nodes.contains_key(&node.id) {
            self.emit(BridgeEvent::NodeDiscovered {
                node_id: node.id.clone(),
                network_status: node.status.map(|s| s.as_str()).unwrap_or_default().to_string(),
                timestamp: now(),
            });
        }

        // Endpoints that disappeared from the snapshot.
        let stale: Vec<(String, u8)> = state
            .exposed
            .keys()
            .filter(|(id, ep)| *id == node.id && !node.endpoints.contains_key(ep))
            .cloned()
            .collect();
        for key in stale {
            if let Some(exposed) = state.exposed.remove(&key) {
                self.withdraw(&key.0, key.1, exposed);
            }
        }

        let mut ids = Vec::new();
        let mut first_error = None;
        for endpoint in node.endpoints.values() {
            match self.sync_endpoint(state, &node, endpoint) {
                Ok(Some(id)) => ids.push(id),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        node_id = %node.id,
                        endpoint = endpoint.index,
                        "Failed to expose endpoint: {}",
                        e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        state.nodes.insert(node.id.clone(), node);
        match first_error {
            Some(e) => Err(e),
            None => Ok(ids),
        }
    }

    fn sync_endpoint(&self, state: &mut MonitorState, node: &DeviceNode, endpoint: &DeviceEndpoint) -> Result<Option<EndpointId>> {
        let key = (node.id.clone(), endpoint.index);
        let descriptor = match self.capabilities.build_endpoint_descriptor(endpoint) {
            Some(descriptor) => descriptor,
            None => {
                if let Some(exposed) = state.exposed.remove(&key) {
                    self.withdraw(&node.id, endpoint.index, exposed);
                }
                debug!(node_id = %node.id, endpoint = endpoint.index, "No supported clusters");
                return Ok(None);
            }
        };

        if let Some(exposed) = state.exposed.get_mut(&key) {
            if exposed.descriptor != descriptor {
                self.fabric.register_dynamic_endpoint(exposed.id, &descriptor)?;
                info!(
                    node_id = %node.id,
                    endpoint = endpoint.index,
                    fabric_endpoint = %exposed.id,
                    "Endpoint descriptor updated"
                );
                exposed.descriptor = descriptor;
            }
            self.sync_bindings(node, endpoint, exposed);
            return Ok(Some(exposed.id));
        }

        let id = self.map.allocate(&node.id, endpoint.index)?;
        if let Err(e) = self.fabric.register_dynamic_endpoint(id, &descriptor) {
            self.map.release(id);
            return Err(e);
        }

        let mut exposed = Exposed {
            id,
            descriptor,
            attached: BTreeSet::new(),
        };
        self.sync_bindings(node, endpoint, &mut exposed);

        info!(
            node_id = %node.id,
            endpoint = endpoint.index,
            fabric_endpoint = %id,
            clusters = exposed.descriptor.clusters.len(),
            "Endpoint exposed"
        );
        self.stats.endpoint_exposed();
        self.emit(BridgeEvent::EndpointExposed {
            node_id: node.id.clone(),
            device_endpoint: endpoint.index,
            fabric_endpoint: id.0,
            device_types: exposed.descriptor.device_types.clone(),
            clusters: exposed.descriptor.clusters.iter().map(|c| c.0).collect(),
            timestamp: now(),
        });
        state.exposed.insert(key, exposed);
        Ok(Some(id))
    }

    /// Attach translators for the supported clusters of `endpoint`, detach
    /// the withdrawn ones and seed the bridge-maintained attributes.
    fn sync_bindings(&self, node: &DeviceNode, endpoint: &DeviceEndpoint, exposed: &mut Exposed) {
        let mut wanted: BTreeMap<ClusterId, EndpointBinding> = BTreeMap::new();
        for spec in self.capabilities.supported_clusters(endpoint) {
            if spec.id == ids::BRIDGED_DEVICE_BASIC_INFORMATION {
                continue;
            }
            if let Some(cluster) = endpoint.cluster(spec.device_name) {
                wanted.insert(
                    spec.id,
                    EndpointBinding::new(exposed.id, node.id.clone(), endpoint.index, cluster.clone()),
                );
            }
        }
        wanted.insert(
            ids::BRIDGED_DEVICE_BASIC_INFORMATION,
            basic_binding(node, endpoint, exposed.id),
        );

        let withdrawn: Vec<ClusterId> = exposed
            .attached
            .iter()
            .filter(|cluster| !wanted.contains_key(cluster))
            .copied()
            .collect();
        for cluster in withdrawn {
            self.registry.detach(cluster, exposed.id);
            exposed.attached.remove(&cluster);
        }

        for (cluster, binding) in &wanted {
            match self.registry.attach(*cluster, binding) {
                Ok(()) => {
                    exposed.attached.insert(*cluster);
                }
                Err(e) => warn!(
                    node_id = %node.id,
                    fabric_endpoint = %exposed.id,
                    cluster = %cluster,
                    "Failed to attach translator: {}",
                    e
                ),
            }
        }

        if let Some(basic) = self.registry.attribute(ids::BRIDGED_DEVICE_BASIC_INFORMATION) {
            let reachable = node.status.map(|s| s.is_reachable()).unwrap_or(true);
            basic.seed(exposed.id, REACHABLE, FabricValue::Bool(reachable));
            let unique: String = node.id.chars().take(UNIQUE_ID_MAX_LEN).collect();
            basic.seed(exposed.id, UNIQUE_ID, FabricValue::Str(unique));
        }
    }

    /// Tear down an endpoint already removed from the exposed table.
    fn withdraw(&self, node_id: &str, device_endpoint: u8, exposed: Exposed) {
        for cluster in &exposed.attached {
            self.registry.detach(*cluster, exposed.id);
        }
        self.fabric.unregister_dynamic_endpoint(exposed.id);
        self.map.release(exposed.id);

        info!(
            node_id = %node_id,
            endpoint = device_endpoint,
            fabric_endpoint = %exposed.id,
            "Endpoint removed"
        );
        self.stats.endpoint_removed();
        self.emit(BridgeEvent::EndpointRemoved {
            node_id: node_id.to_string(),
            device_endpoint,
            fabric_endpoint: exposed.id.0,
            timestamp: now(),
        });
    }

    fn update_reachability(&self, state: &MonitorState, node_id: &str, reachable: bool) {
        let ids = self.exposed_ids(state, node_id);
        if let Some(basic) = self.registry.attribute(ids::BRIDGED_DEVICE_BASIC_INFORMATION) {
            for id in &ids {
                basic.seed(*id, REACHABLE, FabricValue::Bool(reachable));
            }
        }
        info!(node_id = %node_id, reachable, "Node reachability changed");
        self.emit(BridgeEvent::NodeReachabilityChanged {
            node_id: node_id.to_string(),
            reachable,
            timestamp: now(),
        });
    }
}

/// Basic information comes from the endpoint itself when it hosts the
/// Basic cluster, otherwise from the lowest endpoint of the node that does.
fn basic_binding(node: &DeviceNode, endpoint: &DeviceEndpoint, id: EndpointId) -> EndpointBinding {
    if let Some(cluster) = endpoint.cluster(BASIC_CLUSTER) {
        return EndpointBinding::new(id, node.id.clone(), endpoint.index, cluster.clone());
    }
    node.endpoints
        .values()
        .find_map(|ep| ep.cluster(BASIC_CLUSTER).map(|cluster| (ep.index, cluster)))
        .map(|(source, cluster)| {
            EndpointBinding::new(id, node.id.clone(), endpoint.index, cluster.clone())
                .with_source_endpoint(source)
        })
        .unwrap_or_else(|| {
            EndpointBinding::new(id, node.id.clone(), endpoint.index, DeviceCluster::new(BASIC_CLUSTER))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::{AttributePath, InMemoryFabric};
    use crate::groups::GroupStore;
    use crate::topic::TopicScheme;
    use crate::translators::TranslatorContext;
    use crate::transport::InMemoryTransport;
    use unibridge_core::config::GroupSettings;
    use unibridge_core::eventbus::EventBus;
    use unibridge_storage::MemoryBackend;

    struct Fixture {
        fabric: Arc<InMemoryFabric>,
        transport: Arc<InMemoryTransport>,
        monitor: NodeStateMonitor,
    }

    fn fixture_with(capacity: u16, events: Option<SharedEventBus>) -> Fixture {
        let map = Arc::new(EndpointMap::new(2, capacity));
        let fabric = Arc::new(InMemoryFabric::new());
        let transport = Arc::new(InMemoryTransport::new());
        let stats = Arc::new(BridgeStats::new());
        let ctx = TranslatorContext {
            map: map.clone(),
            transport: transport.clone(),
            fabric: fabric.clone(),
            topics: TopicScheme::default(),
            stats: stats.clone(),
            events: None,
        };
        let groups = Arc::new(
            GroupStore::open(Arc::new(MemoryBackend::new()), &GroupSettings::default()).unwrap(),
        );
        let registry = Arc::new(TranslatorRegistry::with_defaults(&ctx, groups).unwrap());
        let mut monitor = NodeStateMonitor::new(map, registry, fabric.clone(), stats);
        if let Some(events) = events {
            monitor = monitor.with_event_bus(events);
        }
        Fixture {
            fabric,
            transport,
            monitor,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(16, None)
    }

    fn sensor(id: &str) -> DeviceNode {
        DeviceNode::new(id)
            .with_status(NetworkStatus::OnlineFunctional)
            .with_endpoint(
                DeviceEndpoint::new(1).with_cluster(DeviceCluster::new("TemperatureMeasurement")),
            )
    }

    #[test]
    fn test_add_lookup_remove() {
        let f = fixture();
        let ids = f.monitor.on_device_node_added(&sensor("temp-1")).unwrap();
        assert_eq!(ids, vec![EndpointId(2)]);
        assert_eq!(f.monitor.lookup("temp-1", 1).unwrap(), EndpointId(2));
        assert_eq!(f.monitor.lookup_device(EndpointId(2)).unwrap().node_id, "temp-1");
        assert_eq!(f.monitor.endpoint_state("temp-1", 1), EndpointState::Exposed(EndpointId(2)));
        assert_eq!(f.fabric.endpoints(), vec![EndpointId(2)]);

        let removed = f.monitor.on_device_node_removed("temp-1");
        assert_eq!(removed, vec![EndpointId(2)]);
        assert!(matches!(f.monitor.lookup("temp-1", 1), Err(BridgeError::NotFound(_))));
        assert!(f.monitor.lookup_device(EndpointId(2)).is_err());
        assert_eq!(f.monitor.endpoint_state("temp-1", 1), EndpointState::Removed);
        assert!(f.fabric.endpoints().is_empty());
        assert!(f.transport.subscriptions().is_empty());
    }

    #[test]
    fn test_re_add_is_idempotent() {
        let f = fixture();
        let node = sensor("temp-1");
        let first = f.monitor.on_device_node_added(&node).unwrap();
        let second = f.monitor.on_device_node_added(&node).unwrap();
        assert_eq!(first, second);
        assert_eq!(f.fabric.registration_count(), 1);
        assert_eq!(f.monitor.nodes(), vec!["temp-1".to_string()]);
    }

    #[test]
    fn test_unsupported_endpoint_recorded_not_exposed() {
        let f = fixture();
        let node = DeviceNode::new("zw-9").with_endpoint(
            DeviceEndpoint::new(0).with_cluster(DeviceCluster::new("ConfigurationParameters")),
        );
        assert!(f.monitor.on_device_node_added(&node).unwrap().is_empty());
        assert_eq!(f.monitor.endpoint_state("zw-9", 0), EndpointState::Discovering);
        assert_eq!(f.monitor.endpoint_state("zw-9", 5), EndpointState::Unknown);
        assert!(f.fabric.endpoints().is_empty());
        assert!(f.monitor.on_device_node_removed("zw-9").is_empty());
        assert!(f.monitor.on_device_node_removed("never-seen").is_empty());
    }

    #[test]
    fn test_removed_nodes_memory_is_bounded() {
        let f = fixture();
        for n in 0..=REMOVED_NODE_MEMORY {
            let node = format!("node-{}", n);
            f.monitor.on_node_state(&node, Some(NetworkStatus::OnlineFunctional)).unwrap();
            f.monitor.on_device_node_removed(&node);
        }
        assert_eq!(f.monitor.endpoint_state("node-0", 1), EndpointState::Unknown);
        assert_eq!(f.monitor.endpoint_state("node-1", 1), EndpointState::Removed);
        let newest = format!("node-{}", REMOVED_NODE_MEMORY);
        assert_eq!(f.monitor.endpoint_state(&newest, 1), EndpointState::Removed);

        // Coming back clears the marker.
        f.monitor.on_node_state(&newest, Some(NetworkStatus::OnlineFunctional)).unwrap();
        assert_eq!(f.monitor.endpoint_state(&newest, 1), EndpointState::Unknown);
    }

    #[test]
    fn test_descriptor_change_keeps_id() {
        let f = fixture();
        f.monitor.on_node_state("zw-1", Some(NetworkStatus::OnlineFunctional)).unwrap();
        let ids = f
            .monitor
            .on_supported_commands("zw-1", 1, "OnOff", Some(vec!["On".into(), "Off".into()]))
            .unwrap();
        assert_eq!(ids, vec![EndpointId(2)]);
        assert_eq!(f.fabric.descriptor(EndpointId(2)).unwrap().device_types[0], 0x0100);

        let ids = f
            .monitor
            .on_supported_commands("zw-1", 1, "Level", Some(vec!["MoveToLevel".into()]))
            .unwrap();
        assert_eq!(ids, vec![EndpointId(2)]);
        assert_eq!(f.fabric.registration_count(), 2);
        assert_eq!(f.fabric.descriptor(EndpointId(2)).unwrap().device_types[0], 0x0101);
        assert!(f.transport.is_subscribed("by-id/zw-1/ep1/Level/Attributes/CurrentLevel/Reported"));

        f.monitor.on_supported_commands("zw-1", 1, "Level", None).unwrap();
        assert!(!f.transport.is_subscribed("by-id/zw-1/ep1/Level/Attributes/CurrentLevel/Reported"));
        assert_eq!(f.monitor.lookup("zw-1", 1).unwrap(), EndpointId(2));

        f.monitor.on_supported_commands("zw-1", 1, "OnOff", None).unwrap();
        assert!(f.monitor.lookup("zw-1", 1).is_err());
        assert!(f.fabric.endpoints().is_empty());
    }

    #[test]
    fn test_not_exposed_until_functional() {
        let f = fixture();
        f.monitor.on_node_state("zw-2", Some(NetworkStatus::OnlineInterviewing)).unwrap();
        let ids = f
            .monitor
            .on_supported_commands("zw-2", 1, "OnOff", Some(vec!["On".into()]))
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(f.monitor.endpoint_state("zw-2", 1), EndpointState::Discovering);

        let ids = f.monitor.on_node_state("zw-2", Some(NetworkStatus::OnlineFunctional)).unwrap();
        assert_eq!(ids, vec![EndpointId(2)]);
    }

    #[test]
    fn test_registration_failure_rolls_back() {
        let f = fixture();
        f.fabric.fail_registrations(true);
        assert!(matches!(
            f.monitor.on_device_node_added(&sensor("temp-1")),
            Err(BridgeError::Fabric(_))
        ));
        assert!(f.monitor.lookup("temp-1", 1).is_err());

        f.fabric.fail_registrations(false);
        assert_eq!(
            f.monitor.on_device_node_added(&sensor("temp-1")).unwrap(),
            vec![EndpointId(2)]
        );
    }

    #[test]
    fn test_allocation_exhaustion_surfaces() {
        let f = fixture_with(1, None);
        f.monitor.on_device_node_added(&sensor("a")).unwrap();
        assert!(matches!(
            f.monitor.on_device_node_added(&sensor("b")),
            Err(BridgeError::AllocationExhausted(_))
        ));
        f.monitor.on_device_node_removed("a");
        assert_eq!(f.monitor.on_device_node_added(&sensor("b")).unwrap(), vec![EndpointId(2)]);
    }

    #[test]
    fn test_reachability_and_unique_id() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe();
        let f = fixture_with(16, Some(bus));

        f.monitor.on_node_state("temp-1", Some(NetworkStatus::OnlineFunctional)).unwrap();
        f.monitor
            .on_supported_commands("temp-1", 1, "TemperatureMeasurement", Some(vec![]))
            .unwrap();
        let ep = f.monitor.lookup("temp-1", 1).unwrap();
        let basic = ids::BRIDGED_DEVICE_BASIC_INFORMATION;
        let reachable = AttributePath::new(ep, basic, REACHABLE);
        assert_eq!(f.fabric.attribute(&reachable), Some(FabricValue::Bool(true)));
        assert_eq!(
            f.fabric.attribute(&AttributePath::new(ep, basic, UNIQUE_ID)),
            Some(FabricValue::Str("temp-1".into()))
        );

        f.monitor.on_node_state("temp-1", Some(NetworkStatus::Unavailable)).unwrap();
        assert_eq!(f.fabric.attribute(&reachable), Some(FabricValue::Bool(false)));
        assert_eq!(f.monitor.lookup("temp-1", 1).unwrap(), ep);

        let mut saw_unreachable = false;
        while let Some((event, _)) = rx.try_recv() {
            if let BridgeEvent::NodeReachabilityChanged { reachable, .. } = event {
                saw_unreachable = !reachable;
            }
        }
        assert!(saw_unreachable);

        f.monitor.on_node_state("temp-1", None).unwrap();
        assert!(f.monitor.lookup("temp-1", 1).is_err());
        assert!(f.monitor.node("temp-1").is_none());
    }

    #[test]
    fn test_attribute_declared_only_for_known_clusters() {
        let f = fixture();
        f.monitor.on_device_node_added(&sensor("temp-1")).unwrap();
        assert!(f.monitor.on_attribute_declared("temp-1", 1, "TemperatureMeasurement", "MeasuredValue"));
        assert!(!f.monitor.on_attribute_declared("temp-1", 1, "TemperatureMeasurement", "MeasuredValue"));
        assert!(!f.monitor.on_attribute_declared("temp-1", 1, "OnOff", "OnOff"));
        assert!(!f.monitor.on_attribute_declared("nobody", 1, "OnOff", "OnOff"));
    }
}
