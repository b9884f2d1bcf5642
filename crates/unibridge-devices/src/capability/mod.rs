//! Device-cluster to fabric-cluster capability mapping.
//!
//! Pure lookups over the static tables in [`tables`]. Anything without a
//! mapping is filtered here, so the rest of the engine only ever sees the
//! supported subset.

pub mod tables;
pub mod value;

pub use tables::{
    AttributeSpec, ClusterSpec, CommandSpec, FieldSpec, ResponseSpec, CLUSTER_REVISION,
    FEATURE_MAP,
};
pub use value::{DataType, ValueError};

use crate::error::{BridgeError, Result};
use crate::fabric::{AttributeId, ClusterId, EndpointDescriptor};
use crate::model::DeviceEndpoint;
use tables::ids;

/// Device type identifiers.
pub mod device_types {
    pub const DOOR_LOCK: u32 = 0x000A;
    pub const BRIDGED_NODE: u32 = 0x0013;
    pub const ON_OFF_LIGHT: u32 = 0x0100;
    pub const DIMMABLE_LIGHT: u32 = 0x0101;
    pub const EXTENDED_COLOR_LIGHT: u32 = 0x010D;
    pub const LIGHT_SENSOR: u32 = 0x0106;
    pub const OCCUPANCY_SENSOR: u32 = 0x0107;
    pub const THERMOSTAT: u32 = 0x0301;
    pub const TEMPERATURE_SENSOR: u32 = 0x0302;
    pub const PRESSURE_SENSOR: u32 = 0x0305;
    pub const FLOW_SENSOR: u32 = 0x0306;
    pub const HUMIDITY_SENSOR: u32 = 0x0307;
}

/// Exclusive device types, highest priority first. At most one applies;
/// light and sensor types are still added next to it.
const EXCLUSIVE_TYPES: &[(ClusterId, u32)] = &[
    (ids::DOOR_LOCK, device_types::DOOR_LOCK),
    (ids::THERMOSTAT, device_types::THERMOSTAT),
];

/// Light types, most capable first. At most one applies.
const LIGHT_TYPES: &[(ClusterId, u32)] = &[
    (ids::COLOR_CONTROL, device_types::EXTENDED_COLOR_LIGHT),
    (ids::LEVEL_CONTROL, device_types::DIMMABLE_LIGHT),
    (ids::ON_OFF, device_types::ON_OFF_LIGHT),
];

/// Sensor types. Every match applies.
const SENSOR_TYPES: &[(ClusterId, u32)] = &[
    (ids::OCCUPANCY_SENSING, device_types::OCCUPANCY_SENSOR),
    (ids::TEMPERATURE_MEASUREMENT, device_types::TEMPERATURE_SENSOR),
    (ids::RELATIVE_HUMIDITY_MEASUREMENT, device_types::HUMIDITY_SENSOR),
    (ids::ILLUMINANCE_MEASUREMENT, device_types::LIGHT_SENSOR),
    (ids::PRESSURE_MEASUREMENT, device_types::PRESSURE_SENSOR),
    (ids::FLOW_MEASUREMENT, device_types::FLOW_SENSOR),
];

/// Clusters present on every exposed endpoint.
const MANDATORY_CLUSTERS: &[ClusterId] = &[ids::DESCRIPTOR, ids::BRIDGED_DEVICE_BASIC_INFORMATION];

/// Stateless mapping between device-network names and fabric identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityTranslator;

impl CapabilityTranslator {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve_cluster(&self, device_cluster: &str) -> Result<ClusterId> {
        tables::cluster_by_device_name(device_cluster)
            .map(|spec| spec.id)
            .ok_or_else(|| BridgeError::Unsupported(format!("cluster {}", device_cluster)))
    }

    pub fn resolve_attribute(&self, cluster: ClusterId, device_attribute: &str) -> Result<AttributeId> {
        tables::cluster_by_id(cluster)
            .and_then(|spec| spec.attribute_by_device_name(device_attribute))
            .map(|attr| attr.id)
            .ok_or_else(|| {
                BridgeError::Unsupported(format!("attribute {} of cluster {}", device_attribute, cluster))
            })
    }

    pub fn cluster_spec(&self, cluster: ClusterId) -> Option<&'static ClusterSpec> {
        tables::cluster_by_id(cluster)
    }

    pub fn cluster_spec_by_device_name(&self, device_cluster: &str) -> Option<&'static ClusterSpec> {
        tables::cluster_by_device_name(device_cluster)
    }

    /// Supported clusters of an endpoint, in device cluster name order.
    pub fn supported_clusters(&self, endpoint: &DeviceEndpoint) -> Vec<&'static ClusterSpec> {
        endpoint
            .clusters
            .keys()
            .filter_map(|name| tables::cluster_by_device_name(name))
            .collect()
    }

    /// Describe how `endpoint` appears on the fabric.
    ///
    /// Returns `None` when no application cluster is supported; such an
    /// endpoint is known but never exposed. The result depends only on the
    /// set of cluster names, so repeated discovery yields the same value.
    pub fn build_endpoint_descriptor(&self, endpoint: &DeviceEndpoint) -> Option<EndpointDescriptor> {
        let supported = self.supported_clusters(endpoint);
        if supported.iter().all(|spec| spec.auxiliary) {
            return None;
        }

        let has = |id: ClusterId| supported.iter().any(|spec| spec.id == id);

        let mut device_types = Vec::new();
        if let Some((_, ty)) = EXCLUSIVE_TYPES.iter().find(|(id, _)| has(*id)) {
            device_types.push(*ty);
        }
        if let Some((_, ty)) = LIGHT_TYPES.iter().find(|(id, _)| has(*id)) {
            device_types.push(*ty);
        }
        device_types.extend(
            SENSOR_TYPES
                .iter()
                .filter(|(id, _)| has(*id))
                .map(|(_, ty)| *ty),
        );
        device_types.push(device_types::BRIDGED_NODE);

        let mut clusters: Vec<ClusterId> = supported.iter().map(|spec| spec.id).collect();
        clusters.extend_from_slice(MANDATORY_CLUSTERS);
        clusters.sort_unstable();
        clusters.dedup();

        Some(EndpointDescriptor {
            device_types,
            clusters,
        })
    }
}
