//! Fabric endpoint id arena.

use crate::error::{BridgeError, Result};
use crate::fabric::EndpointId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use unibridge_core::config::EndpointSettings;

/// One live fabric endpoint ↔ device endpoint relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FabricEndpointMapping {
    pub fabric_endpoint: EndpointId,
    pub node_id: String,
    pub device_endpoint: u8,
}

#[derive(Debug)]
struct MapState {
    by_device: HashMap<(String, u8), EndpointId>,
    by_fabric: HashMap<EndpointId, (String, u8)>,
    free: BTreeSet<u16>,
}

/// Bidirectional mapping table with a pool of dynamic endpoint ids.
///
/// Ids are handed out lowest-free-first from `first..first + capacity`.
/// Both lookup directions are hash lookups under one mutex.
#[derive(Debug)]
pub struct EndpointMap {
    first: u16,
    capacity: u16,
    state: Mutex<MapState>,
}

impl EndpointMap {
    pub fn new(first: u16, capacity: u16) -> Self {
        let end = (u32::from(first) + u32::from(capacity)).min(u32::from(u16::MAX) + 1);
        let free = (u32::from(first)..end).map(|id| id as u16).collect();
        Self {
            first,
            capacity,
            state: Mutex::new(MapState {
                by_device: HashMap::new(),
                by_fabric: HashMap::new(),
                free,
            }),
        }
    }

    pub fn from_settings(settings: &EndpointSettings) -> Self {
        Self::new(settings.first_dynamic_endpoint, settings.capacity)
    }

    pub fn first(&self) -> EndpointId {
        EndpointId(self.first)
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Map a device endpoint, reusing its id when already mapped.
    pub fn allocate(&self, node_id: &str, device_endpoint: u8) -> Result<EndpointId> {
        let mut state = self.state.lock();
        let key = (node_id.to_string(), device_endpoint);
        if let Some(id) = state.by_device.get(&key) {
            return Ok(*id);
        }

        let raw = state.free.pop_first().ok_or_else(|| {
            BridgeError::AllocationExhausted(format!(
                "no free dynamic endpoint for {}/ep{} ({} in use)",
                node_id, device_endpoint, self.capacity
            ))
        })?;
        let id = EndpointId(raw);
        state.by_device.insert(key.clone(), id);
        state.by_fabric.insert(id, key);
        Ok(id)
    }

    /// Drop a mapping and return its id to the pool.
    pub fn release(&self, id: EndpointId) -> Option<FabricEndpointMapping> {
        let mut state = self.state.lock();
        let (node_id, device_endpoint) = state.by_fabric.remove(&id)?;
        state.by_device.remove(&(node_id.clone(), device_endpoint));
        state.free.insert(id.0);
        Some(FabricEndpointMapping {
            fabric_endpoint: id,
            node_id,
            device_endpoint,
        })
    }

    pub fn lookup(&self, node_id: &str, device_endpoint: u8) -> Option<EndpointId> {
        self.state
            .lock()
            .by_device
            .get(&(node_id.to_string(), device_endpoint))
            .copied()
    }

    pub fn device_of(&self, id: EndpointId) -> Option<FabricEndpointMapping> {
        self.state
            .lock()
            .by_fabric
            .get(&id)
            .map(|(node_id, device_endpoint)| FabricEndpointMapping {
                fabric_endpoint: id,
                node_id: node_id.clone(),
                device_endpoint: *device_endpoint,
            })
    }

    pub fn contains(&self, id: EndpointId) -> bool {
        self.state.lock().by_fabric.contains_key(&id)
    }

    /// Every mapping owned by a node, ordered by device endpoint.
    pub fn endpoints_of_node(&self, node_id: &str) -> Vec<FabricEndpointMapping> {
        let state = self.state.lock();
        let mut mappings: Vec<_> = state
            .by_device
            .iter()
            .filter(|((node, _), _)| node == node_id)
            .map(|((node, ep), id)| FabricEndpointMapping {
                fabric_endpoint: *id,
                node_id: node.clone(),
                device_endpoint: *ep,
            })
            .collect();
        mappings.sort_by_key(|m| m.device_endpoint);
        mappings
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_fabric.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn available(&self) -> usize {
        self.state.lock().free.len()
    }
}
