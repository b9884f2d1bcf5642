//! Persistent group mapping store.
//!
//! Two tables in the key-value backend:
//!
//! | table            | key                 | value                      |
//! |------------------|---------------------|----------------------------|
//! | `group_mappings` | `<fabric>/<group>`  | JSON [`GroupMapping`]      |
//! | `group_allocator`| `<fabric>`          | JSON next fabric group id  |
//!
//! Every change is persisted before the in-memory cache is updated, and the
//! cache is rebuilt from the tables on open.

use crate::error::{BridgeError, Result};
use crate::fabric::{FabricIndex, GroupId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use unibridge_core::config::GroupSettings;
use unibridge_core::storage::StorageBackend;

pub const MAPPINGS_TABLE: &str = "group_mappings";
pub const ALLOCATOR_TABLE: &str = "group_allocator";

/// A fabric-scoped group and the device-network group behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMapping {
    pub fabric_index: FabricIndex,
    pub fabric_group: GroupId,
    pub device_group: GroupId,
    #[serde(default)]
    pub name: String,
}

fn mapping_key(fabric_index: FabricIndex, fabric_group: GroupId) -> String {
    format!("{:03}/{:05}", fabric_index.0, fabric_group.0)
}

fn allocator_key(fabric_index: FabricIndex) -> String {
    format!("{:03}", fabric_index.0)
}

#[derive(Debug, Default)]
struct GroupState {
    /// (fabric, fabric group) → mapping
    mappings: BTreeMap<(FabricIndex, GroupId), GroupMapping>,
    /// (fabric, device group) → fabric group
    by_device: HashMap<(FabricIndex, GroupId), GroupId>,
    /// Next fabric group id per fabric. Never decreases.
    next: HashMap<FabricIndex, u32>,
}

/// Allocates fabric group ids and persists the mapping table.
pub struct GroupStore {
    backend: Arc<dyn StorageBackend>,
    min_group: u16,
    max_group: u16,
    state: Mutex<GroupState>,
}

impl GroupStore {
    /// Open the store and rebuild the cache from the backend.
    pub fn open(backend: Arc<dyn StorageBackend>, settings: &GroupSettings) -> Result<Self> {
        let mut state = GroupState::default();

        for (key, bytes) in backend.scan(MAPPINGS_TABLE, "")? {
            let mapping: GroupMapping = match serde_json::from_slice(&bytes) {
                Ok(mapping) => mapping,
                Err(e) => {
                    warn!(key = %key, "Skipping unreadable group mapping: {}", e);
                    continue;
                }
            };
            let key = (mapping.fabric_index, mapping.fabric_group);
            state
                .by_device
                .insert((mapping.fabric_index, mapping.device_group), mapping.fabric_group);
            let next = state.next.entry(mapping.fabric_index).or_insert(0);
            *next = (*next).max(u32::from(mapping.fabric_group.0) + 1);
            state.mappings.insert(key, mapping);
        }

        for (key, bytes) in backend.scan(ALLOCATOR_TABLE, "")? {
            let fabric_index = match key.parse::<u8>() {
                Ok(index) => FabricIndex(index),
                Err(_) => {
                    warn!(key = %key, "Skipping malformed allocator key");
                    continue;
                }
            };
            let stored: u32 = serde_json::from_slice(&bytes)?;
            let next = state.next.entry(fabric_index).or_insert(0);
            *next = (*next).max(stored);
        }

        info!(
            mappings = state.mappings.len(),
            fabrics = state.next.len(),
            "Group store opened"
        );

        Ok(Self {
            backend,
            min_group: settings.min_group_id,
            max_group: settings.max_group_id,
            state: Mutex::new(state),
        })
    }

    fn next_id(&self, state: &GroupState, fabric_index: FabricIndex) -> u32 {
        state
            .next
            .get(&fabric_index)
            .copied()
            .unwrap_or(0)
            .max(u32::from(self.min_group))
    }

    pub fn get_device_group(&self, fabric_index: FabricIndex, fabric_group: GroupId) -> Result<GroupId> {
        self.state
            .lock()
            .mappings
            .get(&(fabric_index, fabric_group))
            .map(|m| m.device_group)
            .ok_or_else(|| {
                BridgeError::NotFound(format!("fabric {} group {}", fabric_index, fabric_group))
            })
    }

    pub fn get_fabric_group(&self, fabric_index: FabricIndex, device_group: GroupId) -> Option<GroupId> {
        self.state
            .lock()
            .by_device
            .get(&(fabric_index, device_group))
            .copied()
    }

    pub fn mapping(&self, fabric_index: FabricIndex, fabric_group: GroupId) -> Option<GroupMapping> {
        self.state
            .lock()
            .mappings
            .get(&(fabric_index, fabric_group))
            .cloned()
    }

    /// Whether `add_mapping` would succeed, without side effects.
    pub fn check_can_add(&self, fabric_index: FabricIndex, device_group: GroupId) -> Result<()> {
        let state = self.state.lock();
        self.check_locked(&state, fabric_index, device_group)
    }

    fn check_locked(&self, state: &GroupState, fabric_index: FabricIndex, device_group: GroupId) -> Result<()> {
        if let Some(existing) = state.by_device.get(&(fabric_index, device_group)) {
            return Err(BridgeError::DuplicateExists(format!(
                "device group {} already mapped to fabric group {}",
                device_group, existing
            )));
        }
        if self.next_id(state, fabric_index) > u32::from(self.max_group) {
            return Err(BridgeError::AllocationExhausted(format!(
                "no fabric group ids left on fabric {}",
                fabric_index
            )));
        }
        Ok(())
    }

    /// Map `device_group` to a fresh fabric group id.
    pub fn add_mapping(&self, fabric_index: FabricIndex, device_group: GroupId, name: &str) -> Result<GroupId> {
        let mut state = self.state.lock();
        self.check_locked(&state, fabric_index, device_group)?;

        let id = self.next_id(&state, fabric_index);
        let fabric_group = GroupId(id as u16);
        let mapping = GroupMapping {
            fabric_index,
            fabric_group,
            device_group,
            name: name.to_string(),
        };

        self.backend.write(
            ALLOCATOR_TABLE,
            &allocator_key(fabric_index),
            &serde_json::to_vec(&(id + 1))?,
        )?;
        self.backend.write(
            MAPPINGS_TABLE,
            &mapping_key(fabric_index, fabric_group),
            &serde_json::to_vec(&mapping)?,
        )?;

        state.next.insert(fabric_index, id + 1);
        state.by_device.insert((fabric_index, device_group), fabric_group);
        state.mappings.insert((fabric_index, fabric_group), mapping);
        debug!(
            fabric_index = fabric_index.0,
            fabric_group = fabric_group.0,
            device_group = device_group.0,
            "Group mapping added"
        );
        Ok(fabric_group)
    }

    /// Remove the mapping of `device_group`. Absent mappings are not an error.
    pub fn remove_mapping(&self, fabric_index: FabricIndex, device_group: GroupId) -> Result<Option<GroupMapping>> {
        let mut state = self.state.lock();
        let fabric_group = match state.by_device.get(&(fabric_index, device_group)) {
            Some(group) => *group,
            None => return Ok(None),
        };
        self.backend
            .delete(MAPPINGS_TABLE, &mapping_key(fabric_index, fabric_group))?;
        state.by_device.remove(&(fabric_index, device_group));
        Ok(state.mappings.remove(&(fabric_index, fabric_group)))
    }

    /// Remove every mapping of a fabric. Other fabrics are untouched.
    pub fn remove_all(&self, fabric_index: FabricIndex) -> Result<Vec<GroupMapping>> {
        let mut state = self.state.lock();
        let keys: Vec<(FabricIndex, GroupId)> = state
            .mappings
            .keys()
            .filter(|(fabric, _)| *fabric == fabric_index)
            .copied()
            .collect();

        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            self.backend.delete(MAPPINGS_TABLE, &mapping_key(key.0, key.1))?;
            if let Some(mapping) = state.mappings.remove(&key) {
                state.by_device.remove(&(fabric_index, mapping.device_group));
                removed.push(mapping);
            }
        }
        Ok(removed)
    }

    /// Whether a fabric other than `fabric_index` maps `device_group`.
    pub fn mapped_elsewhere(&self, fabric_index: FabricIndex, device_group: GroupId) -> bool {
        self.state
            .lock()
            .by_device
            .keys()
            .any(|(fabric, group)| *fabric != fabric_index && *group == device_group)
    }

    /// Mappings of a fabric ordered by fabric group id.
    pub fn mappings(&self, fabric_index: FabricIndex) -> Vec<GroupMapping> {
        self.state
            .lock()
            .mappings
            .values()
            .filter(|m| m.fabric_index == fabric_index)
            .cloned()
            .collect()
    }

    /// Fabric group ids still available on a fabric.
    pub fn remaining(&self, fabric_index: FabricIndex) -> usize {
        let state = self.state.lock();
        let next = self.next_id(&state, fabric_index);
        (u32::from(self.max_group) + 1).saturating_sub(next) as usize
    }
}
