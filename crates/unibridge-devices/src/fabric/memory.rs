//! In-memory fabric stack.
//!
//! Mirrors the attribute store and records every interaction. Used by tests
//! and by the binary when no fabric stack is linked in.

use super::{
    AttributePath, CommandFields, CommandPath, EndpointDescriptor, EndpointId, FabricStack,
    FabricValue,
};
use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Default)]
struct FabricState {
    endpoints: BTreeMap<EndpointId, EndpointDescriptor>,
    registrations: usize,
    attributes: HashMap<AttributePath, FabricValue>,
    subscriptions: HashSet<AttributePath>,
    subscribe_all: bool,
    notifications: Vec<AttributePath>,
    responses: Vec<(CommandPath, CommandFields)>,
    fail_registration: bool,
}

/// Attribute-store mirror implementing [`FabricStack`].
#[derive(Default)]
pub struct InMemoryFabric {
    state: Mutex<FabricState>,
}

impl InMemoryFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a controller subscribed to `path`.
    pub fn subscribe(&self, path: AttributePath) {
        self.state.lock().subscriptions.insert(path);
    }

    /// Pretend a controller subscribed to everything.
    pub fn subscribe_all(&self, enabled: bool) {
        self.state.lock().subscribe_all = enabled;
    }

    /// Make subsequent endpoint registrations fail.
    pub fn fail_registrations(&self, fail: bool) {
        self.state.lock().fail_registration = fail;
    }

    pub fn endpoints(&self) -> Vec<EndpointId> {
        self.state.lock().endpoints.keys().copied().collect()
    }

    pub fn descriptor(&self, endpoint: EndpointId) -> Option<EndpointDescriptor> {
        self.state.lock().endpoints.get(&endpoint).cloned()
    }

    /// Number of successful register calls, re-registrations included.
    pub fn registration_count(&self) -> usize {
        self.state.lock().registrations
    }

    pub fn attribute(&self, path: &AttributePath) -> Option<FabricValue> {
        self.state.lock().attributes.get(path).cloned()
    }

    pub fn notifications(&self) -> Vec<AttributePath> {
        self.state.lock().notifications.clone()
    }

    pub fn take_notifications(&self) -> Vec<AttributePath> {
        std::mem::take(&mut self.state.lock().notifications)
    }

    pub fn command_responses(&self) -> Vec<(CommandPath, CommandFields)> {
        self.state.lock().responses.clone()
    }
}

impl FabricStack for InMemoryFabric {
    fn register_dynamic_endpoint(
        &self,
        endpoint: EndpointId,
        descriptor: &EndpointDescriptor,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_registration {
            return Err(BridgeError::Fabric(format!(
                "registration of endpoint {} refused",
                endpoint
            )));
        }
        state.endpoints.insert(endpoint, descriptor.clone());
        state.registrations += 1;
        Ok(())
    }

    fn unregister_dynamic_endpoint(&self, endpoint: EndpointId) {
        let mut state = self.state.lock();
        state.endpoints.remove(&endpoint);
        state.attributes.retain(|path, _| path.endpoint != endpoint);
    }

    fn store_attribute(&self, path: &AttributePath, value: &FabricValue) {
        self.state.lock().attributes.insert(*path, value.clone());
    }

    fn clear_attribute(&self, path: &AttributePath) {
        self.state.lock().attributes.remove(path);
    }

    fn is_subscribed(&self, path: &AttributePath) -> bool {
        let state = self.state.lock();
        state.subscribe_all || state.subscriptions.contains(path)
    }

    fn notify_attribute_change(&self, path: &AttributePath) {
        self.state.lock().notifications.push(*path);
    }

    fn command_response(&self, path: &CommandPath, fields: &CommandFields) {
        self.state.lock().responses.push((*path, fields.clone()));
    }
}
