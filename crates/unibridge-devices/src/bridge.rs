//! Bridge assembly and the inbound message loop.

use crate::error::Result;
use crate::fabric::{
    AttributePath, ClusterId, CommandFields, CommandId, CommandPath, FabricStack, FabricValue, GroupId,
    InvokeContext, Status,
};
use crate::commands::InvokeResult;
use crate::groups::GroupStore;
use crate::node_state::{EndpointMap, NodeStateMonitor};
use crate::router::MessageRouter;
use crate::stats::{BridgeStats, StatsSnapshot};
use crate::topic::TopicScheme;
use crate::translators::{TranslatorContext, TranslatorRegistry};
use crate::transport::{IncomingMessage, Transport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use unibridge_core::config::BridgeConfig;
use unibridge_core::eventbus::{EventBus, SharedEventBus};
use unibridge_core::storage::StorageBackend;

/// A running translation engine.
///
/// Device-side input arrives through [`Bridge::run`] (or
/// [`Bridge::handle_message`]); fabric-side requests through
/// [`Bridge::read`], [`Bridge::write`], [`Bridge::invoke`] and
/// [`Bridge::invoke_group`].
pub struct Bridge {
    config: BridgeConfig,
    topics: TopicScheme,
    transport: Arc<dyn Transport>,
    registry: Arc<TranslatorRegistry>,
    monitor: Arc<NodeStateMonitor>,
    router: MessageRouter,
    groups: Arc<GroupStore>,
    stats: Arc<BridgeStats>,
    events: SharedEventBus,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn Transport>,
        fabric: Arc<dyn FabricStack>,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Self> {
        let topics = TopicScheme::new(config.topics.root.clone());
        let events: SharedEventBus = Arc::new(EventBus::with_name("unibridge"));
        let stats = Arc::new(BridgeStats::new());
        let map = Arc::new(EndpointMap::from_settings(&config.endpoints));
        let groups = Arc::new(GroupStore::open(storage.clone(), &config.groups)?);

        let ctx = TranslatorContext {
            map: map.clone(),
            transport: transport.clone(),
            fabric: fabric.clone(),
            topics: topics.clone(),
            stats: stats.clone(),
            events: Some(events.clone()),
        };
        let registry = Arc::new(TranslatorRegistry::with_defaults(&ctx, groups.clone())?);
        let monitor = Arc::new(
            NodeStateMonitor::new(map, registry.clone(), fabric, stats.clone())
                .with_event_bus(events.clone()),
        );
        let router = MessageRouter::new(topics.clone(), monitor.clone(), registry.clone(), stats.clone());

        info!(
            first_endpoint = config.endpoints.first_dynamic_endpoint,
            capacity = config.endpoints.capacity,
            persistent = storage.is_persistent(),
            clusters = registry.clusters().len(),
            "Bridge initialized"
        );

        Ok(Self {
            config,
            topics,
            transport,
            registry,
            monitor,
            router,
            groups,
            stats,
            events,
        })
    }

    /// Subscribe the discovery topics.
    pub fn start(&self) -> Result<()> {
        for filter in self.topics.discovery_filters() {
            self.transport.subscribe(&filter)?;
            debug!(filter = %filter, "Subscribed discovery filter");
        }
        info!("Bridge started");
        Ok(())
    }

    /// Consume incoming messages in arrival order until the channel closes.
    pub async fn run(&self, mut incoming: mpsc::Receiver<IncomingMessage>) {
        while let Some(message) = incoming.recv().await {
            self.handle_message(&message);
        }
        info!("Incoming channel closed, bridge loop stopped");
    }

    /// Route one message. Failures are logged; the loop keeps going.
    pub fn handle_message(&self, message: &IncomingMessage) {
        if let Err(e) = self.router.dispatch(&message.topic, &message.payload) {
            warn!(topic = %message.topic, "Failed to handle message: {}", e);
        }
    }

    pub fn read(&self, path: &AttributePath) -> std::result::Result<FabricValue, Status> {
        match self.registry.attribute(path.cluster) {
            Some(translator) => translator.read(path),
            None => Err(Status::UnsupportedCluster),
        }
    }

    pub fn write(&self, path: &AttributePath, value: &FabricValue) -> Status {
        match self.registry.attribute(path.cluster) {
            Some(translator) => translator.write(path, value),
            None => Status::UnsupportedCluster,
        }
    }

    pub fn invoke(&self, ctx: &InvokeContext, path: &CommandPath, fields: &CommandFields) -> InvokeResult {
        match self.registry.command(path.cluster) {
            Some(translator) => translator.invoke(ctx, path, fields),
            None => Err(Status::UnsupportedCluster),
        }
    }

    pub fn invoke_group(
        &self,
        ctx: &InvokeContext,
        group: GroupId,
        cluster: ClusterId,
        command: CommandId,
        fields: &CommandFields,
    ) -> Status {
        match self.registry.command(cluster) {
            Some(translator) => translator.invoke_group(ctx, group, command, fields),
            None => Status::UnsupportedCluster,
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    pub fn monitor(&self) -> &Arc<NodeStateMonitor> {
        &self.monitor
    }

    pub fn group_store(&self) -> &Arc<GroupStore> {
        &self.groups
    }

    pub fn registry(&self) -> &Arc<TranslatorRegistry> {
        &self.registry
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}
