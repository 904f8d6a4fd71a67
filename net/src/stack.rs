use log::warn;

use tern_host::{CommandBuffer, NetworkHooks, PlaybackError, World};
use tern_shared::{
    DataReader, DataWriter, EntityLifecycleStatus, GlobalTime, NodeId, Payload,
};

use crate::components::{
    ConstructionOrder, DestructionOrder, EVENT_CONSTRUCTION_ORDER, EVENT_DESTRUCTION_ORDER,
    FORCE_NETWORK_PUBLISH,
};
use crate::ghost::{GhostConfig, GhostTracker};
use crate::identity::NetworkIdentityMap;
use crate::lifecycle::{DefaultLifecycleManager, LifecycleManager};
use crate::ownership::{OwnershipStrategy, PrimaryOwnerStrategy};
use crate::reliable_init::{ReliableInitConfig, ReliableInitGateway};
use crate::spawner::run_spawner;
use crate::template::TemplateDatabase;
use crate::topology::NetworkTopology;
use crate::translator::{
    EgressTranslator, IngressCtx, MasterEgressTranslator, MasterTranslator, OwnershipTranslator,
    StateEgressTranslator, StateTranslator, WeaponEgressTranslator, WeaponTranslator,
};

/// The networking layer as seen by the frame kernel.
///
/// Ingress: decode samples through the translators, run the spawner, drive
/// the reliable-init gateway, sweep ghosts, and play back the layer's own
/// deferred removals. Egress: let every translator publish what this node
/// owns, then expire the one-shot publish markers.
pub struct NetworkStack {
    local_node: NodeId,
    reader: Box<dyn DataReader>,
    writer: Box<dyn DataWriter>,
    ids: NetworkIdentityMap,
    ghosts: GhostTracker,
    templates: TemplateDatabase,
    strategy: Box<dyn OwnershipStrategy>,
    lifecycle: Box<dyn LifecycleManager>,
    topology: Box<dyn NetworkTopology>,
    gateway: ReliableInitGateway,
    egress_translators: Vec<Box<dyn EgressTranslator>>,
    cmd: CommandBuffer,
}

impl NetworkStack {
    pub fn new(
        local_node: NodeId,
        reader: Box<dyn DataReader>,
        writer: Box<dyn DataWriter>,
        templates: TemplateDatabase,
        topology: Box<dyn NetworkTopology>,
    ) -> Self {
        Self {
            local_node,
            reader,
            writer,
            ids: NetworkIdentityMap::new(),
            ghosts: GhostTracker::new(GhostConfig::default()),
            templates,
            strategy: Box::new(PrimaryOwnerStrategy),
            lifecycle: Box::new(DefaultLifecycleManager::new()),
            topology,
            gateway: ReliableInitGateway::new(ReliableInitConfig::default()),
            egress_translators: Vec::new(),
            cmd: CommandBuffer::new(),
        }
    }

    pub fn with_ownership_strategy(mut self, strategy: Box<dyn OwnershipStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_lifecycle_manager(mut self, lifecycle: Box<dyn LifecycleManager>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_ghost_config(mut self, config: GhostConfig) -> Self {
        self.ghosts = GhostTracker::new(config);
        self
    }

    pub fn with_reliable_init_config(mut self, config: ReliableInitConfig) -> Self {
        self.gateway = ReliableInitGateway::new(config);
        self
    }

    pub fn with_egress_translator(mut self, translator: Box<dyn EgressTranslator>) -> Self {
        self.egress_translators.push(translator);
        self
    }

    /// The stock egress set: master, state and weapon publishers.
    pub fn with_standard_egress(self) -> Self {
        self.with_egress_translator(Box::new(MasterEgressTranslator::new()))
            .with_egress_translator(Box::new(StateEgressTranslator::new()))
            .with_egress_translator(Box::new(WeaponEgressTranslator::new()))
    }

    pub fn local_node(&self) -> NodeId {
        self.local_node
    }

    pub fn ids(&self) -> &NetworkIdentityMap {
        &self.ids
    }

    pub fn gateway(&self) -> &ReliableInitGateway {
        &self.gateway
    }

    pub fn ghosts(&self) -> &GhostTracker {
        &self.ghosts
    }
}

impl NetworkHooks for NetworkStack {
    fn ingress(&mut self, world: &mut World, time: &GlobalTime) -> Result<(), PlaybackError> {
        // Entities whose construction finished last frame go Active first.
        self.lifecycle.drive(world);

        let samples = self.reader.take_samples();
        let mut statuses: Vec<EntityLifecycleStatus> = Vec::new();

        {
            let mut ctx = IngressCtx {
                world: &mut *world,
                ids: &mut self.ids,
                ghosts: &mut self.ghosts,
                local_node: self.local_node,
                time,
            };
            for sample in &samples {
                match &sample.payload {
                    Payload::Master(master) => MasterTranslator::apply(
                        &mut ctx,
                        self.lifecycle.as_mut(),
                        &mut self.gateway,
                        master,
                        sample.instance_state,
                    ),
                    Payload::State(state) => {
                        StateTranslator::apply(&mut ctx, state, sample.instance_state)
                    }
                    Payload::Ownership(update) => OwnershipTranslator::apply(&mut ctx, update),
                    Payload::Weapon(weapon) => WeaponTranslator::apply(&mut ctx, weapon),
                    Payload::Lifecycle(status) => statuses.push(*status),
                    // Time-sync payloads ride their own channel; a sample
                    // landing here is a wiring mistake, not a protocol error.
                    Payload::Pulse(_)
                    | Payload::Order(_)
                    | Payload::Ack(_)
                    | Payload::SwitchMode(_) => {}
                }
            }
        }

        run_spawner(
            world,
            time,
            &self.templates,
            self.strategy.as_mut(),
            self.lifecycle.as_mut(),
            &mut self.ghosts,
            self.local_node,
            &mut self.cmd,
        );

        // Construction orders published this pass go through the barrier.
        let orders: Vec<ConstructionOrder> = world
            .bus()
            .read_managed::<ConstructionOrder>(EVENT_CONSTRUCTION_ORDER)
            .to_vec();
        for order in &orders {
            self.gateway.on_construction_order(
                world,
                &self.ids,
                self.topology.as_mut(),
                self.lifecycle.as_mut(),
                self.writer.as_mut(),
                self.local_node,
                order,
                time,
            );
        }

        let destructions: Vec<DestructionOrder> = world
            .bus()
            .read_managed::<DestructionOrder>(EVENT_DESTRUCTION_ORDER)
            .to_vec();
        for destruction in &destructions {
            self.gateway.on_destruction(destruction.network_id);
        }

        for status in &statuses {
            self.gateway.handle_status(
                world,
                &self.ids,
                self.lifecycle.as_mut(),
                self.writer.as_mut(),
                self.local_node,
                status,
                time,
            );
        }

        self.gateway.sweep_timeouts(
            world,
            &self.ids,
            self.lifecycle.as_mut(),
            self.writer.as_mut(),
            self.local_node,
            time,
        );

        self.ghosts.sweep(world, &mut self.ids, time.frame);

        self.cmd.playback(world)
    }

    fn egress(&mut self, world: &World, time: &GlobalTime, cmd: &mut CommandBuffer) {
        for translator in &mut self.egress_translators {
            if let Err(error) = translator.scan_and_publish(
                world,
                &self.ids,
                self.local_node,
                self.writer.as_mut(),
                cmd,
                time,
            ) {
                warn!("egress translator transport failure: {}", error);
            }
        }

        // One-shot publish markers expire after a single egress pass.
        for entity in world
            .query()
            .with(FORCE_NETWORK_PUBLISH)
            .include_all()
            .iter()
        {
            cmd.remove_component(entity, FORCE_NETWORK_PUBLISH);
        }
    }
}
