use std::collections::{HashMap, HashSet};

use log::{info, warn};

use tern_host::World;
use tern_shared::{
    DataSample, DataWriter, Entity, EntityLifecycleStatus, GlobalTime, LifecycleState,
    NetworkEntityId, NodeId, Payload,
};

use crate::components::{ConstructionOrder, PENDING_NETWORK_ACK};
use crate::identity::NetworkIdentityMap;
use crate::lifecycle::LifecycleManager;
use crate::topology::NetworkTopology;

/// Configuration for the reliable-init peer-ack barrier
#[derive(Clone, Copy, Debug)]
pub struct ReliableInitConfig {
    /// Frames to wait for peer acks before construction is force-acked;
    /// reliability degrades to liveness.
    pub timeout_frames: u64,
}

impl Default for ReliableInitConfig {
    fn default() -> Self {
        Self { timeout_frames: 300 }
    }
}

struct PendingInit {
    start_frame: u64,
    peers: HashSet<NodeId>,
}

/// Holds reliably-initialised entities in `Constructing` until every
/// expected peer has announced the entity `Active` on its side, then acks
/// locally and lets construction finish.
///
/// Entities pend independently; one entity's slow peers never delay
/// another's barrier.
pub struct ReliableInitGateway {
    config: ReliableInitConfig,
    pending: HashMap<NetworkEntityId, PendingInit>,
}

impl ReliableInitGateway {
    pub fn new(config: ReliableInitConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_peers(&self, network_id: NetworkEntityId) -> Option<&HashSet<NodeId>> {
        self.pending.get(&network_id).map(|pending| &pending.peers)
    }

    /// A construction order arrived from the lifecycle manager: either ack
    /// immediately (fast mode, or no peers expected) or start waiting.
    pub fn on_construction_order(
        &mut self,
        world: &mut World,
        ids: &NetworkIdentityMap,
        topology: &mut dyn NetworkTopology,
        lifecycle: &mut dyn LifecycleManager,
        writer: &mut dyn DataWriter,
        local_node: NodeId,
        order: &ConstructionOrder,
        time: &GlobalTime,
    ) {
        let entity = order.entity;
        if !world.is_alive(entity) {
            return;
        }
        let network_id = ids.network_id(entity);

        if !world.has_component(entity, PENDING_NETWORK_ACK) {
            // Fast-init path: nothing to wait for.
            complete(world, lifecycle, writer, local_node, entity, network_id, time);
            return;
        }

        let peers: HashSet<NodeId> = topology.expected_peers(order.dis_type).into_iter().collect();
        if peers.is_empty() {
            complete(world, lifecycle, writer, local_node, entity, network_id, time);
            return;
        }

        let Some(network_id) = network_id else {
            // A reliable-init entity with no wire identity cannot be acked
            // by anyone; do not wedge it in Constructing.
            warn!("reliable-init entity {:?} has no network id; acking immediately", entity);
            complete(world, lifecycle, writer, local_node, entity, None, time);
            return;
        };

        info!(
            "entity {:?} (network id {}) pending acks from {:?}",
            entity, network_id, peers
        );
        self.pending.insert(
            network_id,
            PendingInit {
                start_frame: order.frame,
                peers,
            },
        );
    }

    /// A peer announced its local lifecycle state for an entity. Acks for
    /// unknown or already-completed entities are dropped; duplicate acks
    /// are naturally idempotent.
    pub fn handle_status(
        &mut self,
        world: &mut World,
        ids: &NetworkIdentityMap,
        lifecycle: &mut dyn LifecycleManager,
        writer: &mut dyn DataWriter,
        local_node: NodeId,
        status: &EntityLifecycleStatus,
        time: &GlobalTime,
    ) {
        if status.state != LifecycleState::Active {
            return;
        }
        let Some(pending) = self.pending.get_mut(&status.network_id) else {
            return;
        };
        pending.peers.remove(&status.node_id);
        if !pending.peers.is_empty() {
            return;
        }

        self.pending.remove(&status.network_id);
        if let Some(entity) = ids.entity(status.network_id) {
            complete(
                world,
                lifecycle,
                writer,
                local_node,
                entity,
                Some(status.network_id),
                time,
            );
        }
    }

    /// An entity pending acks is being torn down; later acks are dropped.
    pub fn on_destruction(&mut self, network_id: NetworkEntityId) {
        self.pending.remove(&network_id);
    }

    /// Force-acks every pending entity whose barrier has waited
    /// `timeout_frames`.
    pub fn sweep_timeouts(
        &mut self,
        world: &mut World,
        ids: &NetworkIdentityMap,
        lifecycle: &mut dyn LifecycleManager,
        writer: &mut dyn DataWriter,
        local_node: NodeId,
        time: &GlobalTime,
    ) {
        let timeout = self.config.timeout_frames;
        let expired: Vec<NetworkEntityId> = self
            .pending
            .iter()
            .filter(|(_, pending)| time.frame.saturating_sub(pending.start_frame) >= timeout)
            .map(|(network_id, _)| *network_id)
            .collect();

        for network_id in expired {
            let pending = self.pending.remove(&network_id).expect("listed as pending");
            warn!(
                "reliable init of network id {} timed out after {} frames; still waiting on {:?}",
                network_id, timeout, pending.peers
            );
            if let Some(entity) = ids.entity(network_id) {
                complete(
                    world,
                    lifecycle,
                    writer,
                    local_node,
                    entity,
                    Some(network_id),
                    time,
                );
            }
        }
    }
}

/// Local ack: finish construction, drop the barrier marker, and announce
/// `Active` to the cluster.
fn complete(
    world: &mut World,
    lifecycle: &mut dyn LifecycleManager,
    writer: &mut dyn DataWriter,
    local_node: NodeId,
    entity: Entity,
    network_id: Option<NetworkEntityId>,
    time: &GlobalTime,
) {
    if let Err(error) = world.remove_component(entity, PENDING_NETWORK_ACK) {
        warn!("could not clear pending-ack marker: {}", error);
    }
    lifecycle.finish_construction(world, entity);

    let Some(network_id) = network_id else {
        return;
    };
    let status = EntityLifecycleStatus {
        network_id,
        node_id: local_node,
        state: LifecycleState::Active,
        timestamp: time.total,
    };
    if let Err(error) = writer.write(DataSample::alive(Payload::Lifecycle(status))) {
        warn!("could not announce lifecycle status: {}", error);
    }
}
