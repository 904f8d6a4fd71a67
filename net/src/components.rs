use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use tern_host::{EventBus, World, WorldError};
use tern_shared::{
    ComponentTypeId, DisType, Entity, EventTypeId, FrameIndex, InstanceId, NetworkEntityId, NodeId,
    PackedKey,
};

// Component type ids of the network layer. Applications layer their own
// component ids above these.
pub const POSITION: ComponentTypeId = 1;
pub const VELOCITY: ComponentTypeId = 2;
pub const NETWORK_IDENTITY: ComponentTypeId = 3;
pub const NETWORK_OWNERSHIP: ComponentTypeId = 4;
pub const NETWORK_TARGET: ComponentTypeId = 5;
pub const NETWORK_SPAWN_REQUEST: ComponentTypeId = 6;
pub const PENDING_NETWORK_ACK: ComponentTypeId = 7;
pub const FORCE_NETWORK_PUBLISH: ComponentTypeId = 8;
pub const DESCRIPTOR_OWNERSHIP: ComponentTypeId = 9;
pub const WEAPON_STATES: ComponentTypeId = 10;
pub const NETWORK_ENTITY_INFO: ComponentTypeId = 11;

pub const EVENT_AUTHORITY_CHANGED: EventTypeId = 1;
pub const EVENT_CONSTRUCTION_ORDER: EventTypeId = 2;
pub const EVENT_DESTRUCTION_ORDER: EventTypeId = 3;

pub const SPAWN_FLAG_RELIABLE_INIT: u8 = 1 << 0;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Position {
    pub value: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Velocity {
    pub value: [f32; 3],
}

/// Mapping key to the peer-assigned entity id. Never regenerated locally.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NetworkIdentity {
    pub value: NetworkEntityId,
}

/// Whole-entity ownership: the fallback when no per-descriptor override
/// exists.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NetworkOwnership {
    pub local_node_id: NodeId,
    pub primary_owner_id: NodeId,
}

/// Last received remote state, kept for smoothing. Never written on the
/// owning node.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NetworkTarget {
    pub location: [f32; 3],
    pub velocity: [f32; 3],
    pub timestamp: f64,
}

/// Pending work for the spawner; removed once the request is processed.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NetworkSpawnRequest {
    pub network_entity_id: NetworkEntityId,
    pub dis_type: DisType,
    pub primary_owner_id: NodeId,
    pub flags: u8,
    pub pad: u8,
}

impl NetworkSpawnRequest {
    pub fn reliable_init(&self) -> bool {
        self.flags & SPAWN_FLAG_RELIABLE_INIT != 0
    }
}

/// Durable record of a replicated entity's wire identity, written by the
/// spawner and read by the egress translators.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct NetworkEntityInfo {
    pub network_entity_id: NetworkEntityId,
    pub dis_type: DisType,
    pub flags: u8,
    pub pad: [u8; 3],
}

/// Per-descriptor, per-instance ownership overrides, keyed by packed
/// `(type_id, instance_id)`. Absent keys fall back to the primary owner.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DescriptorOwnership {
    pub map: HashMap<PackedKey, NodeId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WeaponEntry {
    pub status: u8,
    pub azimuth: f32,
    pub elevation: f32,
    pub ammo: u32,
}

/// Example multi-instance managed component: one entry per turret,
/// addressed by instance id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeaponStates {
    pub weapons: HashMap<InstanceId, WeaponEntry>,
}

/// Descriptor authority crossed the local-node boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DescriptorAuthorityChanged {
    pub entity: Entity,
    pub descriptor_type_id: ComponentTypeId,
    pub instance_id: InstanceId,
    pub is_now_owner: bool,
    pub new_owner_id: NodeId,
}

/// Lifecycle manager announcement that an entity entered construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstructionOrder {
    pub entity: Entity,
    pub dis_type: DisType,
    pub frame: FrameIndex,
}

/// Lifecycle manager announcement that an entity is being torn down.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DestructionOrder {
    pub entity: Entity,
    pub network_id: NetworkEntityId,
    pub frame: FrameIndex,
}

/// Registers every network component against a world. Protocol markers and
/// smoothing state are transient: filtered snapshots skip them unless a
/// module opts in.
pub fn register_network_components(world: &mut World) -> Result<(), WorldError> {
    world.register::<Position>(POSITION)?;
    world.register::<Velocity>(VELOCITY)?;
    world.register::<NetworkIdentity>(NETWORK_IDENTITY)?;
    world.register::<NetworkOwnership>(NETWORK_OWNERSHIP)?;
    world.register::<NetworkTarget>(NETWORK_TARGET)?;
    world.register::<NetworkSpawnRequest>(NETWORK_SPAWN_REQUEST)?;
    world.register_raw(PENDING_NETWORK_ACK, 0)?;
    world.register_raw(FORCE_NETWORK_PUBLISH, 0)?;
    world.register_managed::<DescriptorOwnership>(DESCRIPTOR_OWNERSHIP)?;
    world.register_managed::<WeaponStates>(WEAPON_STATES)?;
    world.register::<NetworkEntityInfo>(NETWORK_ENTITY_INFO)?;

    world.mark_transient(NETWORK_TARGET);
    world.mark_transient(NETWORK_SPAWN_REQUEST);
    world.mark_transient(PENDING_NETWORK_ACK);
    world.mark_transient(FORCE_NETWORK_PUBLISH);

    register_network_events(world.bus_mut());
    Ok(())
}

/// Registers the network layer's managed event types against a bus.
pub fn register_network_events(bus: &mut EventBus) {
    bus.register_managed::<DescriptorAuthorityChanged>(EVENT_AUTHORITY_CHANGED);
    bus.register_managed::<ConstructionOrder>(EVENT_CONSTRUCTION_ORDER);
    bus.register_managed::<DestructionOrder>(EVENT_DESTRUCTION_ORDER);
}
