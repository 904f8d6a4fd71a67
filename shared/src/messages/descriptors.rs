use crate::types::{
    ComponentTypeId, DisType, InstanceId, LifecycleState, NetworkEntityId, NodeId,
};

/// Spawn-time options carried by an [`EntityMaster`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MasterFlags {
    /// Requests the peer-ack barrier: the entity may not finish
    /// construction until every expected peer has announced `Active`.
    pub reliable_init: bool,
}

/// Declarative "this entity exists" descriptor.
///
/// The authoritative owner of the whole entity is `primary_owner_id`;
/// per-descriptor overrides arrive later as [`OwnershipUpdate`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityMaster {
    pub network_id: NetworkEntityId,
    pub dis_type: DisType,
    pub primary_owner_id: NodeId,
    pub flags: MasterFlags,
    pub name: String,
}

/// Kinematic state update. Arrives at any rate, in any order relative to
/// the entity's master descriptor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityState {
    pub network_id: NetworkEntityId,
    pub owner_id: NodeId,
    pub location: [f32; 3],
    pub velocity: [f32; 3],
    pub timestamp: f64,
}

/// A peer announcing the local lifecycle state of one of its entities.
/// Doubles as the ack vehicle for the reliable-init barrier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityLifecycleStatus {
    pub network_id: NetworkEntityId,
    pub node_id: NodeId,
    pub state: LifecycleState,
    pub timestamp: f64,
}

/// Grant or transfer of per-descriptor, per-instance ownership.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OwnershipUpdate {
    pub network_id: NetworkEntityId,
    pub descriptor_type_id: ComponentTypeId,
    pub instance_id: InstanceId,
    pub new_owner: NodeId,
    pub timestamp: f64,
}

/// Example multi-instance descriptor: one turret of a multi-turret entity.
/// Instances are addressed by composite key in the ownership map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeaponState {
    pub network_id: NetworkEntityId,
    pub instance_id: InstanceId,
    pub status: u8,
    pub azimuth: f32,
    pub elevation: f32,
    pub ammo: u32,
}
