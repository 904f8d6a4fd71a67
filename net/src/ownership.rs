use tern_host::World;
use tern_shared::{pack_key, ComponentTypeId, DisType, Entity, InstanceId, NodeId};

use crate::components::{DescriptorOwnership, NetworkOwnership, DESCRIPTOR_OWNERSHIP, NETWORK_OWNERSHIP};

/// Decides the initial owner of each descriptor instance when the spawner
/// applies a template.
///
/// `None` leaves the packed key absent so resolution falls back to the
/// entity's primary owner.
pub trait OwnershipStrategy: Send {
    fn initial_owner(
        &mut self,
        dis_type: DisType,
        descriptor_type_id: ComponentTypeId,
        instance_id: InstanceId,
        primary_owner: NodeId,
    ) -> Option<NodeId>;
}

/// Default strategy: every descriptor follows the primary owner.
pub struct PrimaryOwnerStrategy;

impl OwnershipStrategy for PrimaryOwnerStrategy {
    fn initial_owner(
        &mut self,
        _dis_type: DisType,
        _descriptor_type_id: ComponentTypeId,
        _instance_id: InstanceId,
        _primary_owner: NodeId,
    ) -> Option<NodeId> {
        None
    }
}

/// Resolves the owner of one descriptor instance: the per-descriptor map
/// wins, the primary owner is the fallback.
pub fn resolve_owner(
    world: &World,
    entity: Entity,
    descriptor_type_id: ComponentTypeId,
    instance_id: InstanceId,
) -> Option<NodeId> {
    if let Some(ownership) = world.get_managed::<DescriptorOwnership>(entity, DESCRIPTOR_OWNERSHIP)
    {
        if let Some(owner) = ownership.map.get(&pack_key(descriptor_type_id, instance_id)) {
            return Some(*owner);
        }
    }
    world
        .get_component::<NetworkOwnership>(entity, NETWORK_OWNERSHIP)
        .map(|ownership| ownership.primary_owner_id)
}

/// True iff this node owns the given descriptor instance of the entity.
pub fn owns_descriptor(
    world: &World,
    entity: Entity,
    descriptor_type_id: ComponentTypeId,
    instance_id: InstanceId,
    local_node: NodeId,
) -> bool {
    resolve_owner(world, entity, descriptor_type_id, instance_id) == Some(local_node)
}
