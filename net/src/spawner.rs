use log::{error, warn};

use tern_host::{CommandBuffer, World};
use tern_shared::{pack_key, Entity, GlobalTime, LifecycleState, NodeId};

use crate::components::{
    DescriptorOwnership, NetworkEntityInfo, NetworkSpawnRequest, DESCRIPTOR_OWNERSHIP,
    NETWORK_ENTITY_INFO, NETWORK_SPAWN_REQUEST, PENDING_NETWORK_ACK,
};
use crate::ghost::GhostTracker;
use crate::lifecycle::LifecycleManager;
use crate::ownership::OwnershipStrategy;
use crate::template::TemplateDatabase;

/// Processes every entity carrying a spawn request this frame: applies the
/// template (preserving a ghost's network-observed fields), assigns
/// per-descriptor instance ownership, arms the reliable-init barrier and
/// starts lifecycle construction.
///
/// A failing request is never re-queued: removal is recorded up front, so
/// whatever happens below the request disappears this frame.
pub(crate) fn run_spawner(
    world: &mut World,
    time: &GlobalTime,
    templates: &TemplateDatabase,
    strategy: &mut dyn OwnershipStrategy,
    lifecycle: &mut dyn LifecycleManager,
    ghosts: &mut GhostTracker,
    _local_node: NodeId,
    cmd: &mut CommandBuffer,
) {
    let requests: Vec<Entity> = world
        .query()
        .with(NETWORK_SPAWN_REQUEST)
        .include_all()
        .iter()
        .collect();

    for entity in requests {
        let Some(request) = world
            .get_component::<NetworkSpawnRequest>(entity, NETWORK_SPAWN_REQUEST)
            .copied()
        else {
            continue;
        };
        cmd.remove_component(entity, NETWORK_SPAWN_REQUEST);

        let Ok(state) = world.lifecycle(entity) else {
            continue;
        };
        if state.rank() >= LifecycleState::Constructing.rank() {
            // Duplicate master for an entity already past spawning.
            continue;
        }

        let Some(template) = templates.get(request.dis_type) else {
            error!(
                "no template for dis_type {} (network id {}); dropping spawn request",
                request.dis_type, request.network_entity_id
            );
            continue;
        };

        let preserve_existing = state == LifecycleState::Ghost;
        if let Err(problem) = template.apply(world, entity, preserve_existing) {
            error!(
                "template '{}' failed on {:?}: {}; dropping spawn request",
                template.name(),
                entity,
                problem
            );
            continue;
        }

        assign_descriptor_owners(world, entity, templates, strategy, &request);

        let info = NetworkEntityInfo {
            network_entity_id: request.network_entity_id,
            dis_type: request.dis_type,
            flags: request.flags,
            pad: [0; 3],
        };
        let _ = world.add_component(entity, NETWORK_ENTITY_INFO, info);

        if request.reliable_init() {
            let _ = world.add_marker(entity, PENDING_NETWORK_ACK);
        }

        if let Err(problem) = world.set_lifecycle(entity, LifecycleState::Constructing) {
            warn!("could not start construction of {:?}: {}", entity, problem);
            continue;
        }
        ghosts.untrack(entity);

        lifecycle.begin_construction(world, entity, request.dis_type, time.frame);
    }
}

fn assign_descriptor_owners(
    world: &mut World,
    entity: Entity,
    templates: &TemplateDatabase,
    strategy: &mut dyn OwnershipStrategy,
    request: &NetworkSpawnRequest,
) {
    let instance_count = templates.instance_count(request.dis_type);
    let Some(template) = templates.get(request.dis_type) else {
        return;
    };

    let mut assignments = Vec::new();
    for descriptor_type_id in template.descriptors() {
        for instance_id in 0..instance_count {
            if let Some(owner) = strategy.initial_owner(
                request.dis_type,
                *descriptor_type_id,
                instance_id,
                request.primary_owner_id,
            ) {
                assignments.push((pack_key(*descriptor_type_id, instance_id), owner));
            }
        }
    }
    if assignments.is_empty() {
        return;
    }

    if world
        .get_managed::<DescriptorOwnership>(entity, DESCRIPTOR_OWNERSHIP)
        .is_none()
    {
        let _ = world.add_managed(entity, DESCRIPTOR_OWNERSHIP, DescriptorOwnership::default());
    }
    if let Some(ownership) =
        world.get_managed_mut::<DescriptorOwnership>(entity, DESCRIPTOR_OWNERSHIP)
    {
        for (key, owner) in assignments {
            ownership.map.insert(key, owner);
        }
    }
}
