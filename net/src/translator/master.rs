use log::warn;

use tern_shared::{EntityMaster, InstanceState, LifecycleState};

use crate::components::{
    NetworkIdentity, NetworkOwnership, NetworkSpawnRequest, NETWORK_IDENTITY, NETWORK_OWNERSHIP,
    NETWORK_SPAWN_REQUEST, SPAWN_FLAG_RELIABLE_INIT,
};
use crate::lifecycle::LifecycleManager;
use crate::reliable_init::ReliableInitGateway;
use crate::translator::IngressCtx;

/// Ingress of authoritative entity declarations.
///
/// Creates the local entity (or reuses a prior ghost), attaches the spawn
/// request that hands the entity to the spawner, and records whole-entity
/// ownership. A disposed sample tears the entity down and erases its id
/// mapping.
pub(crate) struct MasterTranslator;

impl MasterTranslator {
    pub fn apply(
        ctx: &mut IngressCtx,
        lifecycle: &mut dyn LifecycleManager,
        gateway: &mut ReliableInitGateway,
        master: &EntityMaster,
        instance_state: InstanceState,
    ) {
        if instance_state == InstanceState::Disposed {
            Self::dispose(ctx, lifecycle, gateway, master);
            return;
        }

        let entity = match ctx.ids.entity(master.network_id) {
            Some(entity) => entity,
            None => {
                let entity = ctx.world.create_entity();
                if let Err(error) = ctx.world.add_component(
                    entity,
                    NETWORK_IDENTITY,
                    NetworkIdentity {
                        value: master.network_id,
                    },
                ) {
                    warn!("master for {} dropped: {}", master.network_id, error);
                    let _ = ctx.world.destroy_entity(entity);
                    return;
                }
                ctx.ids.insert(master.network_id, entity);
                entity
            }
        };

        let mut flags = 0u8;
        if master.flags.reliable_init {
            flags |= SPAWN_FLAG_RELIABLE_INIT;
        }
        let request = NetworkSpawnRequest {
            network_entity_id: master.network_id,
            dis_type: master.dis_type,
            primary_owner_id: master.primary_owner_id,
            flags,
            pad: 0,
        };
        if let Err(error) = ctx.world.add_component(entity, NETWORK_SPAWN_REQUEST, request) {
            warn!("spawn request for {} dropped: {}", master.network_id, error);
            return;
        }
        let _ = ctx.world.add_component(
            entity,
            NETWORK_OWNERSHIP,
            NetworkOwnership {
                local_node_id: ctx.local_node,
                primary_owner_id: master.primary_owner_id,
            },
        );
    }

    fn dispose(
        ctx: &mut IngressCtx,
        lifecycle: &mut dyn LifecycleManager,
        gateway: &mut ReliableInitGateway,
        master: &EntityMaster,
    ) {
        let Some(entity) = ctx.ids.remove_by_id(master.network_id) else {
            return;
        };
        ctx.ghosts.untrack(entity);
        gateway.on_destruction(master.network_id);
        lifecycle.begin_destruction(ctx.world, entity, master.network_id, ctx.time.frame);
        let _ = ctx.world.set_lifecycle(entity, LifecycleState::Destroying);
        if let Err(error) = ctx.world.destroy_entity(entity) {
            warn!("disposal of {} failed: {}", master.network_id, error);
        }
    }
}
