use log::warn;

use tern_shared::{EntityState, InstanceState, LifecycleState};

use crate::components::{
    NetworkIdentity, NetworkOwnership, NetworkTarget, Position, Velocity, NETWORK_IDENTITY,
    NETWORK_OWNERSHIP, NETWORK_TARGET, POSITION, VELOCITY,
};
use crate::translator::IngressCtx;

/// Ingress of kinematic state updates.
///
/// An update for an unknown id materialises a ghost carrying only the
/// network-observed fields; this node records the claimed owner but takes
/// no authority. Updates for known entities only ever touch the smoothing
/// target, never `Position` directly, and nothing is published back.
pub(crate) struct StateTranslator;

impl StateTranslator {
    pub fn apply(ctx: &mut IngressCtx, state: &EntityState, instance_state: InstanceState) {
        if let Some(entity) = ctx.ids.entity(state.network_id) {
            let target = NetworkTarget {
                location: state.location,
                velocity: state.velocity,
                timestamp: state.timestamp,
            };
            if let Err(error) = ctx.world.add_component(entity, NETWORK_TARGET, target) {
                warn!("state update for {} dropped: {}", state.network_id, error);
            }
            return;
        }

        if instance_state == InstanceState::Disposed {
            return;
        }

        // First sight of this id: materialise a ghost.
        let entity = ctx.world.create_entity();
        ctx.world
            .set_lifecycle(entity, LifecycleState::Ghost)
            .expect("fresh entity always enters Ghost");
        if let Err(error) = ctx.world.add_component(
            entity,
            NETWORK_IDENTITY,
            NetworkIdentity {
                value: state.network_id,
            },
        ) {
            warn!("could not materialise ghost for {}: {}", state.network_id, error);
            let _ = ctx.world.destroy_entity(entity);
            return;
        }

        let _ = ctx.world.add_component(
            entity,
            POSITION,
            Position {
                value: state.location,
            },
        );
        let _ = ctx.world.add_component(
            entity,
            VELOCITY,
            Velocity {
                value: state.velocity,
            },
        );
        let _ = ctx.world.add_component(
            entity,
            NETWORK_OWNERSHIP,
            NetworkOwnership {
                local_node_id: ctx.local_node,
                primary_owner_id: state.owner_id,
            },
        );

        ctx.ids.insert(state.network_id, entity);
        ctx.ghosts.track(entity, ctx.time.frame);
    }
}
