use log::warn;

use tern_shared::{pack_key, OwnershipUpdate};

use crate::components::{
    DescriptorAuthorityChanged, DescriptorOwnership, DESCRIPTOR_OWNERSHIP,
    EVENT_AUTHORITY_CHANGED, FORCE_NETWORK_PUBLISH,
};
use crate::ownership::resolve_owner;
use crate::translator::IngressCtx;

/// Ingress of per-descriptor ownership grants and transfers.
///
/// Emits `DescriptorAuthorityChanged` only when authority actually crossed
/// the local-node boundary, and forces one confirming publish when this
/// node just became the owner. Duplicate deliveries are no-ops.
pub(crate) struct OwnershipTranslator;

impl OwnershipTranslator {
    pub fn apply(ctx: &mut IngressCtx, update: &OwnershipUpdate) {
        let Some(entity) = ctx.ids.entity(update.network_id) else {
            return;
        };

        let was_owner = resolve_owner(
            ctx.world,
            entity,
            update.descriptor_type_id,
            update.instance_id,
        ) == Some(ctx.local_node);

        if ctx
            .world
            .get_managed::<DescriptorOwnership>(entity, DESCRIPTOR_OWNERSHIP)
            .is_none()
        {
            if let Err(error) =
                ctx.world
                    .add_managed(entity, DESCRIPTOR_OWNERSHIP, DescriptorOwnership::default())
            {
                warn!("ownership update for {} dropped: {}", update.network_id, error);
                return;
            }
        }
        let ownership = ctx
            .world
            .get_managed_mut::<DescriptorOwnership>(entity, DESCRIPTOR_OWNERSHIP)
            .expect("just ensured presence");
        ownership.map.insert(
            pack_key(update.descriptor_type_id, update.instance_id),
            update.new_owner,
        );

        let is_now_owner = update.new_owner == ctx.local_node;
        if was_owner == is_now_owner {
            return;
        }

        ctx.world.bus_mut().publish_managed(
            EVENT_AUTHORITY_CHANGED,
            DescriptorAuthorityChanged {
                entity,
                descriptor_type_id: update.descriptor_type_id,
                instance_id: update.instance_id,
                is_now_owner,
                new_owner_id: update.new_owner,
            },
        );

        if is_now_owner {
            // One confirming publish so peers see the transfer take hold.
            let _ = ctx.world.add_marker(entity, FORCE_NETWORK_PUBLISH);
        }
    }
}
