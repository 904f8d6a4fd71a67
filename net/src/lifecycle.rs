use log::warn;

use tern_host::World;
use tern_shared::{DisType, Entity, FrameIndex, LifecycleState, NetworkEntityId};

use crate::components::{
    ConstructionOrder, DestructionOrder, EVENT_CONSTRUCTION_ORDER, EVENT_DESTRUCTION_ORDER,
};

/// Drives entities through Constructing and into Active.
///
/// The spawner hands entities over with `begin_construction`; the
/// reliable-init gateway decides when construction may finish. Finishing
/// is acknowledged immediately but takes effect on the next frame's
/// `drive` pass, so an entity is observably `Constructing` for at least
/// one frame.
pub trait LifecycleManager: Send {
    /// Called once per frame before ingress translation.
    fn drive(&mut self, world: &mut World);

    /// Called synchronously by the spawner once the template is applied
    /// and the entity sits in `Constructing`.
    fn begin_construction(
        &mut self,
        world: &mut World,
        entity: Entity,
        dis_type: DisType,
        frame: FrameIndex,
    );

    /// Marks construction complete; the entity is promoted to `Active` on
    /// the next `drive`.
    fn finish_construction(&mut self, world: &mut World, entity: Entity);

    /// Announces teardown of an entity before it is destroyed.
    fn begin_destruction(
        &mut self,
        world: &mut World,
        entity: Entity,
        network_id: NetworkEntityId,
        frame: FrameIndex,
    );
}

/// Stock lifecycle manager: announces construction and destruction on the
/// event bus and promotes finished entities one frame later.
pub struct DefaultLifecycleManager {
    ready: Vec<Entity>,
}

impl DefaultLifecycleManager {
    pub fn new() -> Self {
        Self { ready: Vec::new() }
    }
}

impl Default for DefaultLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager for DefaultLifecycleManager {
    fn drive(&mut self, world: &mut World) {
        for entity in self.ready.drain(..) {
            if !world.is_alive(entity) {
                continue;
            }
            if let Err(error) = world.set_lifecycle(entity, LifecycleState::Active) {
                warn!("could not activate entity: {}", error);
            }
        }
    }

    fn begin_construction(
        &mut self,
        world: &mut World,
        entity: Entity,
        dis_type: DisType,
        frame: FrameIndex,
    ) {
        world.bus_mut().publish_managed(
            EVENT_CONSTRUCTION_ORDER,
            ConstructionOrder {
                entity,
                dis_type,
                frame,
            },
        );
    }

    fn finish_construction(&mut self, world: &mut World, entity: Entity) {
        let _ = world;
        self.ready.push(entity);
    }

    fn begin_destruction(
        &mut self,
        world: &mut World,
        entity: Entity,
        network_id: NetworkEntityId,
        frame: FrameIndex,
    ) {
        world.bus_mut().publish_managed(
            EVENT_DESTRUCTION_ORDER,
            DestructionOrder {
                entity,
                network_id,
                frame,
            },
        );
    }
}
