use bytemuck::Pod;

use tern_shared::{ComponentTypeId, Entity, EventTypeId, FrameIndex, GlobalTime};

use crate::command::CommandBuffer;
use crate::world::{Query, World};

/// Read-only view of the simulation handed to a module for one tick.
///
/// Everything read through the view comes from the module's snapshot, not
/// the live world; the only write path is the deferred command buffer.
pub struct SimView<'a> {
    world: &'a World,
    cmd: &'a mut CommandBuffer,
    time: GlobalTime,
}

impl<'a> SimView<'a> {
    pub(crate) fn new(world: &'a World, cmd: &'a mut CommandBuffer, time: GlobalTime) -> Self {
        Self { world, cmd, time }
    }

    pub fn tick(&self) -> FrameIndex {
        self.time.frame
    }

    pub fn time(&self) -> f32 {
        self.time.total as f32
    }

    pub fn global_time(&self) -> &GlobalTime {
        &self.time
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world.is_alive(entity)
    }

    pub fn has_component(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        self.world.has_component(entity, type_id)
    }

    pub fn get_component_ro<T: Pod>(&self, entity: Entity, type_id: ComponentTypeId) -> Option<&T> {
        self.world.get_component(entity, type_id)
    }

    pub fn get_managed_component_ro<T: 'static>(
        &self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Option<&T> {
        self.world.get_managed(entity, type_id)
    }

    /// Events accumulated for this view since the module last ran.
    pub fn consume_events<T: Pod>(&self, type_id: EventTypeId) -> &[T] {
        self.world.bus().read(type_id)
    }

    pub fn consume_managed_events<T: 'static>(&self, type_id: EventTypeId) -> &[T] {
        self.world.bus().read_managed(type_id)
    }

    pub fn query(&self) -> Query {
        self.world.query()
    }

    /// The deferred write path back into the live world.
    pub fn command_buffer(&mut self) -> &mut CommandBuffer {
        self.cmd
    }
}
