use std::any::Any;

use bytemuck::Pod;
use log::warn;
use thiserror::Error;

use tern_shared::{ComponentTypeId, Entity, EventTypeId};

use crate::world::{World, WorldError};

/// Default pre-size of a command buffer's opcode stream; sized for a
/// high-ingress frame so steady-state recording never reallocates.
pub const DEFAULT_COMMAND_BUFFER_BYTES: usize = 320 * 1024;

const OP_CREATE_ENTITY: u8 = 1;
const OP_ADD_COMPONENT: u8 = 2;
const OP_SET_COMPONENT: u8 = 3;
const OP_REMOVE_COMPONENT: u8 = 4;
const OP_DESTROY_ENTITY: u8 = 5;
const OP_PUBLISH_EVENT: u8 = 6;
const OP_PUBLISH_MANAGED_EVENT: u8 = 7;

const TARGET_LIVE: u8 = 0;
const TARGET_CREATED: u8 = 1;

/// Errors that can occur during command playback
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// Playback ran on a thread that does not own the live world.
    #[error("command playback must run on the world's owning thread")]
    WrongThread,

    #[error("command stream truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("unknown opcode {opcode} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    /// The per-type-id lookup table had no column for this type. The table
    /// must be fully populated before any buffer is played back.
    #[error("component type {type_id} hit an uninitialised per-type-id slot")]
    UninitialisedTypeId { type_id: ComponentTypeId },

    #[error("managed payload {index} missing or already consumed")]
    MissingManagedPayload { index: usize },

    #[error("created-entity slot {slot} referenced before creation")]
    UnknownCreatedSlot { slot: u32 },

    #[error("fatal world error during playback: {0}")]
    World(WorldError),
}

/// Target of a recorded mutation: either a live entity or an entity the
/// same buffer created earlier this frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Live(Entity),
    Created(u32),
}

impl From<Entity> for CommandTarget {
    fn from(entity: Entity) -> Self {
        CommandTarget::Live(entity)
    }
}

/// Ordered opcode stream of deferred world mutations and event
/// publications.
///
/// One buffer belongs to one producer; it is recorded off the main thread
/// and replayed on the thread that owns the live world. After a successful
/// [`CommandBuffer::playback`] the buffer is cleared and ready for reuse;
/// replaying a cleared buffer is a no-op.
pub struct CommandBuffer {
    bytes: Vec<u8>,
    managed: Vec<Option<Box<dyn Any + Send + Sync>>>,
    created: u32,
    initial_bytes: usize,
    growth_logged: bool,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_COMMAND_BUFFER_BYTES)
    }

    pub fn with_capacity(initial_bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(initial_bytes),
            managed: Vec::new(),
            created: 0,
            initial_bytes,
            growth_logged: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Records creation of a new entity and returns a placeholder target
    /// for follow-up operations in the same buffer.
    pub fn create_entity(&mut self) -> CommandTarget {
        let slot = self.created;
        self.created += 1;
        self.bytes.push(OP_CREATE_ENTITY);
        self.push_u32(slot);
        self.after_write();
        CommandTarget::Created(slot)
    }

    pub fn add_component<T: Pod>(
        &mut self,
        target: impl Into<CommandTarget>,
        type_id: ComponentTypeId,
        value: T,
    ) {
        self.add_component_raw(target, type_id, bytemuck::bytes_of(&value));
    }

    pub fn add_component_raw(
        &mut self,
        target: impl Into<CommandTarget>,
        type_id: ComponentTypeId,
        bytes: &[u8],
    ) {
        self.record_component_op(OP_ADD_COMPONENT, target.into(), type_id, bytes);
    }

    pub fn set_component<T: Pod>(
        &mut self,
        target: impl Into<CommandTarget>,
        type_id: ComponentTypeId,
        value: T,
    ) {
        self.set_component_raw(target, type_id, bytemuck::bytes_of(&value));
    }

    pub fn set_component_raw(
        &mut self,
        target: impl Into<CommandTarget>,
        type_id: ComponentTypeId,
        bytes: &[u8],
    ) {
        self.record_component_op(OP_SET_COMPONENT, target.into(), type_id, bytes);
    }

    pub fn add_marker(&mut self, target: impl Into<CommandTarget>, type_id: ComponentTypeId) {
        self.add_component_raw(target, type_id, &[]);
    }

    pub fn remove_component(
        &mut self,
        target: impl Into<CommandTarget>,
        type_id: ComponentTypeId,
    ) {
        self.bytes.push(OP_REMOVE_COMPONENT);
        self.push_target(target.into());
        self.push_u32(type_id);
        self.after_write();
    }

    pub fn destroy_entity(&mut self, target: impl Into<CommandTarget>) {
        self.bytes.push(OP_DESTROY_ENTITY);
        self.push_target(target.into());
        self.after_write();
    }

    pub fn publish_event<T: Pod>(&mut self, type_id: EventTypeId, value: T) {
        self.bytes.push(OP_PUBLISH_EVENT);
        self.push_u32(type_id);
        let bytes = bytemuck::bytes_of(&value);
        self.push_u32(bytes.len() as u32);
        self.bytes.extend_from_slice(bytes);
        self.after_write();
    }

    /// Records a heap event. The value itself rides in a side list; the
    /// stream stores only its index.
    pub fn publish_managed_event<T: Any + Send + Sync>(&mut self, type_id: EventTypeId, value: T) {
        let index = self.managed.len();
        self.managed.push(Some(Box::new(value)));
        self.bytes.push(OP_PUBLISH_MANAGED_EVENT);
        self.push_u32(type_id);
        self.push_u32(index as u32);
        self.after_write();
    }

    /// Clears the recording so the buffer can be reused.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.managed.clear();
        self.created = 0;
    }

    /// Replays the recorded stream into the world, in recording order, then
    /// clears the buffer.
    ///
    /// Must run on the thread that owns `world`; stale-handle operations
    /// are dropped with a warning, everything else either applies or is a
    /// fatal invariant for this frame.
    pub fn playback(&mut self, world: &mut World) -> Result<(), PlaybackError> {
        if std::thread::current().id() != world.owner_thread() {
            return Err(PlaybackError::WrongThread);
        }

        let mut spawned: Vec<Entity> = Vec::with_capacity(self.created as usize);
        let mut cursor = Cursor {
            bytes: &self.bytes,
            offset: 0,
        };

        while !cursor.done() {
            let at = cursor.offset;
            let opcode = cursor.u8()?;
            match opcode {
                OP_CREATE_ENTITY => {
                    let slot = cursor.u32()?;
                    debug_assert_eq!(slot as usize, spawned.len());
                    spawned.push(world.create_entity());
                }
                OP_ADD_COMPONENT | OP_SET_COMPONENT => {
                    let target = cursor.target()?;
                    let type_id = cursor.u32()?;
                    let len = cursor.u32()? as usize;
                    let bytes = cursor.bytes(len)?;
                    let Some(entity) = resolve(&spawned, target)? else {
                        drop_op("component write", at);
                        continue;
                    };
                    let result = if opcode == OP_ADD_COMPONENT {
                        world.add_component_raw(entity, type_id, bytes)
                    } else {
                        world.set_component_raw(entity, type_id, bytes)
                    };
                    absorb(result, at)?;
                }
                OP_REMOVE_COMPONENT => {
                    let target = cursor.target()?;
                    let type_id = cursor.u32()?;
                    let Some(entity) = resolve(&spawned, target)? else {
                        drop_op("component removal", at);
                        continue;
                    };
                    absorb(world.remove_component(entity, type_id), at)?;
                }
                OP_DESTROY_ENTITY => {
                    let target = cursor.target()?;
                    let Some(entity) = resolve(&spawned, target)? else {
                        drop_op("destroy", at);
                        continue;
                    };
                    absorb(world.destroy_entity(entity), at)?;
                }
                OP_PUBLISH_EVENT => {
                    let type_id = cursor.u32()?;
                    let len = cursor.u32()? as usize;
                    let bytes = cursor.bytes(len)?;
                    world.bus_mut().publish_raw(type_id, len, bytes);
                }
                OP_PUBLISH_MANAGED_EVENT => {
                    let type_id = cursor.u32()?;
                    let index = cursor.u32()? as usize;
                    let value = self
                        .managed
                        .get_mut(index)
                        .and_then(|slot| slot.take())
                        .ok_or(PlaybackError::MissingManagedPayload { index })?;
                    world
                        .bus_mut()
                        .publish_managed_boxed(type_id, value)
                        .map_err(map_world_error)?;
                }
                other => {
                    return Err(PlaybackError::UnknownOpcode {
                        opcode: other,
                        offset: at,
                    })
                }
            }
        }

        self.clear();
        Ok(())
    }

    fn record_component_op(
        &mut self,
        opcode: u8,
        target: CommandTarget,
        type_id: ComponentTypeId,
        bytes: &[u8],
    ) {
        self.bytes.push(opcode);
        self.push_target(target);
        self.push_u32(type_id);
        self.push_u32(bytes.len() as u32);
        self.bytes.extend_from_slice(bytes);
        self.after_write();
    }

    fn push_target(&mut self, target: CommandTarget) {
        match target {
            CommandTarget::Live(entity) => {
                self.bytes.push(TARGET_LIVE);
                self.push_u64(entity.to_bits());
            }
            CommandTarget::Created(slot) => {
                self.bytes.push(TARGET_CREATED);
                self.push_u64(slot as u64);
            }
        }
    }

    fn push_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn push_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    fn after_write(&mut self) {
        if !self.growth_logged && self.bytes.len() > self.initial_bytes {
            warn!(
                "command buffer grew past its initial {} bytes; consider a larger pre-size",
                self.initial_bytes
            );
            self.growth_logged = true;
        }
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(spawned: &[Entity], target: CommandTarget) -> Result<Option<Entity>, PlaybackError> {
    match target {
        CommandTarget::Live(entity) => Ok(Some(entity)),
        CommandTarget::Created(slot) => spawned
            .get(slot as usize)
            .copied()
            .map(Some)
            .ok_or(PlaybackError::UnknownCreatedSlot { slot }),
    }
}

/// Logs that a recorded operation targeting an unresolved handle was
/// dropped instead of applied.
fn drop_op(kind: &str, offset: usize) {
    warn!(
        "dropping {} at offset {} aimed at an unresolved handle",
        kind, offset
    );
}

/// Stale handles are dropped work units; uninitialised type slots and
/// everything else are fatal for the frame.
fn absorb(result: Result<(), WorldError>, offset: usize) -> Result<(), PlaybackError> {
    match result {
        Ok(()) => Ok(()),
        Err(WorldError::StaleEntity { entity }) => {
            warn!(
                "dropping command at offset {} aimed at stale entity {:?}",
                offset, entity
            );
            Ok(())
        }
        Err(other) => Err(map_world_error(other)),
    }
}

fn map_world_error(error: WorldError) -> PlaybackError {
    match error {
        WorldError::TypeNotRegistered { type_id } => PlaybackError::UninitialisedTypeId { type_id },
        other => PlaybackError::World(other),
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn done(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn u8(&mut self) -> Result<u8, PlaybackError> {
        let value = *self
            .bytes
            .get(self.offset)
            .ok_or(PlaybackError::Truncated {
                offset: self.offset,
            })?;
        self.offset += 1;
        Ok(value)
    }

    fn u32(&mut self) -> Result<u32, PlaybackError> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4 bytes")))
    }

    fn u64(&mut self) -> Result<u64, PlaybackError> {
        let bytes = self.bytes(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], PlaybackError> {
        let end = self.offset + len;
        if end > self.bytes.len() {
            return Err(PlaybackError::Truncated {
                offset: self.offset,
            });
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn target(&mut self) -> Result<CommandTarget, PlaybackError> {
        let tag = self.u8()?;
        let bits = self.u64()?;
        match tag {
            TARGET_LIVE => Ok(CommandTarget::Live(Entity::from_bits(bits))),
            TARGET_CREATED => Ok(CommandTarget::Created(bits as u32)),
            other => Err(PlaybackError::UnknownOpcode {
                opcode: other,
                offset: self.offset - 9,
            }),
        }
    }
}

#[cfg(test)]
mod command_tests {
    use super::*;
    use tern_shared::LifecycleState;

    const POSITION: ComponentTypeId = 1;
    const HEALTH: ComponentTypeId = 2;
    const HIT: EventTypeId = 10;
    const CHAT: EventTypeId = 11;

    #[derive(Clone, Debug, PartialEq)]
    struct Chat {
        text: String,
    }

    fn world() -> World {
        let mut world = World::new();
        world.register::<[f32; 3]>(POSITION).unwrap();
        world.register::<u32>(HEALTH).unwrap();
        world.bus_mut().register_managed::<Chat>(CHAT);
        world
    }

    #[test]
    fn playback_matches_direct_mutation() {
        let mut direct = world();
        let entity_direct = direct.create_entity();
        direct
            .add_component(entity_direct, POSITION, [1.0f32, 2.0, 3.0])
            .unwrap();
        direct.add_component(entity_direct, HEALTH, 80u32).unwrap();
        direct.remove_component(entity_direct, HEALTH).unwrap();

        let mut replayed = world();
        let mut buffer = CommandBuffer::new();
        let created = buffer.create_entity();
        buffer.add_component(created, POSITION, [1.0f32, 2.0, 3.0]);
        buffer.add_component(created, HEALTH, 80u32);
        buffer.remove_component(created, HEALTH);
        buffer.playback(&mut replayed).unwrap();

        let entity = replayed.query().include_all().iter().next().unwrap();
        assert_eq!(
            replayed.get_component::<[f32; 3]>(entity, POSITION),
            direct.get_component::<[f32; 3]>(entity_direct, POSITION)
        );
        assert!(!replayed.has_component(entity, HEALTH));
    }

    #[test]
    fn cleared_buffer_replays_as_noop() {
        let mut world = world();
        let mut buffer = CommandBuffer::new();
        let created = buffer.create_entity();
        buffer.add_component(created, HEALTH, 5u32);
        buffer.playback(&mut world).unwrap();
        assert_eq!(world.entity_count(), 1);

        // The buffer cleared itself; a second playback does nothing.
        buffer.playback(&mut world).unwrap();
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn stale_targets_are_dropped_not_fatal() {
        let mut world = world();
        let victim = world.create_entity();
        world.destroy_entity(victim).unwrap();

        let mut buffer = CommandBuffer::new();
        buffer.add_component(victim, HEALTH, 1u32);
        buffer.destroy_entity(victim);
        assert!(buffer.playback(&mut world).is_ok());
    }

    #[test]
    fn unregistered_type_is_fatal() {
        let mut world = world();
        let entity = world.create_entity();
        let mut buffer = CommandBuffer::new();
        buffer.add_component(entity, 99, 1u32);
        assert_eq!(
            buffer.playback(&mut world),
            Err(PlaybackError::UninitialisedTypeId { type_id: 99 })
        );
    }

    #[test]
    fn events_publish_through_playback() {
        let mut world = world();
        let mut buffer = CommandBuffer::new();
        buffer.publish_event::<u64>(HIT, 77);
        buffer.publish_managed_event(
            CHAT,
            Chat {
                text: "contact".to_string(),
            },
        );
        buffer.playback(&mut world).unwrap();
        assert_eq!(world.bus().read::<u64>(HIT), &[77]);
        assert_eq!(world.bus().read_managed::<Chat>(CHAT)[0].text, "contact");
    }

    #[test]
    fn created_entities_start_uninitialised() {
        let mut world = world();
        let mut buffer = CommandBuffer::new();
        buffer.create_entity();
        buffer.playback(&mut world).unwrap();
        let entity = world.query().include_all().iter().next().unwrap();
        assert_eq!(world.lifecycle(entity), Ok(LifecycleState::Uninitialised));
    }
}
