use std::thread::{self, ThreadId};

use bytemuck::Pod;
use crossbeam::utils::CachePadded;

use tern_shared::{ComponentMask, ComponentTypeId, Entity, LifecycleState};

mod bytes;
mod column;
mod error;
mod events;
mod query;

pub use column::CHUNK_ENTITIES;
pub use error::{LifecycleError, WorldError};
pub use events::EventBus;
pub use query::{Query, QueryIter};

pub(crate) use bytes::AlignedBytes;
pub(crate) use column::{chunk_of, chunks_for, ColumnSlot, ManagedColumn, PodColumn};
pub(crate) use events::{ManagedEventBuffer, ManagedEventVTable, NativeEventBuffer};

/// Width of the per-type-id lookup table; component type ids must fit the
/// component bitmask.
pub const MAX_COMPONENT_TYPES: usize = 256;

type AnyBox = Box<dyn std::any::Any + Send + Sync>;

#[derive(Clone)]
pub(crate) struct EntityHeader {
    pub generation: i32,
    pub mask: ComponentMask,
    pub state: LifecycleState,
    pub version: u64,
    pub alive: bool,
}

impl Default for EntityHeader {
    fn default() -> Self {
        Self {
            generation: 0,
            mask: ComponentMask::new(),
            state: LifecycleState::Uninitialised,
            version: 0,
            alive: false,
        }
    }
}

/// Column-store world: entity headers plus one chunked column per
/// registered component type, addressed through a direct per-type-id table.
///
/// The live world has exactly one writer (the thread that created it);
/// replicas produced by the snapshot providers are plain `World`s that are
/// only ever written by the main thread's sync pass.
pub struct World {
    headers: Vec<EntityHeader>,
    header_versions: Vec<CachePadded<u64>>,
    free_list: Vec<i32>,
    columns: Vec<Option<ColumnSlot>>,
    transient: ComponentMask,
    bus: EventBus,
    write_counter: u64,
    owner_thread: ThreadId,
}

impl World {
    pub fn new() -> Self {
        Self {
            headers: Vec::new(),
            header_versions: Vec::new(),
            free_list: Vec::new(),
            columns: (0..MAX_COMPONENT_TYPES).map(|_| None).collect(),
            transient: ComponentMask::new(),
            bus: EventBus::new(),
            write_counter: 0,
            owner_thread: thread::current().id(),
        }
    }

    // --- registration -----------------------------------------------------

    pub fn register<T: Pod>(&mut self, type_id: ComponentTypeId) -> Result<(), WorldError> {
        self.register_raw(type_id, std::mem::size_of::<T>())
    }

    /// Registers a plain-old-data column by element size. An element size of
    /// zero makes a marker component: presence is tracked in the mask only.
    pub fn register_raw(
        &mut self,
        type_id: ComponentTypeId,
        elem_size: usize,
    ) -> Result<(), WorldError> {
        self.insert_slot(type_id, ColumnSlot::Pod(PodColumn::new(elem_size)))
    }

    pub fn register_managed<T: Clone + Send + Sync + 'static>(
        &mut self,
        type_id: ComponentTypeId,
    ) -> Result<(), WorldError> {
        self.insert_slot(type_id, ColumnSlot::Managed(ManagedColumn::new::<T>()))
    }

    /// Auto-registration hook used by snapshot sync when the source world
    /// carries a column this world has never seen.
    pub(crate) fn register_like(
        &mut self,
        type_id: ComponentTypeId,
        template: &ColumnSlot,
    ) -> Result<(), WorldError> {
        self.insert_slot(type_id, template.new_like())
    }

    fn insert_slot(
        &mut self,
        type_id: ComponentTypeId,
        mut slot: ColumnSlot,
    ) -> Result<(), WorldError> {
        let index = type_id as usize;
        if index >= MAX_COMPONENT_TYPES {
            return Err(WorldError::TypeIdOutOfRange {
                type_id,
                max: MAX_COMPONENT_TYPES,
            });
        }
        if self.columns[index].is_some() {
            return Err(WorldError::TypeAlreadyRegistered { type_id });
        }
        slot.ensure_capacity(self.headers.len());
        self.columns[index] = Some(slot);
        Ok(())
    }

    pub fn is_registered(&self, type_id: ComponentTypeId) -> bool {
        self.columns
            .get(type_id as usize)
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Marks a component type as transient: excluded from filtered
    /// snapshots unless the module opts in.
    pub fn mark_transient(&mut self, type_id: ComponentTypeId) {
        self.transient.set(type_id);
    }

    pub fn transient_mask(&self) -> &ComponentMask {
        &self.transient
    }

    // --- entity lifecycle -------------------------------------------------

    pub fn create_entity(&mut self) -> Entity {
        let version = self.next_version();
        let index = match self.free_list.pop() {
            Some(index) => index as usize,
            None => {
                let index = self.headers.len();
                self.headers.push(EntityHeader::default());
                self.grow_to_capacity();
                index
            }
        };
        let header = &mut self.headers[index];
        header.alive = true;
        header.state = LifecycleState::Uninitialised;
        header.mask = ComponentMask::new();
        self.bump_entity(index, version);
        Entity::new(index as i32, self.headers[index].generation)
    }

    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        let index = self.check(entity)?;
        let version = self.next_version();
        let mask = self.headers[index].mask;
        for type_id in mask.ones() {
            if let Some(slot) = self.slot_mut(type_id) {
                slot.remove(index, version);
            }
        }
        let header = &mut self.headers[index];
        header.mask = ComponentMask::new();
        header.alive = false;
        header.state = LifecycleState::Destroyed;
        header.generation = header.generation.wrapping_add(1);
        self.bump_entity(index, version);
        self.free_list.push(index as i32);
        Ok(())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.check(entity).is_ok()
    }

    pub fn entity_count(&self) -> usize {
        self.headers.iter().filter(|header| header.alive).count()
    }

    pub fn lifecycle(&self, entity: Entity) -> Result<LifecycleState, WorldError> {
        let index = self.check(entity)?;
        Ok(self.headers[index].state)
    }

    /// Moves an entity along the lifecycle lattice. Transitions may only
    /// increase the lattice rank.
    pub fn set_lifecycle(
        &mut self,
        entity: Entity,
        to: LifecycleState,
    ) -> Result<(), LifecycleError> {
        let index = self
            .check(entity)
            .map_err(|_| LifecycleError::Stale { entity })?;
        let from = self.headers[index].state;
        if from == to {
            return Ok(());
        }
        if !from.may_transition_to(to) {
            return Err(LifecycleError::Regression { entity, from, to });
        }
        let version = self.next_version();
        self.headers[index].state = to;
        self.bump_entity(index, version);
        Ok(())
    }

    // --- components -------------------------------------------------------

    pub fn add_component<T: Pod>(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        value: T,
    ) -> Result<(), WorldError> {
        self.add_component_raw(entity, type_id, bytemuck::bytes_of(&value))
    }

    /// Inserts or overwrites a plain-old-data component from raw bytes.
    pub fn add_component_raw(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        bytes: &[u8],
    ) -> Result<(), WorldError> {
        let index = self.check(entity)?;
        let version = self.next_version();
        let mut is_marker = false;
        let slot = self
            .slot_mut(type_id)
            .ok_or(WorldError::TypeNotRegistered { type_id })?;
        match slot {
            ColumnSlot::Pod(column) => {
                if column.elem_size() != bytes.len() {
                    return Err(WorldError::SizeMismatch {
                        type_id,
                        column: column.elem_size(),
                        value: bytes.len(),
                    });
                }
                is_marker = column.elem_size() == 0;
                column.write(index, bytes, version);
            }
            ColumnSlot::Managed(_) => {
                return Err(WorldError::ManagedTypeMismatch { type_id });
            }
        }
        self.headers[index].mask.set(type_id);
        // Marker flips are visible to sync but are not state changes as far
        // as per-entity change detection is concerned.
        if is_marker {
            self.bump_chunk_only(index, version);
        } else {
            self.bump_entity(index, version);
        }
        Ok(())
    }

    /// Overwrites an existing component; errors if the entity does not
    /// already carry it.
    pub fn set_component<T: Pod>(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        value: T,
    ) -> Result<(), WorldError> {
        self.set_component_raw(entity, type_id, bytemuck::bytes_of(&value))
    }

    pub fn set_component_raw(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        bytes: &[u8],
    ) -> Result<(), WorldError> {
        let index = self.check(entity)?;
        if !self.headers[index].mask.test(type_id) {
            return Err(WorldError::ComponentMissing { entity, type_id });
        }
        self.add_component_raw(entity, type_id, bytes)
    }

    /// Adds a marker component (a zero-sized column).
    pub fn add_marker(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Result<(), WorldError> {
        self.add_component_raw(entity, type_id, &[])
    }

    /// Removes a component. Removing an absent component is a no-op so
    /// duplicate wire deliveries stay idempotent.
    pub fn remove_component(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Result<(), WorldError> {
        let index = self.check(entity)?;
        if !self.headers[index].mask.test(type_id) {
            return Ok(());
        }
        let version = self.next_version();
        let mut is_marker = false;
        if let Some(slot) = self.slot_mut(type_id) {
            if let ColumnSlot::Pod(column) = &*slot {
                is_marker = column.elem_size() == 0;
            }
            slot.remove(index, version);
        }
        self.headers[index].mask.clear(type_id);
        if is_marker {
            self.bump_chunk_only(index, version);
        } else {
            self.bump_entity(index, version);
        }
        Ok(())
    }

    pub fn has_component(&self, entity: Entity, type_id: ComponentTypeId) -> bool {
        match self.check(entity) {
            Ok(index) => self.headers[index].mask.test(type_id),
            Err(_) => false,
        }
    }

    pub fn get_component<T: Pod>(&self, entity: Entity, type_id: ComponentTypeId) -> Option<&T> {
        let index = self.check(entity).ok()?;
        if !self.headers[index].mask.test(type_id) {
            return None;
        }
        match self.slot(type_id)? {
            ColumnSlot::Pod(column) if column.elem_size() == std::mem::size_of::<T>() => {
                Some(bytemuck::from_bytes(column.read(index)))
            }
            _ => None,
        }
    }

    pub fn get_component_mut<T: Pod>(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Option<&mut T> {
        let index = self.check(entity).ok()?;
        if !self.headers[index].mask.test(type_id) {
            return None;
        }
        let version = self.next_version();
        self.headers[index].version = version;
        let chunk = chunk_of(index);
        *self.header_versions[chunk] = version;
        match self.slot_mut(type_id)? {
            ColumnSlot::Pod(column) if column.elem_size() == std::mem::size_of::<T>() => {
                column.touch(index, version);
                Some(bytemuck::from_bytes_mut(column.read_mut(index)))
            }
            _ => None,
        }
    }

    pub fn add_managed<T: Clone + Send + Sync + 'static>(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        value: T,
    ) -> Result<(), WorldError> {
        self.set_managed_boxed(entity, type_id, Box::new(value))
    }

    pub fn set_managed_boxed(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        value: AnyBox,
    ) -> Result<(), WorldError> {
        let index = self.check(entity)?;
        let version = self.next_version();
        match self.slot_mut(type_id) {
            Some(ColumnSlot::Managed(column)) => {
                column.ensure_capacity(index + 1);
                column.set(index, value, version);
            }
            Some(ColumnSlot::Pod(_)) => {
                return Err(WorldError::ManagedTypeMismatch { type_id });
            }
            None => return Err(WorldError::TypeNotRegistered { type_id }),
        }
        self.headers[index].mask.set(type_id);
        self.bump_entity(index, version);
        Ok(())
    }

    pub fn get_managed<T: 'static>(&self, entity: Entity, type_id: ComponentTypeId) -> Option<&T> {
        let index = self.check(entity).ok()?;
        if !self.headers[index].mask.test(type_id) {
            return None;
        }
        match self.slot(type_id)? {
            ColumnSlot::Managed(column) => column.get(index)?.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn get_managed_mut<T: 'static>(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
    ) -> Option<&mut T> {
        let index = self.check(entity).ok()?;
        if !self.headers[index].mask.test(type_id) {
            return None;
        }
        let version = self.next_version();
        self.headers[index].version = version;
        let chunk = chunk_of(index);
        *self.header_versions[chunk] = version;
        match self.slot_mut(type_id)? {
            ColumnSlot::Managed(column) => column.get_mut(index, version)?.downcast_mut::<T>(),
            _ => None,
        }
    }

    pub fn component_mask(&self, entity: Entity) -> Option<ComponentMask> {
        let index = self.check(entity).ok()?;
        Some(self.headers[index].mask)
    }

    /// Per-entity write version; egress translators use this for change
    /// detection.
    pub fn entity_version(&self, entity: Entity) -> Option<u64> {
        let index = self.check(entity).ok()?;
        Some(self.headers[index].version)
    }

    // --- queries and events -----------------------------------------------

    pub fn query(&self) -> Query {
        Query::new(self)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    // --- internals --------------------------------------------------------

    pub(crate) fn capacity(&self) -> usize {
        self.headers.len()
    }

    pub(crate) fn header_at(&self, index: usize) -> Option<&EntityHeader> {
        self.headers.get(index)
    }

    pub(crate) fn header_chunk_count(&self) -> usize {
        chunks_for(self.headers.len())
    }

    pub(crate) fn header_chunk_version(&self, chunk: usize) -> u64 {
        self.header_versions.get(chunk).map(|v| **v).unwrap_or(0)
    }

    pub(crate) fn copy_header_chunk_from(&mut self, src: &World, chunk: usize) {
        let start = chunk * CHUNK_ENTITIES;
        let end = ((chunk + 1) * CHUNK_ENTITIES).min(src.headers.len());
        for index in start..end {
            self.headers[index] = src.headers[index].clone();
        }
        *self.header_versions[chunk] = src.header_chunk_version(chunk);
    }

    pub(crate) fn ensure_entity_capacity(&mut self, entities: usize) {
        if self.headers.len() < entities {
            self.headers.resize_with(entities, EntityHeader::default);
        }
        self.grow_to_capacity();
    }

    pub(crate) fn slot(&self, type_id: ComponentTypeId) -> Option<&ColumnSlot> {
        self.columns.get(type_id as usize)?.as_ref()
    }

    pub(crate) fn slot_mut(&mut self, type_id: ComponentTypeId) -> Option<&mut ColumnSlot> {
        self.columns.get_mut(type_id as usize)?.as_mut()
    }

    pub(crate) fn registered_type_ids(&self) -> Vec<ComponentTypeId> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| index as ComponentTypeId)
            .collect()
    }

    pub(crate) fn owner_thread(&self) -> ThreadId {
        self.owner_thread
    }

    fn grow_to_capacity(&mut self) {
        let capacity = self.headers.len();
        let chunks = chunks_for(capacity);
        if self.header_versions.len() < chunks {
            self.header_versions
                .resize_with(chunks, || CachePadded::new(0));
        }
        for slot in self.columns.iter_mut().flatten() {
            slot.ensure_capacity(capacity);
        }
    }

    fn next_version(&mut self) -> u64 {
        self.write_counter += 1;
        self.write_counter
    }

    fn bump_entity(&mut self, index: usize, version: u64) {
        self.headers[index].version = version;
        self.bump_chunk_only(index, version);
    }

    fn bump_chunk_only(&mut self, index: usize, version: u64) {
        let chunk = chunk_of(index);
        *self.header_versions[chunk] = version;
    }

    fn check(&self, entity: Entity) -> Result<usize, WorldError> {
        if entity.index() < 0 {
            return Err(WorldError::StaleEntity { entity });
        }
        let index = entity.index() as usize;
        match self.headers.get(index) {
            Some(header) if header.alive && header.generation == entity.generation() => Ok(index),
            _ => Err(WorldError::StaleEntity { entity }),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
