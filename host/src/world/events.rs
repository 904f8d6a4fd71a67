use std::any::Any;
use std::collections::HashMap;

use bytemuck::Pod;

use tern_shared::EventTypeId;

use crate::world::bytes::AlignedBytes;
use crate::world::error::WorldError;

type AnyBox = Box<dyn Any + Send + Sync>;

/// Frame-scoped event storage attached to a world.
///
/// Native events are raw bytes plus an element size; managed events are
/// typed vectors behind a per-type vtable so replicas and the accumulator
/// can clone and append them without knowing the concrete type.
pub struct EventBus {
    native: HashMap<EventTypeId, NativeEventBuffer>,
    managed: HashMap<EventTypeId, ManagedEventBuffer>,
}

pub(crate) struct NativeEventBuffer {
    pub elem_size: usize,
    pub bytes: AlignedBytes,
}

pub(crate) struct ManagedEventBuffer {
    pub items: AnyBox,
    pub vtable: ManagedEventVTable,
}

/// Monomorphised hooks for operating on a type-erased `Vec<T>` of events.
#[derive(Clone, Copy)]
pub(crate) struct ManagedEventVTable {
    pub new_empty: fn() -> AnyBox,
    pub clone_all: fn(&(dyn Any + Send + Sync)) -> AnyBox,
    pub append: fn(&mut (dyn Any + Send + Sync), &(dyn Any + Send + Sync)),
    pub push_boxed: fn(&mut (dyn Any + Send + Sync), AnyBox),
    pub clear: fn(&mut (dyn Any + Send + Sync)),
    pub len: fn(&(dyn Any + Send + Sync)) -> usize,
}

impl ManagedEventVTable {
    fn of<T: Clone + Send + Sync + 'static>() -> Self {
        Self {
            new_empty: || Box::new(Vec::<T>::new()),
            clone_all: |items| {
                let items = items.downcast_ref::<Vec<T>>().expect("event type confusion");
                Box::new(items.clone())
            },
            append: |dst, src| {
                let src = src.downcast_ref::<Vec<T>>().expect("event type confusion");
                let dst = dst.downcast_mut::<Vec<T>>().expect("event type confusion");
                dst.extend_from_slice(src);
            },
            push_boxed: |dst, item| {
                let item = item
                    .downcast::<T>()
                    .unwrap_or_else(|_| panic!("event type confusion"));
                let dst = dst.downcast_mut::<Vec<T>>().expect("event type confusion");
                dst.push(*item);
            },
            clear: |items| {
                let items = items.downcast_mut::<Vec<T>>().expect("event type confusion");
                items.clear();
            },
            len: |items| {
                items
                    .downcast_ref::<Vec<T>>()
                    .expect("event type confusion")
                    .len()
            },
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            native: HashMap::new(),
            managed: HashMap::new(),
        }
    }

    /// Registers a managed event type so it can be published through the
    /// deferred command path. Idempotent.
    pub fn register_managed<T: Clone + Send + Sync + 'static>(&mut self, type_id: EventTypeId) {
        self.managed.entry(type_id).or_insert_with(|| {
            let vtable = ManagedEventVTable::of::<T>();
            ManagedEventBuffer {
                items: (vtable.new_empty)(),
                vtable,
            }
        });
    }

    pub fn publish<T: Pod>(&mut self, type_id: EventTypeId, event: T) {
        self.publish_raw(type_id, std::mem::size_of::<T>(), bytemuck::bytes_of(&event));
    }

    pub fn publish_raw(&mut self, type_id: EventTypeId, elem_size: usize, bytes: &[u8]) {
        let buffer = self
            .native
            .entry(type_id)
            .or_insert_with(|| NativeEventBuffer {
                elem_size,
                bytes: AlignedBytes::new(),
            });
        debug_assert_eq!(buffer.elem_size, elem_size, "event type {} size drift", type_id);
        buffer.bytes.extend_from_slice(bytes);
    }

    pub fn read<T: Pod>(&self, type_id: EventTypeId) -> &[T] {
        match self.native.get(&type_id) {
            Some(buffer) => bytemuck::cast_slice(buffer.bytes.as_slice()),
            None => &[],
        }
    }

    pub fn publish_managed<T: Clone + Send + Sync + 'static>(
        &mut self,
        type_id: EventTypeId,
        event: T,
    ) {
        self.register_managed::<T>(type_id);
        let buffer = self.managed.get_mut(&type_id).expect("just registered");
        (buffer.vtable.push_boxed)(buffer.items.as_mut(), Box::new(event));
    }

    /// Publishes a type-erased managed event. Requires the event type to be
    /// registered up front; the deferred command path has no `T` to create
    /// the buffer with.
    pub fn publish_managed_boxed(
        &mut self,
        type_id: EventTypeId,
        event: AnyBox,
    ) -> Result<(), WorldError> {
        let buffer = self
            .managed
            .get_mut(&type_id)
            .ok_or(WorldError::TypeNotRegistered { type_id })?;
        (buffer.vtable.push_boxed)(buffer.items.as_mut(), event);
        Ok(())
    }

    pub fn read_managed<T: 'static>(&self, type_id: EventTypeId) -> &[T] {
        match self.managed.get(&type_id) {
            Some(buffer) => buffer
                .items
                .downcast_ref::<Vec<T>>()
                .map(|items| items.as_slice())
                .unwrap_or(&[]),
            None => &[],
        }
    }

    /// Clears every buffer, retaining allocations.
    pub fn clear(&mut self) {
        for buffer in self.native.values_mut() {
            buffer.bytes.clear();
        }
        for buffer in self.managed.values_mut() {
            (buffer.vtable.clear)(buffer.items.as_mut());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.native.values().all(|buffer| buffer.bytes.is_empty())
            && self
                .managed
                .values()
                .all(|buffer| (buffer.vtable.len)(buffer.items.as_ref()) == 0)
    }

    pub(crate) fn iter_native(&self) -> impl Iterator<Item = (EventTypeId, &NativeEventBuffer)> {
        self.native.iter().map(|(id, buffer)| (*id, buffer))
    }

    pub(crate) fn iter_managed(&self) -> impl Iterator<Item = (EventTypeId, &ManagedEventBuffer)> {
        self.managed.iter().map(|(id, buffer)| (*id, buffer))
    }

    /// Append-only merge of captured managed events into this bus.
    pub(crate) fn append_managed_cloned(
        &mut self,
        type_id: EventTypeId,
        items: &(dyn Any + Send + Sync),
        vtable: ManagedEventVTable,
    ) {
        let buffer = self
            .managed
            .entry(type_id)
            .or_insert_with(|| ManagedEventBuffer {
                items: (vtable.new_empty)(),
                vtable,
            });
        (vtable.append)(buffer.items.as_mut(), items);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod event_bus_tests {
    use super::EventBus;

    #[derive(Clone, Debug, PartialEq)]
    struct Named {
        label: String,
    }

    #[test]
    fn native_publish_and_read() {
        let mut bus = EventBus::new();
        bus.publish::<u64>(1, 10);
        bus.publish::<u64>(1, 20);
        assert_eq!(bus.read::<u64>(1), &[10, 20]);
        assert_eq!(bus.read::<u64>(2), &[] as &[u64]);
    }

    #[test]
    fn managed_publish_and_read() {
        let mut bus = EventBus::new();
        bus.publish_managed(
            3,
            Named {
                label: "a".to_string(),
            },
        );
        let events = bus.read_managed::<Named>(3);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label, "a");
    }

    #[test]
    fn clear_retains_registration() {
        let mut bus = EventBus::new();
        bus.publish::<u32>(1, 5);
        bus.publish_managed(2, Named { label: "x".into() });
        bus.clear();
        assert!(bus.is_empty());
        assert!(bus
            .publish_managed_boxed(2, Box::new(Named { label: "y".into() }))
            .is_ok());
        assert_eq!(bus.read_managed::<Named>(2).len(), 1);
    }

    #[test]
    fn boxed_publish_without_registration_fails() {
        let mut bus = EventBus::new();
        assert!(bus
            .publish_managed_boxed(9, Box::new(Named { label: "z".into() }))
            .is_err());
    }
}
