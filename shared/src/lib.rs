//! # Tern Shared
//! Primitives and wire surface shared between the tern host runtime and the
//! tern networking layer.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod bitmask;
mod entity;
mod keys;
mod messages;
mod sequence;
mod time;
mod types;

pub use bitmask::{ComponentMask, EventTypeMask, MaskBitsIter, MASK_BITS};
pub use entity::Entity;
pub use keys::{pack_key, try_pack_key, unpack_key, KeyError, PackedKey};
pub use messages::{
    descriptors::{
        EntityLifecycleStatus, EntityMaster, EntityState, MasterFlags, OwnershipUpdate,
        WeaponState,
    },
    sample::{DataSample, InstanceState, Payload},
    time_sync::{FrameAck, FrameOrder, SwitchTimeMode, TimePulse},
    transport::{
        memory_channel, DataReader, DataWriter, MemoryReader, MemoryWriter, TransportError,
    },
};
pub use sequence::{sequence_greater_than, sequence_less_than, wrapping_diff, SequenceNumber};
pub use time::{GlobalTime, TimeMode};
pub use types::{
    ComponentTypeId, DisType, EventTypeId, FrameIndex, InstanceId, LifecycleState,
    NetworkEntityId, NodeId,
};
