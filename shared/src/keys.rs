use thiserror::Error;

use crate::types::{ComponentTypeId, InstanceId};

/// Composite key addressing one descriptor instance on one entity:
/// `(type_id:32 | instance_id:32)`.
pub type PackedKey = u64;

/// Errors that can occur while packing descriptor keys
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Descriptor type ids are restricted to 31 bits so the packed key
    /// survives a round trip through signed interop layers.
    #[error("descriptor type id {type_id} exceeds the 31-bit packing range")]
    TypeIdOutOfRange { type_id: ComponentTypeId },
}

/// Packs a descriptor type id and an instance id into a single map key.
///
/// # Panics
///
/// Panics if `type_id` exceeds the 31-bit range. Use [`try_pack_key`] for a
/// non-panicking variant.
pub fn pack_key(type_id: ComponentTypeId, instance_id: InstanceId) -> PackedKey {
    try_pack_key(type_id, instance_id).expect("descriptor type id out of packing range")
}

pub fn try_pack_key(
    type_id: ComponentTypeId,
    instance_id: InstanceId,
) -> Result<PackedKey, KeyError> {
    if type_id > i32::MAX as u32 {
        return Err(KeyError::TypeIdOutOfRange { type_id });
    }
    Ok(((type_id as u64) << 32) | (instance_id as u64))
}

pub fn unpack_key(key: PackedKey) -> (ComponentTypeId, InstanceId) {
    ((key >> 32) as u32, key as u32)
}

#[cfg(test)]
mod key_tests {
    use super::{pack_key, try_pack_key, unpack_key, KeyError};

    use proptest::prelude::*;

    #[test]
    fn simple_round_trip() {
        let key = pack_key(7, 3);
        assert_eq!(unpack_key(key), (7, 3));
    }

    #[test]
    fn zero_instance_differs_from_instance_one() {
        assert_ne!(pack_key(7, 0), pack_key(7, 1));
    }

    #[test]
    fn type_id_out_of_range_is_rejected() {
        assert_eq!(
            try_pack_key(u32::MAX, 0),
            Err(KeyError::TypeIdOutOfRange { type_id: u32::MAX })
        );
    }

    proptest! {
        #[test]
        fn round_trip_holds_for_full_range(type_id in 0u32..=i32::MAX as u32, instance_id: u32) {
            let key = pack_key(type_id, instance_id);
            prop_assert_eq!(unpack_key(key), (type_id, instance_id));
        }
    }
}
