use crate::messages::descriptors::{
    EntityLifecycleStatus, EntityMaster, EntityState, OwnershipUpdate, WeaponState,
};
use crate::messages::time_sync::{FrameAck, FrameOrder, SwitchTimeMode, TimePulse};
use crate::types::{InstanceId, NetworkEntityId};

/// Liveness of the instance a sample describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceState {
    Alive,
    /// The publisher has disposed the instance; receivers tear down their
    /// local representation.
    Disposed,
}

/// The wire payloads the runtime understands. Serialization of these is the
/// transport's concern; translators only ever see the decoded form.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Master(EntityMaster),
    State(EntityState),
    Lifecycle(EntityLifecycleStatus),
    Ownership(OwnershipUpdate),
    Weapon(WeaponState),
    Pulse(TimePulse),
    Order(FrameOrder),
    Ack(FrameAck),
    SwitchMode(SwitchTimeMode),
}

/// One decoded sample taken from a [`DataReader`](crate::DataReader).
#[derive(Clone, Debug, PartialEq)]
pub struct DataSample {
    pub payload: Payload,
    pub instance_state: InstanceState,
    pub entity_id: NetworkEntityId,
    pub instance_id: InstanceId,
}

impl DataSample {
    /// An alive sample for the entity the payload itself names.
    pub fn alive(payload: Payload) -> Self {
        let entity_id = payload_entity_id(&payload);
        let instance_id = payload_instance_id(&payload);
        Self {
            payload,
            instance_state: InstanceState::Alive,
            entity_id,
            instance_id,
        }
    }

    /// A disposed sample, announcing teardown of the payload's entity.
    pub fn disposed(payload: Payload) -> Self {
        let mut sample = Self::alive(payload);
        sample.instance_state = InstanceState::Disposed;
        sample
    }
}

fn payload_entity_id(payload: &Payload) -> NetworkEntityId {
    match payload {
        Payload::Master(master) => master.network_id,
        Payload::State(state) => state.network_id,
        Payload::Lifecycle(status) => status.network_id,
        Payload::Ownership(update) => update.network_id,
        Payload::Weapon(weapon) => weapon.network_id,
        Payload::Pulse(_) | Payload::Order(_) | Payload::Ack(_) | Payload::SwitchMode(_) => 0,
    }
}

fn payload_instance_id(payload: &Payload) -> InstanceId {
    match payload {
        Payload::Ownership(update) => update.instance_id,
        Payload::Weapon(weapon) => weapon.instance_id,
        _ => 0,
    }
}

#[cfg(test)]
mod sample_tests {
    use super::{DataSample, InstanceState, Payload};
    use crate::messages::descriptors::{EntityMaster, MasterFlags};

    fn master(network_id: i64) -> Payload {
        Payload::Master(EntityMaster {
            network_id,
            dis_type: 1,
            primary_owner_id: 1,
            flags: MasterFlags::default(),
            name: String::new(),
        })
    }

    #[test]
    fn alive_sample_carries_payload_entity_id() {
        let sample = DataSample::alive(master(42));
        assert_eq!(sample.entity_id, 42);
        assert_eq!(sample.instance_state, InstanceState::Alive);
    }

    #[test]
    fn disposed_sample_is_disposed() {
        let sample = DataSample::disposed(master(42));
        assert_eq!(sample.instance_state, InstanceState::Disposed);
    }
}
