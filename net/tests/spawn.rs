mod common;

use common::{master_sample, Node};

use tern_net::{
    NetworkIdentity, NetworkOwnership, NETWORK_IDENTITY, NETWORK_OWNERSHIP, NETWORK_SPAWN_REQUEST,
};
use tern_shared::{memory_channel, DataReader, DataWriter, LifecycleState, Payload};

#[test]
fn single_node_spawn() {
    let (mut inject, reader) = memory_channel();
    let (writer, _outbox) = memory_channel();
    let mut node = Node::new(1, vec![1], Box::new(reader), Box::new(writer));

    inject.write(master_sample(1000, 1, false)).unwrap();
    node.run_frame();

    let entity = node.entity(1000).expect("entity materialised");
    assert_eq!(
        node.world
            .get_component::<NetworkIdentity>(entity, NETWORK_IDENTITY),
        Some(&NetworkIdentity { value: 1000 })
    );
    assert_eq!(
        node.world
            .get_component::<NetworkOwnership>(entity, NETWORK_OWNERSHIP),
        Some(&NetworkOwnership {
            local_node_id: 1,
            primary_owner_id: 1,
        })
    );
    assert_eq!(
        node.world.lifecycle(entity),
        Ok(LifecycleState::Constructing)
    );
    assert!(!node.world.has_component(entity, NETWORK_SPAWN_REQUEST));

    // Construction completes on the next frame.
    node.run_frame();
    assert_eq!(node.world.lifecycle(entity), Ok(LifecycleState::Active));
}

#[test]
fn duplicate_masters_create_exactly_one_entity() {
    let (mut inject, reader) = memory_channel();
    let (writer, _outbox) = memory_channel();
    let mut node = Node::new(1, vec![1], Box::new(reader), Box::new(writer));

    for _ in 0..5 {
        inject.write(master_sample(42, 1, false)).unwrap();
    }
    for _ in 0..3 {
        node.run_frame();
    }

    assert_eq!(node.world.entity_count(), 1);
    assert!(node.entity(42).is_some());
}

#[test]
fn locally_owned_entity_round_trips_its_network_id() {
    let (mut inject, reader) = memory_channel();
    let (writer, mut outbox) = memory_channel();
    let mut node = Node::new(1, vec![1], Box::new(reader), Box::new(writer));

    inject.write(master_sample(1000, 1, false)).unwrap();
    for _ in 0..3 {
        node.run_frame();
    }

    let published: Vec<i64> = outbox
        .take_samples()
        .into_iter()
        .filter_map(|sample| match sample.payload {
            Payload::Master(master) => Some(master.network_id),
            _ => None,
        })
        .collect();
    assert_eq!(published, vec![1000]);
}
