mod common;

use common::{master_sample, status_sample, tank_templates, Node};

use tern_net::{
    NetworkStack, ReliableInitConfig, StaticTopology, PENDING_NETWORK_ACK,
};
use tern_shared::{memory_channel, DataReader, DataWriter, LifecycleState, Payload};

fn lifecycle_acks(samples: Vec<tern_shared::DataSample>) -> Vec<(i64, u16)> {
    samples
        .into_iter()
        .filter_map(|sample| match sample.payload {
            Payload::Lifecycle(status) if status.state == LifecycleState::Active => {
                Some((status.network_id, status.node_id))
            }
            _ => None,
        })
        .collect()
}

#[test]
fn barrier_waits_for_every_expected_peer() {
    let (mut inject, reader) = memory_channel();
    let (writer, mut outbox) = memory_channel();
    let mut node = Node::new(1, vec![1, 2, 3], Box::new(reader), Box::new(writer));

    inject.write(master_sample(2000, 1, true)).unwrap();
    node.run_frame();

    let entity = node.entity(2000).expect("entity materialised");
    assert!(node.world.has_component(entity, PENDING_NETWORK_ACK));
    assert_eq!(
        node.world.lifecycle(entity),
        Ok(LifecycleState::Constructing)
    );
    let pending = node.stack.gateway().pending_peers(2000).unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.contains(&2) && pending.contains(&3));

    // First peer reports Active: no local ack yet.
    inject
        .write(status_sample(2000, 2, LifecycleState::Active))
        .unwrap();
    node.run_frame();
    assert!(node.world.has_component(entity, PENDING_NETWORK_ACK));
    assert!(lifecycle_acks(outbox.take_samples()).is_empty());

    // Second peer reports: the barrier clears, the marker goes, and the
    // local ack is announced.
    inject
        .write(status_sample(2000, 3, LifecycleState::Active))
        .unwrap();
    node.run_frame();
    assert!(!node.world.has_component(entity, PENDING_NETWORK_ACK));
    assert_eq!(lifecycle_acks(outbox.take_samples()), vec![(2000, 1)]);

    node.run_frame();
    assert_eq!(node.world.lifecycle(entity), Ok(LifecycleState::Active));
}

#[test]
fn duplicate_peer_acks_are_idempotent() {
    let (mut inject, reader) = memory_channel();
    let (writer, _outbox) = memory_channel();
    let mut node = Node::new(1, vec![1, 2, 3], Box::new(reader), Box::new(writer));

    inject.write(master_sample(2000, 1, true)).unwrap();
    node.run_frame();

    for _ in 0..4 {
        inject
            .write(status_sample(2000, 2, LifecycleState::Active))
            .unwrap();
    }
    node.run_frame();
    let pending = node.stack.gateway().pending_peers(2000).unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending.contains(&3));
}

#[test]
fn barrier_times_out_on_the_exact_frame() {
    let (mut inject, reader) = memory_channel();
    let (writer, mut outbox) = memory_channel();
    let stack = NetworkStack::new(
        1,
        Box::new(reader),
        Box::new(writer),
        tank_templates(),
        Box::new(StaticTopology::new(1, vec![1, 2, 3])),
    )
    .with_reliable_init_config(ReliableInitConfig { timeout_frames: 5 })
    .with_standard_egress();
    let mut node = Node::from_stack(stack);

    inject.write(master_sample(2000, 1, true)).unwrap();
    node.run_frame();
    let entity = node.entity(2000).expect("entity materialised");

    // Construction started at frame 0; frames 1..=4 keep waiting.
    for _ in 1..5 {
        node.run_frame();
        assert!(node.world.has_component(entity, PENDING_NETWORK_ACK));
    }

    // Frame 5 = start + timeout: force-ack.
    node.run_frame();
    assert!(!node.world.has_component(entity, PENDING_NETWORK_ACK));
    assert_eq!(node.stack.gateway().pending_count(), 0);
    assert_eq!(lifecycle_acks(outbox.take_samples()), vec![(2000, 1)]);
}

#[test]
fn fast_mode_skips_the_barrier_entirely() {
    let (mut inject, reader) = memory_channel();
    let (writer, _outbox) = memory_channel();
    let mut node = Node::new(1, vec![1, 2, 3], Box::new(reader), Box::new(writer));

    inject.write(master_sample(3000, 1, false)).unwrap();
    node.run_frame();
    let entity = node.entity(3000).expect("entity materialised");
    assert!(!node.world.has_component(entity, PENDING_NETWORK_ACK));
    assert_eq!(node.stack.gateway().pending_count(), 0);

    node.run_frame();
    assert_eq!(node.world.lifecycle(entity), Ok(LifecycleState::Active));
}

#[test]
fn destruction_discards_the_pending_barrier() {
    let (mut inject, reader) = memory_channel();
    let (writer, _outbox) = memory_channel();
    let mut node = Node::new(1, vec![1, 2, 3], Box::new(reader), Box::new(writer));

    inject.write(master_sample(2000, 1, true)).unwrap();
    node.run_frame();
    assert_eq!(node.stack.gateway().pending_count(), 1);

    let disposal = tern_shared::DataSample::disposed(master_sample(2000, 1, true).payload);
    inject.write(disposal).unwrap();
    node.run_frame();
    assert_eq!(node.stack.gateway().pending_count(), 0);
    assert_eq!(node.entity(2000), None);

    // A straggler ack for the destroyed entity is dropped.
    inject
        .write(status_sample(2000, 2, LifecycleState::Active))
        .unwrap();
    node.run_frame();
    assert_eq!(node.stack.gateway().pending_count(), 0);
}
