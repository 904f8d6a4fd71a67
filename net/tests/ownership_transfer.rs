mod common;

use common::{master_sample, ownership_sample, Node};

use tern_net::{
    owns_descriptor, resolve_owner, DescriptorAuthorityChanged, EVENT_AUTHORITY_CHANGED,
    FORCE_NETWORK_PUBLISH, WEAPON_STATES,
};
use tern_shared::{memory_channel, DataReader, DataWriter, Payload};

#[test]
fn transfer_emits_authority_change_and_one_confirming_publish() {
    let (mut inject, reader) = memory_channel();
    let (writer, mut outbox) = memory_channel();
    let mut node = Node::new(1, vec![1, 2, 9], Box::new(reader), Box::new(writer));

    // Entity 3000 is owned by node 9; this node holds no authority.
    inject.write(master_sample(3000, 9, false)).unwrap();
    node.run_frame();
    node.run_frame();
    let entity = node.entity(3000).expect("entity materialised");
    assert_eq!(resolve_owner(&node.world, entity, WEAPON_STATES, 1), Some(9));
    // No descriptor traffic while remote-owned (lifecycle chatter aside).
    assert!(outbox.take_samples().iter().all(|sample| matches!(
        sample.payload,
        Payload::Lifecycle(_)
    )));

    // Instance 1 of the weapon descriptor is granted to this node.
    inject
        .write(ownership_sample(3000, WEAPON_STATES, 1, 1))
        .unwrap();
    let time = node.ingress_frame();

    let changes = node
        .world
        .bus()
        .read_managed::<DescriptorAuthorityChanged>(EVENT_AUTHORITY_CHANGED);
    assert_eq!(changes.len(), 1);
    assert!(changes[0].is_now_owner);
    assert_eq!(changes[0].descriptor_type_id, WEAPON_STATES);
    assert_eq!(changes[0].instance_id, 1);
    assert_eq!(changes[0].new_owner_id, 1);

    assert!(owns_descriptor(&node.world, entity, WEAPON_STATES, 1, 1));
    // Instance 0 still follows the primary owner.
    assert!(!owns_descriptor(&node.world, entity, WEAPON_STATES, 0, 1));

    // The transfer forces exactly one confirming weapon publish, and the
    // one-shot marker is gone after the egress pass.
    assert!(node.world.has_component(entity, FORCE_NETWORK_PUBLISH));
    node.egress_frame(&time);
    assert!(!node.world.has_component(entity, FORCE_NETWORK_PUBLISH));

    let weapons: Vec<u32> = outbox
        .take_samples()
        .into_iter()
        .filter_map(|sample| match sample.payload {
            Payload::Weapon(weapon) => Some(weapon.instance_id),
            _ => None,
        })
        .collect();
    assert_eq!(weapons, vec![1]);

    // Steady state: no re-publish without further changes.
    node.run_frame();
    let weapons: Vec<u32> = outbox
        .take_samples()
        .into_iter()
        .filter_map(|sample| match sample.payload {
            Payload::Weapon(weapon) => Some(weapon.instance_id),
            _ => None,
        })
        .collect();
    assert!(weapons.is_empty());
}

#[test]
fn duplicate_transfer_is_a_noop() {
    let (mut inject, reader) = memory_channel();
    let (writer, _outbox) = memory_channel();
    let mut node = Node::new(1, vec![1, 2, 9], Box::new(reader), Box::new(writer));

    inject.write(master_sample(3000, 9, false)).unwrap();
    node.run_frame();
    node.run_frame();
    let entity = node.entity(3000).unwrap();

    inject
        .write(ownership_sample(3000, WEAPON_STATES, 1, 1))
        .unwrap();
    node.run_frame();

    // Same grant again: no boundary crossing, no event, no marker.
    inject
        .write(ownership_sample(3000, WEAPON_STATES, 1, 1))
        .unwrap();
    node.ingress_frame();
    assert!(node
        .world
        .bus()
        .read_managed::<DescriptorAuthorityChanged>(EVENT_AUTHORITY_CHANGED)
        .is_empty());
    assert!(!node.world.has_component(entity, FORCE_NETWORK_PUBLISH));
}

#[test]
fn losing_authority_also_emits_a_change() {
    let (mut inject, reader) = memory_channel();
    let (writer, _outbox) = memory_channel();
    let mut node = Node::new(1, vec![1, 2, 9], Box::new(reader), Box::new(writer));

    // This node is primary owner, then instance 1 is granted away.
    inject.write(master_sample(3000, 1, false)).unwrap();
    node.run_frame();
    node.run_frame();
    let entity = node.entity(3000).unwrap();

    inject
        .write(ownership_sample(3000, WEAPON_STATES, 1, 2))
        .unwrap();
    node.ingress_frame();

    let changes = node
        .world
        .bus()
        .read_managed::<DescriptorAuthorityChanged>(EVENT_AUTHORITY_CHANGED);
    assert_eq!(changes.len(), 1);
    assert!(!changes[0].is_now_owner);
    assert_eq!(changes[0].new_owner_id, 2);
    // Losing authority does not force a publish.
    assert!(!node.world.has_component(entity, FORCE_NETWORK_PUBLISH));
}
