use proptest::prelude::*;

use tern_host::{CommandBuffer, World};

const HEALTH: u32 = 1;
const ARMOR: u32 = 2;

#[derive(Clone, Debug)]
enum Op {
    AddHealth(u8, u32),
    AddArmor(u8, u32),
    RemoveHealth(u8),
    Destroy(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, any::<u32>()).prop_map(|(slot, value)| Op::AddHealth(slot, value)),
        (0u8..8, any::<u32>()).prop_map(|(slot, value)| Op::AddArmor(slot, value)),
        (0u8..8).prop_map(Op::RemoveHealth),
        (0u8..8).prop_map(Op::Destroy),
    ]
}

fn fresh_world() -> World {
    let mut world = World::new();
    world.register::<u32>(HEALTH).unwrap();
    world.register::<u32>(ARMOR).unwrap();
    world
}

proptest! {
    /// Replaying a recorded op stream produces exactly the world that
    /// direct mutation produces, for any interleaving of ops.
    #[test]
    fn playback_equals_direct_mutation(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let mut direct = fresh_world();
        let direct_entities: Vec<_> = (0..8).map(|_| direct.create_entity()).collect();

        let mut replayed = fresh_world();
        let replayed_entities: Vec<_> = (0..8).map(|_| replayed.create_entity()).collect();
        let mut buffer = CommandBuffer::new();

        for op in &ops {
            match *op {
                Op::AddHealth(slot, value) => {
                    let _ = direct.add_component(direct_entities[slot as usize], HEALTH, value);
                    buffer.add_component(replayed_entities[slot as usize], HEALTH, value);
                }
                Op::AddArmor(slot, value) => {
                    let _ = direct.add_component(direct_entities[slot as usize], ARMOR, value);
                    buffer.add_component(replayed_entities[slot as usize], ARMOR, value);
                }
                Op::RemoveHealth(slot) => {
                    let _ = direct.remove_component(direct_entities[slot as usize], HEALTH);
                    buffer.remove_component(replayed_entities[slot as usize], HEALTH);
                }
                Op::Destroy(slot) => {
                    let _ = direct.destroy_entity(direct_entities[slot as usize]);
                    buffer.destroy_entity(replayed_entities[slot as usize]);
                }
            }
        }

        buffer.playback(&mut replayed).unwrap();

        for slot in 0..8 {
            let d = direct_entities[slot];
            let r = replayed_entities[slot];
            prop_assert_eq!(direct.is_alive(d), replayed.is_alive(r));
            prop_assert_eq!(
                direct.get_component::<u32>(d, HEALTH),
                replayed.get_component::<u32>(r, HEALTH)
            );
            prop_assert_eq!(
                direct.get_component::<u32>(d, ARMOR),
                replayed.get_component::<u32>(r, ARMOR)
            );
        }

        // And the replayed buffer cleared itself: a second playback is a
        // no-op.
        let before = replayed.entity_count();
        buffer.playback(&mut replayed).unwrap();
        prop_assert_eq!(replayed.entity_count(), before);
    }
}
