mod common;

use std::sync::{Arc, Mutex};

use common::{master_sample, tank_templates};

use tern_host::{HostConfig, Kernel, Module, ModuleTier, SimView};
use tern_net::{
    register_network_components, NetworkIdentity, NetworkStack, StaticTopology, NETWORK_IDENTITY,
};
use tern_shared::{memory_channel, DataWriter, LifecycleState};

/// A fast-tier module that records which replicated entities its snapshot
/// exposes each frame.
struct Watcher {
    seen: Arc<Mutex<Vec<i64>>>,
}

impl Module for Watcher {
    fn name(&self) -> &str {
        "watcher"
    }

    fn tier(&self) -> ModuleTier {
        ModuleTier::Fast
    }

    fn tick(&mut self, view: &mut SimView, _delta: f32) {
        let mut seen = self.seen.lock().unwrap();
        for entity in view.query().with(NETWORK_IDENTITY).iter() {
            let identity = view
                .get_component_ro::<NetworkIdentity>(entity, NETWORK_IDENTITY)
                .expect("identity column is in the snapshot");
            seen.push(identity.value);
        }
    }
}

#[test]
fn inbound_master_reaches_module_snapshots_through_the_kernel() {
    let (mut inject, reader) = memory_channel();
    let (writer, _outbox) = memory_channel();

    let mut kernel = Kernel::new(HostConfig::default());
    register_network_components(kernel.world_mut()).unwrap();
    let stack = NetworkStack::new(
        1,
        Box::new(reader),
        Box::new(writer),
        tank_templates(),
        Box::new(StaticTopology::new(1, vec![1])),
    )
    .with_standard_egress();
    kernel.set_network_hooks(Box::new(stack));

    let seen = Arc::new(Mutex::new(Vec::new()));
    kernel.register_module(Box::new(Watcher {
        seen: Arc::clone(&seen),
    }));

    inject.write(master_sample(1000, 1, false)).unwrap();
    for _ in 0..3 {
        kernel.update(0.1).unwrap();
    }

    // The entity went Active and every later snapshot exposed it.
    let world = kernel.world();
    let entity = world.query().with(NETWORK_IDENTITY).iter().next().unwrap();
    assert_eq!(world.lifecycle(entity), Ok(LifecycleState::Active));
    let seen = seen.lock().unwrap();
    assert!(seen.contains(&1000));
}
