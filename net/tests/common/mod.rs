#![allow(dead_code)]

use tern_host::{CommandBuffer, NetworkHooks, World};
use tern_net::{
    register_network_components, EntityTemplate, NetworkStack, Position, StaticTopology,
    TemplateDatabase, Velocity, WeaponEntry, WeaponStates, POSITION, VELOCITY, WEAPON_STATES,
};
use tern_shared::{
    DataReader, DataSample, DataWriter, DisType, Entity, EntityMaster, EntityState,
    EntityLifecycleStatus, GlobalTime, LifecycleState, MasterFlags, NetworkEntityId, NodeId,
    OwnershipUpdate, Payload,
};

pub const TANK: DisType = 1;

pub fn sim_world() -> World {
    let mut world = World::new();
    register_network_components(&mut world).unwrap();
    world
}

pub fn tank_templates() -> TemplateDatabase {
    let weapons = WeaponStates {
        weapons: [(0, WeaponEntry::default()), (1, WeaponEntry::default())]
            .into_iter()
            .collect(),
    };
    TemplateDatabase::new()
        .with_template(
            TANK,
            EntityTemplate::new("tank")
                .with_component(POSITION, Position::default())
                .with_component(VELOCITY, Velocity::default())
                .with_managed(WEAPON_STATES, weapons)
                .with_descriptor(WEAPON_STATES),
        )
        .with_instance_count(TANK, 2)
}

pub fn at_frame(frame: u64) -> GlobalTime {
    let mut time = GlobalTime::zero();
    time.frame = frame;
    time.delta = 0.1;
    time.total = frame as f64 * 0.1;
    time
}

pub fn master_sample(
    network_id: NetworkEntityId,
    primary_owner_id: NodeId,
    reliable_init: bool,
) -> DataSample {
    DataSample::alive(Payload::Master(EntityMaster {
        network_id,
        dis_type: TANK,
        primary_owner_id,
        flags: MasterFlags { reliable_init },
        name: "tank".to_string(),
    }))
}

pub fn state_sample(
    network_id: NetworkEntityId,
    owner_id: NodeId,
    location: [f32; 3],
) -> DataSample {
    DataSample::alive(Payload::State(EntityState {
        network_id,
        owner_id,
        location,
        velocity: [0.0; 3],
        timestamp: 0.0,
    }))
}

pub fn status_sample(
    network_id: NetworkEntityId,
    node_id: NodeId,
    state: LifecycleState,
) -> DataSample {
    DataSample::alive(Payload::Lifecycle(EntityLifecycleStatus {
        network_id,
        node_id,
        state,
        timestamp: 0.0,
    }))
}

pub fn ownership_sample(
    network_id: NetworkEntityId,
    descriptor_type_id: u32,
    instance_id: u32,
    new_owner: NodeId,
) -> DataSample {
    DataSample::alive(Payload::Ownership(OwnershipUpdate {
        network_id,
        descriptor_type_id,
        instance_id,
        new_owner,
        timestamp: 0.0,
    }))
}

/// One simulated node: a world plus its networking stack, driven through
/// the same ingress/egress sequence the kernel uses.
pub struct Node {
    pub world: World,
    pub stack: NetworkStack,
    pub cmd: CommandBuffer,
    pub frame: u64,
}

impl Node {
    pub fn new(
        local: NodeId,
        nodes: Vec<NodeId>,
        reader: Box<dyn DataReader>,
        writer: Box<dyn DataWriter>,
    ) -> Self {
        let stack = NetworkStack::new(
            local,
            reader,
            writer,
            tank_templates(),
            Box::new(StaticTopology::new(local, nodes)),
        )
        .with_standard_egress();
        Self::from_stack(stack)
    }

    pub fn from_stack(stack: NetworkStack) -> Self {
        Self {
            world: sim_world(),
            stack,
            cmd: CommandBuffer::new(),
            frame: 0,
        }
    }

    /// Retires the previous frame's events, then runs ingress. Events
    /// published during this ingress stay readable until the next one.
    pub fn ingress_frame(&mut self) -> GlobalTime {
        let time = at_frame(self.frame);
        self.frame += 1;
        self.world.bus_mut().clear();
        self.stack.ingress(&mut self.world, &time).unwrap();
        time
    }

    pub fn egress_frame(&mut self, time: &GlobalTime) {
        self.stack.egress(&self.world, time, &mut self.cmd);
        self.cmd.playback(&mut self.world).unwrap();
    }

    pub fn run_frame(&mut self) {
        let time = self.ingress_frame();
        self.egress_frame(&time);
    }

    pub fn entity(&self, network_id: NetworkEntityId) -> Option<Entity> {
        self.stack.ids().entity(network_id)
    }
}

/// Test transport that fans one writer out to several channels.
pub struct FanOutWriter {
    pub writers: Vec<Box<dyn DataWriter>>,
}

impl DataWriter for FanOutWriter {
    fn write(&mut self, sample: DataSample) -> Result<(), tern_shared::TransportError> {
        for writer in &mut self.writers {
            writer.write(sample.clone())?;
        }
        Ok(())
    }
}
