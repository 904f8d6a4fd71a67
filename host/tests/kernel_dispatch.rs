use std::sync::{Arc, Mutex};

use tern_host::{
    BreakerState, FrameOutcome, HostConfig, Kernel, Module, ModuleTier, Phase, ScheduleBuilder,
    ScheduledModule, SimView, SystemDescriptor,
};
use tern_shared::FrameIndex;

const HIT_EVENT: u32 = 40;
const SCORE: u32 = 20;

#[derive(Clone, Default)]
struct Trace {
    ticks: Arc<Mutex<Vec<(FrameIndex, f32)>>>,
    events: Arc<Mutex<Vec<u64>>>,
}

struct Recorder {
    name: &'static str,
    tier: ModuleTier,
    frequency: u32,
    trace: Trace,
}

impl Module for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn tier(&self) -> ModuleTier {
        self.tier
    }

    fn update_frequency(&self) -> u32 {
        self.frequency
    }

    fn tick(&mut self, view: &mut SimView, delta: f32) {
        self.trace
            .ticks
            .lock()
            .unwrap()
            .push((view.tick(), delta));
        let mut events = self.trace.events.lock().unwrap();
        for event in view.consume_events::<u64>(HIT_EVENT) {
            events.push(*event);
        }
    }
}

struct Panicker;

impl Module for Panicker {
    fn name(&self) -> &str {
        "panicker"
    }

    fn tier(&self) -> ModuleTier {
        ModuleTier::Fast
    }

    fn tick(&mut self, _view: &mut SimView, _delta: f32) {
        panic!("scripted failure");
    }
}

#[test]
fn fast_runs_every_frame_slow_runs_on_schedule() {
    let mut kernel = Kernel::new(HostConfig::default());
    let fast = Trace::default();
    let slow = Trace::default();
    kernel.register_module(Box::new(Recorder {
        name: "fast",
        tier: ModuleTier::Fast,
        frequency: 1,
        trace: fast.clone(),
    }));
    kernel.register_module(Box::new(Recorder {
        name: "slow",
        tier: ModuleTier::Slow,
        frequency: 3,
        trace: slow.clone(),
    }));

    for _ in 0..10 {
        assert_eq!(kernel.update(0.1).unwrap(), FrameOutcome::Ran);
    }

    let fast_ticks = fast.ticks.lock().unwrap();
    assert_eq!(fast_ticks.len(), 10);
    let frames: Vec<FrameIndex> = fast_ticks.iter().map(|(frame, _)| *frame).collect();
    assert_eq!(frames, (0..10).collect::<Vec<_>>());

    // frequency 3 runs at frames {0, 3, 6, 9}: ceil(10 / 3) runs.
    let slow_ticks = slow.ticks.lock().unwrap();
    let frames: Vec<FrameIndex> = slow_ticks.iter().map(|(frame, _)| *frame).collect();
    assert_eq!(frames, vec![0, 3, 6, 9]);

    // No time drift: each tier integrates the same total time.
    let fast_total: f32 = fast_ticks.iter().map(|(_, delta)| *delta).sum();
    let slow_total: f32 = slow_ticks.iter().map(|(_, delta)| *delta).sum();
    assert!((fast_total - 1.0).abs() < 1e-5);
    assert!((slow_total - 1.0).abs() < 1e-5);
}

#[test]
fn every_module_sees_every_event_exactly_once() {
    let mut kernel = Kernel::new(HostConfig::default());
    let fast = Trace::default();
    let slow = Trace::default();
    kernel.register_module(Box::new(Recorder {
        name: "fast",
        tier: ModuleTier::Fast,
        frequency: 1,
        trace: fast.clone(),
    }));
    kernel.register_module(Box::new(Recorder {
        name: "slow",
        tier: ModuleTier::Slow,
        frequency: 4,
        trace: slow.clone(),
    }));

    for frame in 0..12u64 {
        kernel.world_mut().bus_mut().publish::<u64>(HIT_EVENT, frame);
        kernel.update(0.1).unwrap();
    }

    let expected: Vec<u64> = (0..12).collect();
    assert_eq!(*fast.events.lock().unwrap(), expected);
    // The slow module runs on frames {0, 4, 8} and still observes every
    // event exactly once, in order.
    assert_eq!(*slow.events.lock().unwrap(), (0..9).collect::<Vec<u64>>());
}

#[test]
fn module_commands_mutate_the_live_world_after_join() {
    struct Scorer;
    impl Module for Scorer {
        fn name(&self) -> &str {
            "scorer"
        }
        fn tier(&self) -> ModuleTier {
            ModuleTier::Fast
        }
        fn tick(&mut self, view: &mut SimView, _delta: f32) {
            if view.tick() == 0 {
                let cmd = view.command_buffer();
                let created = cmd.create_entity();
                cmd.add_component(created, SCORE, 99u32);
            }
        }
    }

    let mut kernel = Kernel::new(HostConfig::default());
    kernel.world_mut().register::<u32>(SCORE).unwrap();
    kernel.register_module(Box::new(Scorer));

    kernel.update(0.1).unwrap();
    let world = kernel.world();
    let entity = world.query().with(SCORE).include_all().iter().next().unwrap();
    assert_eq!(world.get_component::<u32>(entity, SCORE), Some(&99));
}

#[test]
fn breaker_suppresses_a_panicking_module() {
    let mut kernel = Kernel::new(HostConfig::default());
    let healthy = Trace::default();
    kernel.register_module(Box::new(Panicker));
    kernel.register_module(Box::new(Recorder {
        name: "healthy",
        tier: ModuleTier::Fast,
        frequency: 1,
        trace: healthy.clone(),
    }));

    // Three failures trip the breaker; the kernel keeps running and the
    // healthy module is unaffected.
    for _ in 0..6 {
        assert!(kernel.update(0.1).is_ok());
    }
    assert_eq!(
        kernel.module_breaker_state("panicker"),
        Some(BreakerState::Open)
    );
    assert_eq!(healthy.ticks.lock().unwrap().len(), 6);
    assert_eq!(kernel.module_last_run("panicker"), Some(2));
}

#[test]
fn scheduled_module_runs_systems_in_dependency_order() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let log = |name: &'static str, order: &Arc<Mutex<Vec<&'static str>>>| {
        let order = Arc::clone(order);
        move |_view: &mut SimView, _delta: f32| {
            order.lock().unwrap().push(name);
        }
    };

    let schedule = ScheduleBuilder::new()
        .add(SystemDescriptor::new("integrate", Phase::Simulation, log("integrate", &order)).after("collide"))
        .add(SystemDescriptor::new("collide", Phase::Simulation, log("collide", &order)))
        .add(SystemDescriptor::new("input", Phase::Input, log("input", &order)))
        .add(SystemDescriptor::new("export", Phase::Export, log("export", &order)))
        .build()
        .unwrap();

    let mut kernel = Kernel::new(HostConfig::default());
    kernel.register_module(Box::new(ScheduledModule::new(
        "vehicle",
        ModuleTier::Fast,
        schedule,
    )));
    kernel.update(0.1).unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec!["input", "collide", "integrate", "export"]
    );
}
