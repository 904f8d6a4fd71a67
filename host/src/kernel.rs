use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::{error, warn};
use thiserror::Error;

use tern_shared::{EventTypeMask, FrameIndex, GlobalTime};

use crate::accumulator::EventAccumulator;
use crate::breaker::{BreakerState, CircuitBreaker};
use crate::command::{CommandBuffer, PlaybackError};
use crate::config::HostConfig;
use crate::module::{Module, ModuleTier};
use crate::provider::{FullReplicaProvider, OnDemandProvider, SnapshotProvider};
use crate::time::{StandaloneTimeController, TimeController};
use crate::view::SimView;
use crate::world::World;

/// Errors that can occur during a kernel frame
#[derive(Debug, Error)]
pub enum KernelError {
    /// Command playback failed mid-stream; the world may be inconsistent
    /// and the frame is surfaced to the host instead of being patched up.
    #[error("module '{module}' command playback failed: {source}")]
    Playback {
        module: String,
        source: PlaybackError,
    },

    #[error("network egress command playback failed: {source}")]
    NetworkPlayback { source: PlaybackError },
}

/// What a call to [`Kernel::update`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Ran,
    /// The time controller did not advance the frame (lockstep stall or a
    /// master waiting on acks); no capture, dispatch or playback happened.
    Stalled,
}

/// Hook pair connecting a networking layer to the frame loop. Ingress runs
/// before event capture with exclusive world access; egress runs after
/// command playback and records its own mutations into the kernel's
/// network command buffer.
pub trait NetworkHooks: Send {
    /// A playback error from the layer's own deferred commands is a fatal
    /// invariant and aborts the frame.
    fn ingress(&mut self, world: &mut World, time: &GlobalTime) -> Result<(), PlaybackError>;

    fn egress(&mut self, world: &World, time: &GlobalTime, cmd: &mut CommandBuffer);
}

struct ModuleEntry {
    name: String,
    module: Box<dyn Module>,
    provider: Box<dyn SnapshotProvider>,
    cmd: CommandBuffer,
    breaker: CircuitBreaker,
    event_mask: EventTypeMask,
    last_run_frame: Option<FrameIndex>,
    accumulated_delta: f32,
    delta_for_run: f32,
    due: bool,
}

/// The frame kernel: owns the live world, the event accumulator, every
/// registered module with its provider, and the active time controller.
///
/// Per frame: advance time, network ingress, capture events, update due
/// providers, dispatch due modules on the worker pool, join, replay every
/// command buffer on this thread, then network egress.
pub struct Kernel {
    world: World,
    accumulator: EventAccumulator,
    modules: Vec<ModuleEntry>,
    controller: Box<dyn TimeController>,
    network: Option<Box<dyn NetworkHooks>>,
    net_cmd: CommandBuffer,
    config: HostConfig,
    wall_clock_ms: f64,
}

impl Kernel {
    pub fn new(config: HostConfig) -> Self {
        let accumulator = EventAccumulator::new(config.max_history_frames);
        let net_cmd = CommandBuffer::with_capacity(config.command_buffer_initial_bytes);
        Self {
            world: World::new(),
            accumulator,
            modules: Vec::new(),
            controller: Box::new(StandaloneTimeController::new()),
            network: None,
            net_cmd,
            config,
            wall_clock_ms: 0.0,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Main-thread setup and inspection access to the live world. During a
    /// frame, modules only ever see snapshots.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn accumulator(&self) -> &EventAccumulator {
        &self.accumulator
    }

    /// Registers a module with the provider its tier prescribes: Fast gets
    /// the persistent full replica, Slow gets a pooled filtered snapshot.
    pub fn register_module(&mut self, module: Box<dyn Module>) {
        let provider: Box<dyn SnapshotProvider> = match module.tier() {
            ModuleTier::Fast => Box::new(FullReplicaProvider::new()),
            ModuleTier::Slow => Box::new(OnDemandProvider::new(
                module.component_requirements(),
                self.config.replica_pool_size,
            )),
        };
        self.register_module_with_provider(module, provider);
    }

    pub fn register_module_with_provider(
        &mut self,
        module: Box<dyn Module>,
        provider: Box<dyn SnapshotProvider>,
    ) {
        self.modules.push(ModuleEntry {
            name: module.name().to_string(),
            event_mask: module.event_requirements(),
            module,
            provider,
            cmd: CommandBuffer::with_capacity(self.config.command_buffer_initial_bytes),
            breaker: CircuitBreaker::new(self.config.breaker),
            last_run_frame: None,
            accumulated_delta: 0.0,
            delta_for_run: 0.0,
            due: false,
        });
    }

    pub fn set_network_hooks(&mut self, hooks: Box<dyn NetworkHooks>) {
        self.network = Some(hooks);
    }

    /// Swaps the time controller. Only legal between frames; the new
    /// controller should be seeded with the old one's state by the caller
    /// (the mode-switch coordinator does exactly that).
    pub fn set_time_controller(&mut self, controller: Box<dyn TimeController>) {
        self.controller = controller;
    }

    pub fn controller_mut(&mut self) -> &mut dyn TimeController {
        self.controller.as_mut()
    }

    /// Gives the mode-switch coordinator a slot it can swap wholesale.
    pub fn controller_slot(&mut self) -> &mut Box<dyn TimeController> {
        &mut self.controller
    }

    pub fn module_breaker_state(&self, name: &str) -> Option<BreakerState> {
        self.modules
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.breaker.state())
    }

    pub fn module_last_run(&self, name: &str) -> Option<FrameIndex> {
        self.modules
            .iter()
            .find(|entry| entry.name == name)
            .and_then(|entry| entry.last_run_frame)
    }

    pub fn update(&mut self, wall_delta: f32) -> Result<FrameOutcome, KernelError> {
        // 1. Advance time: this frame's GlobalTime is fixed from here on.
        self.wall_clock_ms += (wall_delta as f64) * 1000.0;
        let Some(time) = self.controller.advance(wall_delta) else {
            return Ok(FrameOutcome::Stalled);
        };
        let now_ms = self.wall_clock_ms as u64;

        // 2. Network ingress, before capture so its events land in this
        // frame's batch.
        if let Some(network) = self.network.as_mut() {
            network
                .ingress(&mut self.world, &time)
                .map_err(|source| KernelError::NetworkPlayback { source })?;
        }

        // 3. Capture the frame's events, then retire them from the live bus.
        self.accumulator.capture_frame(time.frame, self.world.bus());
        self.world.bus_mut().clear();

        // 4. Decide who runs and bring their snapshots up to date.
        for entry in &mut self.modules {
            entry.accumulated_delta += time.delta;
            let frequency = u64::from(entry.module.update_frequency().max(1));
            let due_by_schedule = match entry.last_run_frame {
                None => true,
                Some(last) => time.frame.saturating_sub(last) >= frequency,
            };
            entry.due = due_by_schedule && entry.breaker.can_run(now_ms);
            if entry.due {
                entry
                    .provider
                    .update(&self.world, &self.accumulator, &time, &entry.event_mask);
                entry.delta_for_run = entry.accumulated_delta;
                entry.accumulated_delta = 0.0;
                entry.last_run_frame = Some(time.frame);
            } else if due_by_schedule {
                warn!("module '{}' suppressed by open circuit breaker", entry.name);
            }
        }

        // 5. Dispatch and join. A panicking module trips its breaker and
        // loses this frame's recording; its view is released below either
        // way.
        rayon::scope(|scope| {
            for entry in self.modules.iter_mut() {
                if !entry.due {
                    continue;
                }
                scope.spawn(move |_| {
                    let delta = entry.delta_for_run;
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        let world = entry.provider.view();
                        let mut view = SimView::new(world, &mut entry.cmd, time);
                        entry.module.tick(&mut view, delta);
                    }));
                    match outcome {
                        Ok(()) => entry.breaker.record_success(),
                        Err(payload) => {
                            error!(
                                "module '{}' panicked during tick: {}",
                                entry.name,
                                panic_message(payload.as_ref())
                            );
                            entry.cmd.clear();
                            entry.breaker.record_failure(now_ms);
                        }
                    }
                });
            }
        });

        // 6. Release views, then replay every producing buffer exactly once
        // on this thread.
        for entry in &mut self.modules {
            if !entry.due {
                continue;
            }
            entry.provider.release();
            if let Err(source) = entry.cmd.playback(&mut self.world) {
                return Err(KernelError::Playback {
                    module: entry.name.clone(),
                    source,
                });
            }
        }

        // 7. Network egress.
        if let Some(network) = self.network.as_mut() {
            network.egress(&self.world, &time, &mut self.net_cmd);
            if let Err(source) = self.net_cmd.playback(&mut self.world) {
                return Err(KernelError::NetworkPlayback { source });
            }
        }

        Ok(FrameOutcome::Ran)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
