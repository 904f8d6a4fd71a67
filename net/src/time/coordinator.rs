use log::warn;

use tern_host::TimeController;
use tern_shared::{
    DataSample, DataWriter, FrameIndex, GlobalTime, Payload, SwitchTimeMode, TimeMode,
    TransportError,
};

/// Configuration for coordinated time-mode switches
#[derive(Clone, Copy, Debug)]
pub struct ModeSwitchConfig {
    /// Lookahead from the current frame to the barrier frame; must cover
    /// the worst-case one-way latency at the cluster's frame rate.
    pub pause_barrier_frames: u64,
}

impl Default for ModeSwitchConfig {
    fn default() -> Self {
        Self {
            pause_barrier_frames: 30,
        }
    }
}

type ContinuousFactory = Box<dyn FnMut(GlobalTime) -> Box<dyn TimeController> + Send>;
type DeterministicFactory = Box<dyn FnMut(GlobalTime, f32) -> Box<dyn TimeController> + Send>;

/// Coordinates switching between continuous and deterministic time without
/// discontinuity: the master broadcasts a future barrier frame, every node
/// swaps its controller on reaching it, and an unpause takes effect
/// immediately (cancelling any pending pause barrier).
pub struct TimeModeCoordinator {
    config: ModeSwitchConfig,
    writer: Option<Box<dyn DataWriter>>,
    make_continuous: ContinuousFactory,
    make_deterministic: DeterministicFactory,
    pending: Option<SwitchTimeMode>,
}

impl TimeModeCoordinator {
    pub fn new(
        config: ModeSwitchConfig,
        make_continuous: ContinuousFactory,
        make_deterministic: DeterministicFactory,
    ) -> Self {
        Self {
            config,
            writer: None,
            make_continuous,
            make_deterministic,
            pending: None,
        }
    }

    /// Master side: broadcast switch messages to the cluster.
    pub fn with_writer(mut self, writer: Box<dyn DataWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn pending_switch(&self) -> Option<SwitchTimeMode> {
        self.pending
    }

    /// Master side: schedule a pause into deterministic lockstep at a
    /// future barrier frame and broadcast it.
    pub fn request_pause(
        &mut self,
        current_frame: FrameIndex,
        fixed_delta: f32,
    ) -> Result<SwitchTimeMode, TransportError> {
        let message = SwitchTimeMode {
            target_mode: TimeMode::Deterministic,
            barrier_frame: current_frame + self.config.pause_barrier_frames,
            fixed_delta,
        };
        self.broadcast(message)?;
        self.pending = Some(message);
        Ok(message)
    }

    /// Master side: resume continuous time immediately. An unpause always
    /// cancels a pending pause barrier.
    pub fn request_unpause(&mut self) -> Result<SwitchTimeMode, TransportError> {
        let message = SwitchTimeMode {
            target_mode: TimeMode::Continuous,
            barrier_frame: 0,
            fixed_delta: 0.0,
        };
        self.broadcast(message)?;
        self.pending = Some(message);
        Ok(message)
    }

    /// Slave side: a switch message arrived from the coordinator's master.
    pub fn handle_message(&mut self, message: SwitchTimeMode, current_frame: FrameIndex) {
        if message.target_mode == TimeMode::Deterministic
            && message.barrier_frame <= current_frame
        {
            warn!(
                "mode switch received after its barrier frame {} (now at {}); switching immediately",
                message.barrier_frame, current_frame
            );
        }
        // A later message always supersedes: in particular an unpause
        // cancels a pending pause.
        self.pending = Some(message);
    }

    /// Applies a due switch to the kernel's controller slot. Call between
    /// frames; returns true when the controller was swapped.
    pub fn apply(
        &mut self,
        slot: &mut Box<dyn TimeController>,
        current_frame: FrameIndex,
    ) -> bool {
        let Some(message) = self.pending else {
            return false;
        };
        let due = match message.target_mode {
            TimeMode::Continuous => true,
            TimeMode::Deterministic => current_frame + 1 >= message.barrier_frame,
        };
        if !due {
            return false;
        }
        if slot.mode() == message.target_mode {
            self.pending = None;
            return false;
        }

        let state = slot.current_state();
        let mut replacement = match message.target_mode {
            TimeMode::Continuous => (self.make_continuous)(state),
            TimeMode::Deterministic => (self.make_deterministic)(state, message.fixed_delta),
        };
        replacement.seed_state(state);
        *slot = replacement;
        self.pending = None;
        true
    }

    fn broadcast(&mut self, message: SwitchTimeMode) -> Result<(), TransportError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write(DataSample::alive(Payload::SwitchMode(message)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod coordinator_tests {
    use super::*;
    use crate::time::DeterministicSlaveController;
    use tern_host::StandaloneTimeController;
    use tern_shared::memory_channel;

    fn coordinator() -> TimeModeCoordinator {
        TimeModeCoordinator::new(
            ModeSwitchConfig {
                pause_barrier_frames: 10,
            },
            Box::new(|_state| Box::new(StandaloneTimeController::new())),
            Box::new(|_state, _delta| {
                let (_writer, reader) = memory_channel();
                let (writer, _reader) = memory_channel();
                Box::new(DeterministicSlaveController::new(
                    2,
                    Box::new(reader),
                    Box::new(writer),
                ))
            }),
        )
    }

    fn slot() -> Box<dyn TimeController> {
        let mut controller = StandaloneTimeController::new();
        for _ in 0..5 {
            controller.advance(0.1);
        }
        Box::new(controller)
    }

    #[test]
    fn pause_waits_for_the_barrier() {
        let mut coordinator = coordinator();
        let mut slot = slot();
        let message = coordinator.request_pause(4, 0.5).unwrap();
        assert_eq!(message.barrier_frame, 14);

        assert!(!coordinator.apply(&mut slot, 5));
        assert_eq!(slot.mode(), TimeMode::Continuous);

        assert!(coordinator.apply(&mut slot, 13));
        assert_eq!(slot.mode(), TimeMode::Deterministic);
        // Seeded: the lockstep controller continues from the old frame.
        assert_eq!(slot.current_state().frame, 4);
    }

    #[test]
    fn unpause_is_immediate_and_cancels_pending_pause() {
        let mut coordinator = coordinator();
        let mut slot = slot();
        coordinator.request_pause(4, 0.5).unwrap();
        coordinator.request_unpause().unwrap();

        // The pause barrier is far away, but the unpause applies now; the
        // slot is already continuous, so no swap happens and the pending
        // switch is consumed.
        assert!(!coordinator.apply(&mut slot, 5));
        assert_eq!(coordinator.pending_switch(), None);
        assert_eq!(slot.mode(), TimeMode::Continuous);
    }

    #[test]
    fn late_switch_applies_immediately() {
        let mut coordinator = coordinator();
        let mut slot = slot();
        coordinator.handle_message(
            SwitchTimeMode {
                target_mode: TimeMode::Deterministic,
                barrier_frame: 3,
                fixed_delta: 0.5,
            },
            8,
        );
        assert!(coordinator.apply(&mut slot, 8));
        assert_eq!(slot.mode(), TimeMode::Deterministic);
    }
}
