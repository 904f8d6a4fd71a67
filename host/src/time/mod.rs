use std::any::Any;

use tern_shared::{FrameIndex, GlobalTime, TimeMode};

/// A source of simulated time for the frame kernel.
///
/// Exactly one controller is active at a time; the kernel swaps controllers
/// only at frame boundaries, so every module tick within a frame observes
/// the same [`GlobalTime`]. A controller that does not advance the frame
/// (a stalled lockstep slave, a lockstep master waiting on acks) returns
/// its current state unchanged and the kernel skips the frame.
pub trait TimeController: Send {
    /// Advances time by the wall-clock delta and returns the frame's time,
    /// or `None` when the controller cannot advance yet (ack-gated master,
    /// stalled lockstep slave).
    fn advance(&mut self, raw_delta: f32) -> Option<GlobalTime>;

    fn set_time_scale(&mut self, scale: f32);

    fn time_scale(&self) -> f32;

    fn mode(&self) -> TimeMode;

    /// The most recently computed frame time, without advancing.
    fn current_state(&self) -> GlobalTime;

    /// Adopts another controller's final state so a swap introduces no
    /// discontinuity.
    fn seed_state(&mut self, state: GlobalTime);

    /// Downcast hook for controller-specific operations (manual stepping,
    /// pulse scheduling).
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Wall-clock driven controller for a node running on its own.
pub struct StandaloneTimeController {
    state: GlobalTime,
    scale: f32,
    next_frame: FrameIndex,
}

impl StandaloneTimeController {
    pub fn new() -> Self {
        Self {
            state: GlobalTime::zero(),
            scale: 1.0,
            next_frame: 0,
        }
    }
}

impl Default for StandaloneTimeController {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeController for StandaloneTimeController {
    fn advance(&mut self, raw_delta: f32) -> Option<GlobalTime> {
        let frame = self.next_frame;
        self.next_frame += 1;
        self.state.frame = frame;
        self.state.scale = self.scale;
        self.state.unscaled_delta = raw_delta;
        self.state.unscaled_total += raw_delta as f64;
        self.state.delta = raw_delta * self.scale;
        self.state.total += (raw_delta * self.scale) as f64;
        Some(self.state)
    }

    fn set_time_scale(&mut self, scale: f32) {
        self.scale = scale.max(0.0);
    }

    fn time_scale(&self) -> f32 {
        self.scale
    }

    fn mode(&self) -> TimeMode {
        TimeMode::Continuous
    }

    fn current_state(&self) -> GlobalTime {
        self.state
    }

    fn seed_state(&mut self, state: GlobalTime) {
        self.state = state;
        self.scale = state.scale;
        self.next_frame = state.frame + 1;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod standalone_tests {
    use super::{StandaloneTimeController, TimeController};

    #[test]
    fn frames_count_from_zero() {
        let mut controller = StandaloneTimeController::new();
        assert_eq!(controller.advance(0.016).unwrap().frame, 0);
        assert_eq!(controller.advance(0.016).unwrap().frame, 1);
    }

    #[test]
    fn scale_shrinks_delta_but_not_unscaled() {
        let mut controller = StandaloneTimeController::new();
        controller.set_time_scale(0.5);
        let time = controller.advance(0.1).unwrap();
        assert!((time.delta - 0.05).abs() < 1e-6);
        assert!((time.unscaled_delta - 0.1).abs() < 1e-6);
    }

    #[test]
    fn totals_accumulate_continuously_across_scale_change() {
        let mut controller = StandaloneTimeController::new();
        controller.advance(1.0);
        controller.set_time_scale(2.0);
        let time = controller.advance(1.0).unwrap();
        assert!((time.total - 3.0).abs() < 1e-6);
        assert!((time.unscaled_total - 2.0).abs() < 1e-6);
    }

    #[test]
    fn seeded_state_continues_from_seed() {
        let mut first = StandaloneTimeController::new();
        for _ in 0..5 {
            first.advance(0.1);
        }
        let mut second = StandaloneTimeController::new();
        second.seed_state(first.current_state());
        let time = second.advance(0.1).unwrap();
        assert_eq!(time.frame, 5);
        assert!((time.total - 0.6).abs() < 1e-5);
    }
}
