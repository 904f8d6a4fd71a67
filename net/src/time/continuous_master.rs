use std::any::Any;

use log::warn;

use tern_host::TimeController;
use tern_shared::{
    DataSample, DataWriter, FrameIndex, GlobalTime, Payload, SequenceNumber, TimeMode, TimePulse,
};

const PULSE_INTERVAL_SECONDS: f64 = 1.0;

/// Continuous time master: owns the wall clock, scales it, and broadcasts
/// pulses at 1 Hz (and immediately on every scale change) for slaves to
/// phase-lock against.
pub struct ContinuousMasterController {
    writer: Box<dyn DataWriter>,
    state: GlobalTime,
    next_frame: FrameIndex,
    scale: f32,
    wall: f64,
    base_sim: f64,
    scale_change_wall: f64,
    next_pulse_at: f64,
    seq: SequenceNumber,
}

impl ContinuousMasterController {
    pub fn new(writer: Box<dyn DataWriter>) -> Self {
        Self {
            writer,
            state: GlobalTime::zero(),
            next_frame: 0,
            scale: 1.0,
            wall: 0.0,
            base_sim: 0.0,
            scale_change_wall: 0.0,
            next_pulse_at: 0.0,
            seq: 0,
        }
    }

    fn sim_now(&self) -> f64 {
        self.base_sim + (self.wall - self.scale_change_wall) * self.scale as f64
    }

    fn send_pulse(&mut self) {
        self.seq = self.seq.wrapping_add(1);
        let pulse = TimePulse {
            master_wall_ticks: self.wall,
            sim_time: self.sim_now(),
            scale: self.scale,
            seq: self.seq,
        };
        if let Err(error) = self.writer.write(DataSample::alive(Payload::Pulse(pulse))) {
            warn!("time pulse dropped: {}", error);
        }
    }
}

impl TimeController for ContinuousMasterController {
    fn advance(&mut self, raw_delta: f32) -> Option<GlobalTime> {
        self.wall += raw_delta as f64;
        let sim = self.sim_now();

        let frame = self.next_frame;
        self.next_frame += 1;
        self.state.frame = frame;
        self.state.delta = (sim - self.state.total) as f32;
        self.state.total = sim;
        self.state.scale = self.scale;
        self.state.unscaled_delta = raw_delta;
        self.state.unscaled_total = self.wall;

        if self.wall >= self.next_pulse_at {
            self.send_pulse();
            self.next_pulse_at = self.wall + PULSE_INTERVAL_SECONDS;
        }

        Some(self.state)
    }

    /// Rebases the sim-time anchor so the scale change introduces no
    /// discontinuity, then pulses immediately.
    fn set_time_scale(&mut self, scale: f32) {
        self.base_sim = self.sim_now();
        self.scale_change_wall = self.wall;
        self.scale = scale.max(0.0);
        self.send_pulse();
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
        self.next_frame = state.frame + 1;
        self.scale = state.scale;
        self.wall = state.unscaled_total;
        self.base_sim = state.total;
        self.scale_change_wall = self.wall;
        self.next_pulse_at = self.wall;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
