use std::any::Any;
use std::collections::VecDeque;

use log::warn;

use tern_host::TimeController;
use tern_shared::{
    sequence_greater_than, DataReader, FrameIndex, GlobalTime, Payload, TimeMode, TimePulse,
};

/// Tuning for the slave's phase-locked loop
#[derive(Clone, Copy, Debug)]
pub struct PllConfig {
    /// Proportional gain applied to the median phase error.
    pub gain: f64,
    /// Bound on the clock-rate correction (0.05 = ±5%).
    pub max_slew: f64,
    /// Errors past this snap the virtual clock instead of slewing.
    pub snap_threshold_ms: f64,
    /// Phase-error samples kept for the median jitter filter.
    pub jitter_window_size: usize,
    /// Estimated one-way latency from the master, added to every pulse.
    pub latency_estimate_ms: f64,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            gain: 0.1,
            max_slew: 0.05,
            snap_threshold_ms: 500.0,
            jitter_window_size: 8,
            latency_estimate_ms: 50.0,
        }
    }
}

/// Continuous time slave: advances a virtual wall clock by
/// `raw_delta * (1 + correction)` where the correction is a P-controller
/// over a median-filtered phase error against the master's pulses. Large
/// errors hard-snap the clock and reset the filter.
pub struct ContinuousSlaveController {
    reader: Box<dyn DataReader>,
    config: PllConfig,
    state: GlobalTime,
    next_frame: FrameIndex,
    scale: f32,
    virtual_wall: f64,
    /// Sim-time anchor: master's sim time at `anchor_wall` on the master's
    /// clock.
    base_sim: f64,
    anchor_wall: f64,
    correction: f64,
    errors: VecDeque<f64>,
    last_pulse: Option<TimePulse>,
    since_pulse: f64,
}

impl ContinuousSlaveController {
    pub fn new(reader: Box<dyn DataReader>, config: PllConfig) -> Self {
        Self {
            reader,
            config,
            state: GlobalTime::zero(),
            next_frame: 0,
            scale: 1.0,
            virtual_wall: 0.0,
            base_sim: 0.0,
            anchor_wall: 0.0,
            correction: 0.0,
            errors: VecDeque::new(),
            last_pulse: None,
            since_pulse: 0.0,
        }
    }

    pub fn correction(&self) -> f64 {
        self.correction
    }

    fn accept_pulses(&mut self) {
        for sample in self.reader.take_samples() {
            let Payload::Pulse(pulse) = sample.payload else {
                continue;
            };
            if let Some(last) = &self.last_pulse {
                if !sequence_greater_than(pulse.seq, last.seq) {
                    // Stale or duplicate pulse.
                    continue;
                }
            }
            // Re-anchor sim time on every accepted pulse; a scale change
            // arrives as a fresh anchor, so no discontinuity.
            self.base_sim = pulse.sim_time;
            self.anchor_wall = pulse.master_wall_ticks;
            self.scale = pulse.scale;
            self.since_pulse = 0.0;
            self.last_pulse = Some(pulse);
        }
    }

    fn track_error(&mut self) {
        let Some(pulse) = &self.last_pulse else {
            return;
        };
        let latency = self.config.latency_estimate_ms / 1000.0;
        let target = pulse.master_wall_ticks + latency + self.since_pulse;
        let error = target - self.virtual_wall;

        if error.abs() * 1000.0 > self.config.snap_threshold_ms {
            warn!(
                "slave clock {}ms off master; snapping",
                (error * 1000.0) as i64
            );
            self.virtual_wall = target;
            self.errors.clear();
            self.correction = 0.0;
            return;
        }

        self.errors.push_back(error);
        while self.errors.len() > self.config.jitter_window_size {
            self.errors.pop_front();
        }
        let median = median(&self.errors);
        self.correction = (self.config.gain * median).clamp(-self.config.max_slew, self.config.max_slew);
    }
}

fn median(window: &VecDeque<f64>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = window.iter().copied().collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("phase errors are finite"));
    sorted[sorted.len() / 2]
}

impl TimeController for ContinuousSlaveController {
    fn advance(&mut self, raw_delta: f32) -> Option<GlobalTime> {
        self.accept_pulses();

        self.virtual_wall += raw_delta as f64 * (1.0 + self.correction);
        self.since_pulse += raw_delta as f64;
        self.track_error();

        let sim = self.base_sim + (self.virtual_wall - self.anchor_wall) * self.scale as f64;
        let frame = self.next_frame;
        self.next_frame += 1;
        self.state.frame = frame;
        self.state.delta = (sim - self.state.total).max(0.0) as f32;
        self.state.total = sim;
        self.state.scale = self.scale;
        self.state.unscaled_delta = raw_delta;
        self.state.unscaled_total += raw_delta as f64;

        Some(self.state)
    }

    fn set_time_scale(&mut self, _scale: f32) {
        // Scale is the master's to set; it arrives through pulses.
        warn!("time scale on a slave controller is driven by the master; ignoring");
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
        self.virtual_wall = state.unscaled_total;
        self.base_sim = state.total;
        self.anchor_wall = self.virtual_wall;
        self.errors.clear();
        self.correction = 0.0;
        self.last_pulse = None;
        self.since_pulse = 0.0;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod slave_tests {
    use super::*;
    use tern_shared::{memory_channel, DataSample, DataWriter, MemoryWriter};

    fn pulse(writer: &mut MemoryWriter, wall: f64, sim: f64, scale: f32, seq: u16) {
        writer
            .write(DataSample::alive(Payload::Pulse(TimePulse {
                master_wall_ticks: wall,
                sim_time: sim,
                scale,
                seq,
            })))
            .unwrap();
    }

    #[test]
    fn snaps_when_far_behind_master() {
        let (mut writer, reader) = memory_channel();
        let mut slave =
            ContinuousSlaveController::new(Box::new(reader), PllConfig::default());

        pulse(&mut writer, 100.0, 100.0, 1.0, 1);
        let time = slave.advance(0.016).unwrap();
        // Slave clock was at ~0; a 100 s error is far past the snap
        // threshold, so sim time lands on the master's clock at once.
        assert!(time.total > 99.0);
        assert_eq!(slave.correction(), 0.0);
    }

    #[test]
    fn small_error_slews_instead_of_snapping() {
        let (mut writer, reader) = memory_channel();
        let mut slave =
            ContinuousSlaveController::new(Box::new(reader), PllConfig::default());

        // Master marginally ahead: correction goes positive, bounded by
        // max_slew, and no snap happens.
        pulse(&mut writer, 0.1, 0.1, 1.0, 1);
        slave.advance(0.016);
        assert!(slave.correction() > 0.0);
        assert!(slave.correction() <= PllConfig::default().max_slew);
    }

    #[test]
    fn stale_pulses_are_rejected() {
        let (mut writer, reader) = memory_channel();
        let mut slave =
            ContinuousSlaveController::new(Box::new(reader), PllConfig::default());

        pulse(&mut writer, 10.0, 10.0, 1.0, 5);
        slave.advance(0.016);
        let anchored = slave.current_state().total;

        // An older sequence number must not re-anchor the clock backwards.
        pulse(&mut writer, 1.0, 1.0, 1.0, 3);
        let time = slave.advance(0.016).unwrap();
        assert!(time.total >= anchored);
    }

    #[test]
    fn scale_arrives_through_pulses() {
        let (mut writer, reader) = memory_channel();
        let mut slave =
            ContinuousSlaveController::new(Box::new(reader), PllConfig::default());

        pulse(&mut writer, 0.0, 0.0, 2.0, 1);
        slave.advance(0.016);
        assert_eq!(slave.time_scale(), 2.0);

        slave.set_time_scale(5.0);
        assert_eq!(slave.time_scale(), 2.0);
    }
}
