use std::any::Any;
use std::collections::HashSet;

use log::warn;
use thiserror::Error;

use tern_host::TimeController;
use tern_shared::{
    DataReader, DataSample, DataWriter, FrameOrder, GlobalTime, NodeId, Payload, SequenceNumber,
    TimeMode,
};

use crate::time::LockstepConfig;

/// Errors that can occur while driving the lockstep master
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockstepError {
    /// The previous frame has unacknowledged slaves; stepping now would
    /// let the cluster diverge. Use `step_forced` to override.
    #[error("frame {frame_id} not acknowledged yet by {waiting_on:?}")]
    StepRefused {
        frame_id: u64,
        waiting_on: Vec<NodeId>,
    },
}

/// Deterministic lockstep master: frames advance only on explicit `step`
/// calls, each broadcast as a `FrameOrder`, and the master refuses to step
/// again until every slave has acknowledged the previous frame.
pub struct DeterministicMasterController {
    writer: Box<dyn DataWriter>,
    reader: Box<dyn DataReader>,
    slaves: Vec<NodeId>,
    config: LockstepConfig,
    state: GlobalTime,
    next_frame_id: u64,
    seq: SequenceNumber,
    pending_acks: HashSet<NodeId>,
    armed: bool,
}

impl DeterministicMasterController {
    pub fn new(
        writer: Box<dyn DataWriter>,
        reader: Box<dyn DataReader>,
        slaves: Vec<NodeId>,
        config: LockstepConfig,
    ) -> Self {
        Self {
            writer,
            reader,
            slaves,
            config,
            state: GlobalTime::zero(),
            next_frame_id: 1,
            seq: 0,
            pending_acks: HashSet::new(),
            armed: false,
        }
    }

    /// Orders one frame across the cluster. Refuses while acks for the
    /// previous frame are outstanding.
    pub fn step(&mut self) -> Result<(), LockstepError> {
        self.drain_acks();
        if !self.pending_acks.is_empty() {
            let mut waiting_on: Vec<NodeId> = self.pending_acks.iter().copied().collect();
            waiting_on.sort_unstable();
            warn!(
                "lockstep frame {} still waiting on {:?}",
                self.next_frame_id - 1,
                waiting_on
            );
            return Err(LockstepError::StepRefused {
                frame_id: self.next_frame_id - 1,
                waiting_on,
            });
        }
        self.issue_order();
        Ok(())
    }

    /// Steps despite missing acks. The warning stands; the divergence is
    /// the caller's to own.
    pub fn step_forced(&mut self) {
        self.drain_acks();
        if !self.pending_acks.is_empty() {
            warn!(
                "lockstep forced past unacknowledged frame {}; slaves {:?} are behind",
                self.next_frame_id - 1,
                self.pending_acks
            );
        }
        self.issue_order();
    }

    pub fn waiting_on(&mut self) -> Vec<NodeId> {
        self.drain_acks();
        let mut waiting: Vec<NodeId> = self.pending_acks.iter().copied().collect();
        waiting.sort_unstable();
        waiting
    }

    fn issue_order(&mut self) {
        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;
        self.seq = self.seq.wrapping_add(1);
        let order = FrameOrder {
            frame_id,
            fixed_delta: self.config.fixed_delta_seconds,
            seq: self.seq,
        };
        if let Err(error) = self.writer.write(DataSample::alive(Payload::Order(order))) {
            warn!("frame order {} dropped by transport: {}", frame_id, error);
        }
        self.pending_acks = self.slaves.iter().copied().collect();
        self.armed = true;
    }

    fn drain_acks(&mut self) {
        for sample in self.reader.take_samples() {
            let Payload::Ack(ack) = sample.payload else {
                continue;
            };
            if ack.frame_id == self.next_frame_id - 1 {
                self.pending_acks.remove(&ack.node_id);
            }
        }
    }
}

impl TimeController for DeterministicMasterController {
    fn advance(&mut self, _raw_delta: f32) -> Option<GlobalTime> {
        self.drain_acks();
        if !self.armed {
            return None;
        }
        self.armed = false;

        let delta = self.config.fixed_delta_seconds;
        self.state.frame = self.next_frame_id - 1;
        self.state.delta = delta;
        self.state.total += delta as f64;
        self.state.scale = 1.0;
        self.state.unscaled_delta = delta;
        self.state.unscaled_total += delta as f64;
        Some(self.state)
    }

    fn set_time_scale(&mut self, _scale: f32) {
        warn!("time scale has no meaning in deterministic lockstep; ignoring");
    }

    fn time_scale(&self) -> f32 {
        1.0
    }

    fn mode(&self) -> TimeMode {
        TimeMode::Deterministic
    }

    fn current_state(&self) -> GlobalTime {
        self.state
    }

    fn seed_state(&mut self, state: GlobalTime) {
        self.state = state;
        self.next_frame_id = state.frame + 1;
        self.pending_acks.clear();
        self.armed = false;
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
