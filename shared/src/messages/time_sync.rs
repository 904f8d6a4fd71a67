use crate::sequence::SequenceNumber;
use crate::time::TimeMode;
use crate::types::NodeId;

/// 1 Hz clock broadcast from the continuous-time master, also sent
/// immediately on a time-scale change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimePulse {
    /// Master's wall clock at send time, seconds.
    pub master_wall_ticks: f64,
    /// Master's simulated time at send time, seconds.
    pub sim_time: f64,
    pub scale: f32,
    pub seq: SequenceNumber,
}

/// Lockstep command: advance exactly one frame with the given delta.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameOrder {
    pub frame_id: u64,
    pub fixed_delta: f32,
    pub seq: SequenceNumber,
}

/// Lockstep confirmation: the named node has executed the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameAck {
    pub frame_id: u64,
    pub node_id: NodeId,
}

/// Coordinated mode change taking effect at a future barrier frame on all
/// nodes simultaneously.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwitchTimeMode {
    pub target_mode: TimeMode,
    pub barrier_frame: u64,
    pub fixed_delta: f32,
}
