use std::default::Default;

use crate::breaker::BreakerConfig;
use crate::command::DEFAULT_COMMAND_BUFFER_BYTES;

/// Contains Config properties which will be used by the host [`Kernel`](crate::Kernel)
#[derive(Clone)]
pub struct HostConfig {
    /// Number of per-frame event batches the accumulator retains. A module
    /// slower than this window misses events; size it to the slowest
    /// registered update frequency.
    pub max_history_frames: usize,
    /// Replicas pre-warmed into each on-demand provider's pool.
    pub replica_pool_size: usize,
    /// Pre-size of every command buffer's opcode stream.
    pub command_buffer_initial_bytes: usize,
    /// Circuit-breaker tuning applied to every registered module.
    pub breaker: BreakerConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_history_frames: 120,
            replica_pool_size: 2,
            command_buffer_initial_bytes: DEFAULT_COMMAND_BUFFER_BYTES,
            breaker: BreakerConfig::default(),
        }
    }
}
