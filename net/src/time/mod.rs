mod continuous_master;
mod continuous_slave;
mod coordinator;
mod lockstep_master;
mod lockstep_slave;

pub use continuous_master::ContinuousMasterController;
pub use continuous_slave::{ContinuousSlaveController, PllConfig};
pub use coordinator::{ModeSwitchConfig, TimeModeCoordinator};
pub use lockstep_master::{DeterministicMasterController, LockstepError};
pub use lockstep_slave::DeterministicSlaveController;

/// Configuration shared by the deterministic lockstep controllers
#[derive(Clone, Copy, Debug)]
pub struct LockstepConfig {
    pub fixed_delta_seconds: f32,
}

impl Default for LockstepConfig {
    fn default() -> Self {
        Self {
            fixed_delta_seconds: 1.0 / 60.0,
        }
    }
}
