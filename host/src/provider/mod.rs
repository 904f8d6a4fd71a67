use tern_shared::{EventTypeMask, FrameIndex, GlobalTime};

use crate::accumulator::EventAccumulator;
use crate::world::World;

mod full_replica;
mod on_demand;
mod replica;
mod shared_snapshot;

pub use full_replica::FullReplicaProvider;
pub use on_demand::{OnDemandProvider, ReplicaPool};
pub use replica::{Replica, SyncStats};
pub use shared_snapshot::{SharedSnapshotGroup, SharedSnapshotProvider};

/// Strategy producing a read-only world view for one module each frame.
///
/// `update` runs on the main thread between event capture and module
/// dispatch; `view` is only valid between `update` and `release`. The
/// kernel guarantees `release` runs whether the module returned or
/// panicked.
pub trait SnapshotProvider: Send {
    fn update(
        &mut self,
        live: &World,
        accumulator: &EventAccumulator,
        time: &GlobalTime,
        event_mask: &EventTypeMask,
    );

    fn view(&self) -> &World;

    fn release(&mut self);

    /// High-water mark of the event history this provider's view has seen.
    fn last_seen_tick(&self) -> Option<FrameIndex>;
}
