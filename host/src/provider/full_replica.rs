use tern_shared::{EventTypeMask, FrameIndex, GlobalTime};

use crate::accumulator::EventAccumulator;
use crate::provider::replica::{Replica, SyncStats};
use crate::provider::SnapshotProvider;
use crate::world::World;

/// The always-on full replica: synced from the live world every frame,
/// handed out as a shared reference.
///
/// Acquisition is zero-copy and allocation-free, which is what makes this
/// the right provider for modules that run every frame.
pub struct FullReplicaProvider {
    replica: Replica,
    last_seen: Option<FrameIndex>,
    last_stats: SyncStats,
}

impl FullReplicaProvider {
    pub fn new() -> Self {
        Self {
            replica: Replica::new(),
            last_seen: None,
            last_stats: SyncStats::default(),
        }
    }

    pub fn last_sync_stats(&self) -> SyncStats {
        self.last_stats
    }
}

impl Default for FullReplicaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotProvider for FullReplicaProvider {
    fn update(
        &mut self,
        live: &World,
        accumulator: &EventAccumulator,
        _time: &GlobalTime,
        event_mask: &EventTypeMask,
    ) {
        self.replica.soft_clear_events();
        self.last_stats = self.replica.sync_from(live, None, true);
        self.last_seen = accumulator.flush_to_replica(
            self.replica.world_mut().bus_mut(),
            self.last_seen,
            Some(event_mask),
        );
    }

    fn view(&self) -> &World {
        self.replica.world()
    }

    fn release(&mut self) {}

    fn last_seen_tick(&self) -> Option<FrameIndex> {
        self.last_seen
    }
}
