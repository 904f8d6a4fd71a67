use std::sync::Arc;

use crossbeam::queue::SegQueue;

use tern_shared::{ComponentMask, EventTypeMask, FrameIndex, GlobalTime};

use crate::accumulator::EventAccumulator;
use crate::provider::replica::{Replica, SyncStats};
use crate::provider::SnapshotProvider;
use crate::world::World;

/// Lock-free stack of pooled replicas.
pub struct ReplicaPool {
    stack: SegQueue<Box<Replica>>,
}

impl ReplicaPool {
    /// Pre-warms the pool so steady-state acquisition never allocates.
    pub fn new(prewarm: usize) -> Self {
        let stack = SegQueue::new();
        for _ in 0..prewarm {
            stack.push(Box::new(Replica::new()));
        }
        Self { stack }
    }

    pub fn acquire(&self) -> Box<Replica> {
        self.stack
            .pop()
            .unwrap_or_else(|| Box::new(Replica::new()))
    }

    pub fn release(&self, replica: Box<Replica>) {
        self.stack.push(replica);
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Snapshot-on-demand: a pooled replica filter-synced to the module's
/// component interest, with events flushed through the module's event-type
/// mask.
///
/// The provider-level high-water mark survives replica rotation, which is
/// what preserves the exactly-once event guarantee for slow modules.
pub struct OnDemandProvider {
    pool: Arc<ReplicaPool>,
    component_mask: ComponentMask,
    include_transient: bool,
    current: Option<Box<Replica>>,
    last_seen: Option<FrameIndex>,
    last_stats: SyncStats,
}

impl OnDemandProvider {
    pub fn new(component_mask: ComponentMask, pool_size: usize) -> Self {
        Self::with_pool(component_mask, Arc::new(ReplicaPool::new(pool_size)))
    }

    /// Builds against an existing pool shared between providers with
    /// compatible filters.
    pub fn with_pool(component_mask: ComponentMask, pool: Arc<ReplicaPool>) -> Self {
        Self {
            pool,
            component_mask,
            include_transient: false,
            current: None,
            last_seen: None,
            last_stats: SyncStats::default(),
        }
    }

    /// Opts this provider into transient components, for debug and
    /// diagnostic modules.
    pub fn include_transient(mut self) -> Self {
        self.include_transient = true;
        self
    }

    pub fn last_sync_stats(&self) -> SyncStats {
        self.last_stats
    }

    pub fn pool(&self) -> &Arc<ReplicaPool> {
        &self.pool
    }
}

impl SnapshotProvider for OnDemandProvider {
    fn update(
        &mut self,
        live: &World,
        accumulator: &EventAccumulator,
        _time: &GlobalTime,
        event_mask: &EventTypeMask,
    ) {
        let mut replica = self.pool.acquire();
        self.last_stats = replica.sync_from(live, Some(&self.component_mask), self.include_transient);
        self.last_seen = accumulator.flush_to_replica(
            replica.world_mut().bus_mut(),
            self.last_seen,
            Some(event_mask),
        );
        self.current = Some(replica);
    }

    fn view(&self) -> &World {
        self.current
            .as_ref()
            .expect("view requested before provider update")
            .world()
    }

    fn release(&mut self) {
        if let Some(mut replica) = self.current.take() {
            replica.soft_clear_events();
            self.pool.release(replica);
        }
    }

    fn last_seen_tick(&self) -> Option<FrameIndex> {
        self.last_seen
    }
}
