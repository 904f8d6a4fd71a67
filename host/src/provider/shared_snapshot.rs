use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;

use tern_shared::{ComponentMask, EventTypeMask, FrameIndex, GlobalTime};

use crate::accumulator::EventAccumulator;
use crate::provider::on_demand::ReplicaPool;
use crate::provider::replica::Replica;
use crate::provider::SnapshotProvider;
use crate::world::World;

struct GroupState {
    synced_frame: Option<FrameIndex>,
    current: Option<Arc<Replica>>,
    acquired: usize,
    last_seen: Option<FrameIndex>,
}

struct GroupInner {
    component_mask: ComponentMask,
    include_transient: bool,
    pool: ReplicaPool,
    state: Mutex<GroupState>,
}

/// A reference-counted snapshot shared by several modules with identical
/// filters: one sync per frame, the last release returns the replica to
/// the pool.
pub struct SharedSnapshotGroup {
    inner: Arc<GroupInner>,
}

impl SharedSnapshotGroup {
    pub fn new(component_mask: ComponentMask, pool_size: usize) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                component_mask,
                include_transient: false,
                pool: ReplicaPool::new(pool_size),
                state: Mutex::new(GroupState {
                    synced_frame: None,
                    current: None,
                    acquired: 0,
                    last_seen: None,
                }),
            }),
        }
    }

    /// One provider per participating module.
    pub fn provider(&self) -> SharedSnapshotProvider {
        SharedSnapshotProvider {
            group: Arc::clone(&self.inner),
            current: None,
        }
    }
}

pub struct SharedSnapshotProvider {
    group: Arc<GroupInner>,
    current: Option<Arc<Replica>>,
}

impl SnapshotProvider for SharedSnapshotProvider {
    fn update(
        &mut self,
        live: &World,
        accumulator: &EventAccumulator,
        time: &GlobalTime,
        event_mask: &EventTypeMask,
    ) {
        let mut state = self.group.state.lock();
        if state.synced_frame != Some(time.frame) {
            // First provider of the group this frame does the sync.
            let mut replica = match state.current.take() {
                Some(shared) => match Arc::try_unwrap(shared) {
                    Ok(replica) => Box::new(replica),
                    Err(_still_borrowed) => {
                        warn!("shared snapshot still referenced at sync time; allocating a fresh replica");
                        self.group.pool.acquire()
                    }
                },
                None => self.group.pool.acquire(),
            };
            replica.soft_clear_events();
            replica.sync_from(live, Some(&self.group.component_mask), self.group.include_transient);
            state.last_seen = accumulator.flush_to_replica(
                replica.world_mut().bus_mut(),
                state.last_seen,
                Some(event_mask),
            );
            state.current = Some(Arc::new(*replica));
            state.synced_frame = Some(time.frame);
            state.acquired = 0;
        }
        state.acquired += 1;
        self.current = Some(Arc::clone(state.current.as_ref().expect("just synced")));
    }

    fn view(&self) -> &World {
        self.current
            .as_ref()
            .expect("view requested before provider update")
            .world()
    }

    fn release(&mut self) {
        let Some(shared) = self.current.take() else {
            return;
        };
        drop(shared);

        let mut state = self.group.state.lock();
        state.acquired = state.acquired.saturating_sub(1);
        if state.acquired == 0 {
            // Last release disposes the snapshot back into the pool.
            if let Some(shared) = state.current.take() {
                match Arc::try_unwrap(shared) {
                    Ok(mut replica) => {
                        replica.soft_clear_events();
                        self.group.pool.release(Box::new(replica));
                    }
                    Err(shared) => {
                        state.current = Some(shared);
                    }
                }
            }
        }
    }

    fn last_seen_tick(&self) -> Option<FrameIndex> {
        self.group.state.lock().last_seen
    }
}
