use std::collections::HashMap;

use log::warn;

use tern_host::World;
use tern_shared::{Entity, FrameIndex, LifecycleState};

use crate::identity::NetworkIdentityMap;

/// Configuration for ghost expiry
#[derive(Clone, Copy, Debug)]
pub struct GhostConfig {
    /// Frames a ghost may wait for its authoritative master descriptor
    /// before it is discarded.
    pub timeout_frames: u64,
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self { timeout_frames: 300 }
    }
}

/// Tracks when each ghost was materialised so abandoned placeholders do
/// not accumulate forever.
pub struct GhostTracker {
    config: GhostConfig,
    created: HashMap<Entity, FrameIndex>,
}

impl GhostTracker {
    pub fn new(config: GhostConfig) -> Self {
        Self {
            config,
            created: HashMap::new(),
        }
    }

    pub fn track(&mut self, entity: Entity, frame: FrameIndex) {
        self.created.insert(entity, frame);
    }

    /// Called when a ghost is promoted or destroyed through the normal
    /// protocol path.
    pub fn untrack(&mut self, entity: Entity) {
        self.created.remove(&entity);
    }

    pub fn tracked(&self) -> usize {
        self.created.len()
    }

    /// Destroys ghosts that outlived the timeout and erases their id
    /// mappings. Returns how many were reaped.
    pub fn sweep(
        &mut self,
        world: &mut World,
        ids: &mut NetworkIdentityMap,
        frame: FrameIndex,
    ) -> usize {
        let timeout = self.config.timeout_frames;
        let expired: Vec<Entity> = self
            .created
            .iter()
            .filter(|(_, created)| frame.saturating_sub(**created) >= timeout)
            .map(|(entity, _)| *entity)
            .collect();

        let mut reaped = 0;
        for entity in expired {
            self.created.remove(&entity);
            if world.lifecycle(entity) != Ok(LifecycleState::Ghost) {
                continue;
            }
            let network_id = ids.remove_by_entity(entity);
            warn!(
                "ghost {:?} (network id {:?}) timed out after {} frames",
                entity, network_id, timeout
            );
            if world.destroy_entity(entity).is_ok() {
                reaped += 1;
            }
        }
        reaped
    }
}
