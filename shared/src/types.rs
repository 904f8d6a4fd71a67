/// Identifier of a peer node in the simulation cluster.
pub type NodeId = u16;

/// Stable peer-assigned identity of a replicated entity. Never regenerated
/// locally.
pub type NetworkEntityId = i64;

/// Monotonic frame counter of a live world.
pub type FrameIndex = u64;

/// Identifier of a registered component column.
pub type ComponentTypeId = u32;

/// Identifier of a registered event type.
pub type EventTypeId = u32;

/// Index of one instance of a multi-instance descriptor on an entity.
pub type InstanceId = u32;

/// Simulated entity category used to key the template database.
pub type DisType = u32;

/// Lifecycle lattice of a simulated entity.
///
/// Transitions form a monotonic path; `Ghost` is the only optional stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninitialised,
    /// Locally-materialised placeholder for a remote entity whose
    /// authoritative definition has not arrived yet. Carries only
    /// network-observed fields and is excluded from default queries.
    Ghost,
    Constructing,
    Active,
    Destroying,
    Destroyed,
}

impl LifecycleState {
    /// Rank within the lifecycle lattice; transitions may only increase it.
    pub fn rank(&self) -> u8 {
        match self {
            LifecycleState::Uninitialised => 0,
            LifecycleState::Ghost => 1,
            LifecycleState::Constructing => 2,
            LifecycleState::Active => 3,
            LifecycleState::Destroying => 4,
            LifecycleState::Destroyed => 5,
        }
    }

    pub fn may_transition_to(&self, next: LifecycleState) -> bool {
        next.rank() > self.rank()
    }
}
