//! # Tern Host
//! The single-node runtime of the tern simulation host: it owns the live
//! authoritative world, produces read-only views for modules running at
//! heterogeneous rates, and replays their deferred mutations back into the
//! world under a strict single-writer discipline.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod accumulator;
mod breaker;
mod command;
mod config;
mod kernel;
mod module;
mod provider;
mod schedule;
mod time;
mod view;
mod world;

pub use accumulator::EventAccumulator;
pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use command::{CommandBuffer, CommandTarget, PlaybackError};
pub use config::HostConfig;
pub use kernel::{FrameOutcome, Kernel, KernelError, NetworkHooks};
pub use module::{Module, ModuleTier};
pub use provider::{
    FullReplicaProvider, OnDemandProvider, Replica, ReplicaPool, SharedSnapshotGroup,
    SharedSnapshotProvider, SnapshotProvider, SyncStats,
};
pub use schedule::{
    Phase, ScheduleBuilder, ScheduleError, ScheduledModule, SystemDescriptor, SystemSchedule,
};
pub use time::{StandaloneTimeController, TimeController};
pub use view::SimView;
pub use world::{
    EventBus, LifecycleError, Query, QueryIter, World, WorldError, CHUNK_ENTITIES,
    MAX_COMPONENT_TYPES,
};
