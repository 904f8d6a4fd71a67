//! # Tern Net
//! The distributed layer of the tern simulation host: it reconciles
//! entities arriving over the wire in any packet order, coordinates
//! per-descriptor ownership across peer nodes, gates reliable entity
//! initialisation on peer acknowledgement, and keeps simulated time
//! phase-locked or in deterministic lockstep across the cluster.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod components;
mod ghost;
mod identity;
mod lifecycle;
mod ownership;
mod reliable_init;
mod spawner;
mod stack;
mod template;
mod time;
mod topology;
mod translator;

pub use components::{
    register_network_components, register_network_events, ConstructionOrder,
    DescriptorAuthorityChanged, DescriptorOwnership, DestructionOrder, NetworkEntityInfo,
    NetworkIdentity, NetworkOwnership, NetworkSpawnRequest, NetworkTarget, Position, Velocity,
    WeaponEntry, WeaponStates, DESCRIPTOR_OWNERSHIP, EVENT_AUTHORITY_CHANGED,
    EVENT_CONSTRUCTION_ORDER, EVENT_DESTRUCTION_ORDER, FORCE_NETWORK_PUBLISH, NETWORK_ENTITY_INFO,
    NETWORK_IDENTITY, NETWORK_OWNERSHIP, NETWORK_SPAWN_REQUEST, NETWORK_TARGET,
    PENDING_NETWORK_ACK, POSITION, SPAWN_FLAG_RELIABLE_INIT, VELOCITY, WEAPON_STATES,
};
pub use ghost::{GhostConfig, GhostTracker};
pub use identity::{IdentityError, NetworkIdentityMap};
pub use lifecycle::{DefaultLifecycleManager, LifecycleManager};
pub use ownership::{owns_descriptor, resolve_owner, OwnershipStrategy, PrimaryOwnerStrategy};
pub use reliable_init::{ReliableInitConfig, ReliableInitGateway};
pub use stack::NetworkStack;
pub use template::{EntityTemplate, TemplateDatabase};
pub use time::{
    ContinuousMasterController, ContinuousSlaveController, DeterministicMasterController,
    DeterministicSlaveController, LockstepConfig, LockstepError, ModeSwitchConfig, PllConfig,
    TimeModeCoordinator,
};
pub use topology::{NetworkTopology, StaticTopology};
pub use translator::{
    EgressTranslator, MasterEgressTranslator, StateEgressTranslator, WeaponEgressTranslator,
};
