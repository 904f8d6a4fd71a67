use thiserror::Error;

use tern_shared::{ComponentTypeId, Entity, LifecycleState};

/// Errors that can occur during world operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The handle's generation no longer matches its slot: the entity it
    /// referred to is dead.
    #[error("stale entity handle {entity:?}")]
    StaleEntity { entity: Entity },

    #[error("component type {type_id} is not registered")]
    TypeNotRegistered { type_id: ComponentTypeId },

    #[error("component type {type_id} is already registered")]
    TypeAlreadyRegistered { type_id: ComponentTypeId },

    #[error("component type {type_id} out of range (max {max})")]
    TypeIdOutOfRange { type_id: ComponentTypeId, max: usize },

    #[error("entity {entity:?} does not carry component type {type_id}")]
    ComponentMissing {
        entity: Entity,
        type_id: ComponentTypeId,
    },

    #[error("component type {type_id} expects {column} bytes, got {value}")]
    SizeMismatch {
        type_id: ComponentTypeId,
        column: usize,
        value: usize,
    },

    #[error("component type {type_id} is managed; plain-old-data access is invalid")]
    ManagedTypeMismatch { type_id: ComponentTypeId },
}

/// Errors that can occur during lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The lifecycle lattice is monotonic; moving backwards is a protocol
    /// defect on the caller's side.
    #[error("lifecycle of {entity:?} may not regress from {from:?} to {to:?}")]
    Regression {
        entity: Entity,
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("stale entity handle {entity:?}")]
    Stale { entity: Entity },
}
