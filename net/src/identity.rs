use std::collections::HashMap;

use thiserror::Error;

use tern_shared::{Entity, NetworkEntityId};

/// Errors that can occur during identity map operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("network id {network_id} is already mapped")]
    DuplicateNetworkId { network_id: NetworkEntityId },

    #[error("entity {entity:?} is already mapped")]
    DuplicateEntity { entity: Entity },
}

/// Bidirectional map between peer-assigned network ids and local entity
/// handles, owned by the networking stack.
///
/// Components never point back at the world; this map is the only place
/// the id↔handle relation lives.
pub struct NetworkIdentityMap {
    id_to_entity: HashMap<NetworkEntityId, Entity>,
    entity_to_id: HashMap<Entity, NetworkEntityId>,
}

impl NetworkIdentityMap {
    pub fn new() -> Self {
        Self {
            id_to_entity: HashMap::new(),
            entity_to_id: HashMap::new(),
        }
    }

    /// Insert a fresh mapping.
    ///
    /// # Panics
    ///
    /// Panics if either side is already mapped. Use
    /// [`NetworkIdentityMap::try_insert`] for non-panicking error handling.
    pub fn insert(&mut self, network_id: NetworkEntityId, entity: Entity) {
        self.try_insert(network_id, entity)
            .expect("network id mapping cannot be overwritten; remove it first")
    }

    pub fn try_insert(
        &mut self,
        network_id: NetworkEntityId,
        entity: Entity,
    ) -> Result<(), IdentityError> {
        if self.id_to_entity.contains_key(&network_id) {
            return Err(IdentityError::DuplicateNetworkId { network_id });
        }
        if self.entity_to_id.contains_key(&entity) {
            return Err(IdentityError::DuplicateEntity { entity });
        }
        self.id_to_entity.insert(network_id, entity);
        self.entity_to_id.insert(entity, network_id);
        Ok(())
    }

    pub fn entity(&self, network_id: NetworkEntityId) -> Option<Entity> {
        self.id_to_entity.get(&network_id).copied()
    }

    pub fn network_id(&self, entity: Entity) -> Option<NetworkEntityId> {
        self.entity_to_id.get(&entity).copied()
    }

    pub fn remove_by_id(&mut self, network_id: NetworkEntityId) -> Option<Entity> {
        let entity = self.id_to_entity.remove(&network_id)?;
        self.entity_to_id.remove(&entity);
        Some(entity)
    }

    pub fn remove_by_entity(&mut self, entity: Entity) -> Option<NetworkEntityId> {
        let network_id = self.entity_to_id.remove(&entity)?;
        self.id_to_entity.remove(&network_id);
        Some(network_id)
    }

    pub fn len(&self) -> usize {
        self.id_to_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_entity.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NetworkEntityId, &Entity)> {
        self.id_to_entity.iter()
    }
}

impl Default for NetworkIdentityMap {
    fn default() -> Self {
        Self::new()
    }
}
