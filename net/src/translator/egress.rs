use std::collections::{HashMap, HashSet};

use tern_host::{CommandBuffer, World};
use tern_shared::{
    DataSample, DataWriter, EntityMaster, EntityState, GlobalTime, InstanceId, LifecycleState,
    MasterFlags, NetworkEntityId, NodeId, Payload, TransportError, WeaponState,
};

use crate::components::{
    NetworkEntityInfo, Position, Velocity, WeaponStates, FORCE_NETWORK_PUBLISH,
    NETWORK_ENTITY_INFO, POSITION, SPAWN_FLAG_RELIABLE_INIT, VELOCITY, WEAPON_STATES,
};
use crate::identity::NetworkIdentityMap;
use crate::ownership::{owns_descriptor, resolve_owner};
use crate::translator::EgressTranslator;

fn is_active(world: &World, entity: tern_shared::Entity) -> bool {
    world.lifecycle(entity) == Ok(LifecycleState::Active)
}

fn forced(world: &World, entity: tern_shared::Entity) -> bool {
    world.has_component(entity, FORCE_NETWORK_PUBLISH)
}

/// Publishes the authoritative `EntityMaster` for locally-owned entities:
/// once when the entity first becomes publishable, and again whenever a
/// publish is forced.
pub struct MasterEgressTranslator {
    published: HashSet<NetworkEntityId>,
}

impl MasterEgressTranslator {
    pub fn new() -> Self {
        Self {
            published: HashSet::new(),
        }
    }
}

impl Default for MasterEgressTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl EgressTranslator for MasterEgressTranslator {
    fn scan_and_publish(
        &mut self,
        world: &World,
        ids: &NetworkIdentityMap,
        local_node: NodeId,
        writer: &mut dyn DataWriter,
        _cmd: &mut CommandBuffer,
        _time: &GlobalTime,
    ) -> Result<(), TransportError> {
        for entity in world.query().with(NETWORK_ENTITY_INFO).iter() {
            if !is_active(world, entity) {
                continue;
            }
            let Some(info) = world.get_component::<NetworkEntityInfo>(entity, NETWORK_ENTITY_INFO)
            else {
                continue;
            };
            if resolve_owner(world, entity, NETWORK_ENTITY_INFO, 0) != Some(local_node) {
                continue;
            }
            let Some(network_id) = ids.network_id(entity) else {
                continue;
            };
            if self.published.contains(&network_id) && !forced(world, entity) {
                continue;
            }

            let master = EntityMaster {
                network_id,
                dis_type: info.dis_type,
                primary_owner_id: local_node,
                flags: MasterFlags {
                    reliable_init: info.flags & SPAWN_FLAG_RELIABLE_INIT != 0,
                },
                name: String::new(),
            };
            writer.write(DataSample::alive(Payload::Master(master)))?;
            self.published.insert(network_id);
        }
        Ok(())
    }
}

/// Publishes kinematic state for locally-owned active entities whenever
/// the entity changed since the last publish.
pub struct StateEgressTranslator {
    last_published: HashMap<NetworkEntityId, u64>,
}

impl StateEgressTranslator {
    pub fn new() -> Self {
        Self {
            last_published: HashMap::new(),
        }
    }
}

impl Default for StateEgressTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl EgressTranslator for StateEgressTranslator {
    fn scan_and_publish(
        &mut self,
        world: &World,
        ids: &NetworkIdentityMap,
        local_node: NodeId,
        writer: &mut dyn DataWriter,
        _cmd: &mut CommandBuffer,
        time: &GlobalTime,
    ) -> Result<(), TransportError> {
        for entity in world.query().with(POSITION).iter() {
            if !is_active(world, entity) {
                continue;
            }
            if resolve_owner(world, entity, POSITION, 0) != Some(local_node) {
                continue;
            }
            let Some(network_id) = ids.network_id(entity) else {
                continue;
            };
            let Some(version) = world.entity_version(entity) else {
                continue;
            };
            let unchanged = self.last_published.get(&network_id) == Some(&version);
            if unchanged && !forced(world, entity) {
                continue;
            }

            let position = world
                .get_component::<Position>(entity, POSITION)
                .copied()
                .unwrap_or_default();
            let velocity = world
                .get_component::<Velocity>(entity, VELOCITY)
                .copied()
                .unwrap_or_default();
            let state = EntityState {
                network_id,
                owner_id: local_node,
                location: position.value,
                velocity: velocity.value,
                timestamp: time.total,
            };
            writer.write(DataSample::alive(Payload::State(state)))?;
            self.last_published.insert(network_id, version);
        }
        Ok(())
    }
}

/// Publishes every locally-owned weapon instance; ownership is resolved
/// per instance, so two nodes can each publish their own turret of the
/// same entity.
pub struct WeaponEgressTranslator {
    last_published: HashMap<(NetworkEntityId, InstanceId), u64>,
}

impl WeaponEgressTranslator {
    pub fn new() -> Self {
        Self {
            last_published: HashMap::new(),
        }
    }
}

impl Default for WeaponEgressTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl EgressTranslator for WeaponEgressTranslator {
    fn scan_and_publish(
        &mut self,
        world: &World,
        ids: &NetworkIdentityMap,
        local_node: NodeId,
        writer: &mut dyn DataWriter,
        _cmd: &mut CommandBuffer,
        _time: &GlobalTime,
    ) -> Result<(), TransportError> {
        for entity in world.query().with(WEAPON_STATES).iter() {
            if !is_active(world, entity) {
                continue;
            }
            let Some(states) = world.get_managed::<WeaponStates>(entity, WEAPON_STATES) else {
                continue;
            };
            let Some(network_id) = ids.network_id(entity) else {
                continue;
            };
            let Some(version) = world.entity_version(entity) else {
                continue;
            };
            let force = forced(world, entity);

            let mut instances: Vec<InstanceId> = states.weapons.keys().copied().collect();
            instances.sort_unstable();
            for instance_id in instances {
                if !owns_descriptor(world, entity, WEAPON_STATES, instance_id, local_node) {
                    continue;
                }
                let key = (network_id, instance_id);
                let unchanged = self.last_published.get(&key) == Some(&version);
                if unchanged && !force {
                    continue;
                }
                let entry = states.weapons[&instance_id];
                let weapon = WeaponState {
                    network_id,
                    instance_id,
                    status: entry.status,
                    azimuth: entry.azimuth,
                    elevation: entry.elevation,
                    ammo: entry.ammo,
                };
                writer.write(DataSample::alive(Payload::Weapon(weapon)))?;
                self.last_published.insert(key, version);
            }
        }
        Ok(())
    }
}
