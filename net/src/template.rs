use std::any::Any;
use std::collections::HashMap;

use bytemuck::Pod;

use tern_host::{World, WorldError};
use tern_shared::{ComponentTypeId, DisType, Entity};

type ManagedFactory = Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// Blueprint applied to an entity by the spawner.
///
/// Application can preserve pre-existing component values: that is how a
/// ghost's network-observed position survives promotion.
pub struct EntityTemplate {
    name: String,
    pod_defaults: Vec<(ComponentTypeId, Vec<u8>)>,
    managed_defaults: Vec<(ComponentTypeId, ManagedFactory)>,
    descriptors: Vec<ComponentTypeId>,
}

impl EntityTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pod_defaults: Vec::new(),
            managed_defaults: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_component<T: Pod>(mut self, type_id: ComponentTypeId, value: T) -> Self {
        self.pod_defaults
            .push((type_id, bytemuck::bytes_of(&value).to_vec()));
        self
    }

    pub fn with_marker(mut self, type_id: ComponentTypeId) -> Self {
        self.pod_defaults.push((type_id, Vec::new()));
        self
    }

    pub fn with_managed<T: Clone + Send + Sync + 'static>(
        mut self,
        type_id: ComponentTypeId,
        value: T,
    ) -> Self {
        self.managed_defaults
            .push((type_id, Box::new(move || Box::new(value.clone()))));
        self
    }

    /// Declares a network descriptor this template carries; the spawner
    /// assigns per-instance ownership for each declared descriptor.
    pub fn with_descriptor(mut self, type_id: ComponentTypeId) -> Self {
        self.descriptors.push(type_id);
        self
    }

    pub fn descriptors(&self) -> &[ComponentTypeId] {
        &self.descriptors
    }

    /// Applies the template. With `preserve_existing`, components the
    /// entity already carries keep their values; otherwise the template
    /// overwrites.
    pub fn apply(
        &self,
        world: &mut World,
        entity: Entity,
        preserve_existing: bool,
    ) -> Result<(), WorldError> {
        for (type_id, bytes) in &self.pod_defaults {
            if preserve_existing && world.has_component(entity, *type_id) {
                continue;
            }
            world.add_component_raw(entity, *type_id, bytes)?;
        }
        for (type_id, factory) in &self.managed_defaults {
            if preserve_existing && world.has_component(entity, *type_id) {
                continue;
            }
            world.set_managed_boxed(entity, *type_id, factory())?;
        }
        Ok(())
    }
}

/// Template lookup keyed by entity category, plus per-category instance
/// counts for multi-instance descriptors.
pub struct TemplateDatabase {
    templates: HashMap<DisType, EntityTemplate>,
    instance_counts: HashMap<DisType, u32>,
}

impl TemplateDatabase {
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
            instance_counts: HashMap::new(),
        }
    }

    pub fn with_template(mut self, dis_type: DisType, template: EntityTemplate) -> Self {
        self.insert(dis_type, template);
        self
    }

    pub fn insert(&mut self, dis_type: DisType, template: EntityTemplate) {
        self.templates.insert(dis_type, template);
    }

    pub fn get(&self, dis_type: DisType) -> Option<&EntityTemplate> {
        self.templates.get(&dis_type)
    }

    /// Instances per descriptor for this category. TODO: fold this into
    /// per-template descriptor metadata once templates carry it.
    pub fn instance_count(&self, dis_type: DisType) -> u32 {
        self.instance_counts.get(&dis_type).copied().unwrap_or(1)
    }

    pub fn set_instance_count(&mut self, dis_type: DisType, count: u32) {
        self.instance_counts.insert(dis_type, count.max(1));
    }

    pub fn with_instance_count(mut self, dis_type: DisType, count: u32) -> Self {
        self.set_instance_count(dis_type, count);
        self
    }
}

impl Default for TemplateDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod template_tests {
    use super::*;
    use crate::components::{register_network_components, Position, POSITION, VELOCITY};
    use crate::components::Velocity;

    fn world() -> World {
        let mut world = World::new();
        register_network_components(&mut world).unwrap();
        world
    }

    fn tank_template() -> EntityTemplate {
        EntityTemplate::new("tank")
            .with_component(POSITION, Position::default())
            .with_component(VELOCITY, Velocity::default())
    }

    #[test]
    fn apply_overwrites_without_preserve() {
        let mut world = world();
        let entity = world.create_entity();
        world
            .add_component(
                entity,
                POSITION,
                Position {
                    value: [50.0, 0.0, 0.0],
                },
            )
            .unwrap();

        tank_template().apply(&mut world, entity, false).unwrap();
        assert_eq!(
            world.get_component::<Position>(entity, POSITION),
            Some(&Position::default())
        );
    }

    #[test]
    fn apply_preserves_existing_values() {
        let mut world = world();
        let entity = world.create_entity();
        world
            .add_component(
                entity,
                POSITION,
                Position {
                    value: [50.0, 0.0, 0.0],
                },
            )
            .unwrap();

        tank_template().apply(&mut world, entity, true).unwrap();
        assert_eq!(
            world.get_component::<Position>(entity, POSITION),
            Some(&Position {
                value: [50.0, 0.0, 0.0]
            })
        );
        // Absent components are still added.
        assert!(world.has_component(entity, VELOCITY));
    }

    #[test]
    fn instance_count_defaults_to_one() {
        let db = TemplateDatabase::new().with_instance_count(7, 2);
        assert_eq!(db.instance_count(7), 2);
        assert_eq!(db.instance_count(8), 1);
    }
}
