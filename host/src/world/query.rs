use tern_shared::{ComponentMask, ComponentTypeId, Entity, LifecycleState};

use crate::world::World;

/// Builder for a bitmask query over a world.
///
/// Default queries never yield ghosts; placeholder entities only become
/// visible through [`Query::include_all`].
pub struct Query<'w> {
    world: &'w World,
    mask: ComponentMask,
    include_all: bool,
}

impl<'w> Query<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        Self {
            world,
            mask: ComponentMask::new(),
            include_all: false,
        }
    }

    pub fn with(mut self, type_id: ComponentTypeId) -> Self {
        self.mask.set(type_id);
        self
    }

    pub fn with_mask(mut self, mask: &ComponentMask) -> Self {
        self.mask = self.mask.union(mask);
        self
    }

    /// Includes ghosts and every other lifecycle stage short of destroyed.
    pub fn include_all(mut self) -> Self {
        self.include_all = true;
        self
    }

    pub fn iter(self) -> QueryIter<'w> {
        QueryIter {
            world: self.world,
            mask: self.mask,
            include_all: self.include_all,
            next_index: 0,
        }
    }
}

/// Finite, non-restartable iterator over matching entities in index order.
pub struct QueryIter<'w> {
    world: &'w World,
    mask: ComponentMask,
    include_all: bool,
    next_index: usize,
}

impl<'w> Iterator for QueryIter<'w> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        while self.next_index < self.world.capacity() {
            let index = self.next_index;
            self.next_index += 1;

            let Some(header) = self.world.header_at(index) else {
                continue;
            };
            if !header.alive {
                continue;
            }
            if !self.include_all && header.state == LifecycleState::Ghost {
                continue;
            }
            if !header.mask.contains_all(&self.mask) {
                continue;
            }
            return Some(Entity::new(index as i32, header.generation));
        }
        None
    }
}
