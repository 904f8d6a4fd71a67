use std::collections::HashMap;

use thiserror::Error;

use tern_shared::{ComponentMask, EventTypeMask};

use crate::module::{Module, ModuleTier};
use crate::view::SimView;

/// Execution phases of an in-process system group, in authoritative order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Input,
    BeforeSync,
    Simulation,
    PostSimulation,
    Export,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Input,
        Phase::BeforeSync,
        Phase::Simulation,
        Phase::PostSimulation,
        Phase::Export,
    ];
}

/// Errors that can occur while building a system schedule
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("dependency cycle in phase {phase:?} among systems {names:?}")]
    DependencyCycle {
        phase: Phase,
        names: Vec<&'static str>,
    },

    #[error("system {system} orders against unknown system {dependency}")]
    UnknownDependency {
        system: &'static str,
        dependency: &'static str,
    },
}

type SystemFn = Box<dyn FnMut(&mut SimView, f32) + Send>;

pub struct SystemDescriptor {
    name: &'static str,
    phase: Phase,
    after: Vec<&'static str>,
    before: Vec<&'static str>,
    run: SystemFn,
}

impl SystemDescriptor {
    pub fn new(
        name: &'static str,
        phase: Phase,
        run: impl FnMut(&mut SimView, f32) + Send + 'static,
    ) -> Self {
        Self {
            name,
            phase,
            after: Vec::new(),
            before: Vec::new(),
            run: Box::new(run),
        }
    }

    /// This system runs after `other` within its phase.
    pub fn after(mut self, other: &'static str) -> Self {
        self.after.push(other);
        self
    }

    /// This system runs before `other` within its phase.
    pub fn before(mut self, other: &'static str) -> Self {
        self.before.push(other);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

pub struct ScheduleBuilder {
    systems: Vec<SystemDescriptor>,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    pub fn add(mut self, system: SystemDescriptor) -> Self {
        self.systems.push(system);
        self
    }

    /// Topologically sorts each phase with Kahn's algorithm. Dependencies
    /// that cross phases are ignored: the phase sequence already orders
    /// them. Cycles are rejected here, before the kernel ever runs.
    pub fn build(self) -> Result<SystemSchedule, ScheduleError> {
        let all_names: HashMap<&'static str, Phase> = self
            .systems
            .iter()
            .map(|system| (system.name, system.phase))
            .collect();

        let mut by_phase: HashMap<Phase, Vec<SystemDescriptor>> = HashMap::new();
        for system in self.systems {
            by_phase.entry(system.phase).or_default().push(system);
        }

        let mut ordered = Vec::new();
        for phase in Phase::ALL {
            let Some(systems) = by_phase.remove(&phase) else {
                continue;
            };
            ordered.extend(sort_phase(phase, systems, &all_names)?);
        }

        Ok(SystemSchedule { ordered })
    }
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_phase(
    phase: Phase,
    systems: Vec<SystemDescriptor>,
    all_names: &HashMap<&'static str, Phase>,
) -> Result<Vec<SystemDescriptor>, ScheduleError> {
    let index_of: HashMap<&'static str, usize> = systems
        .iter()
        .enumerate()
        .map(|(index, system)| (system.name, index))
        .collect();

    // edges[from] lists systems that must wait for `from`.
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); systems.len()];
    let mut indegree: Vec<usize> = vec![0; systems.len()];

    for (index, system) in systems.iter().enumerate() {
        for dependency in &system.after {
            match index_of.get(dependency) {
                Some(&from) => {
                    edges[from].push(index);
                    indegree[index] += 1;
                }
                None if all_names.contains_key(dependency) => {
                    // Cross-phase ordering: guaranteed by the phase sequence.
                }
                None => {
                    return Err(ScheduleError::UnknownDependency {
                        system: system.name,
                        dependency,
                    })
                }
            }
        }
        for dependent in &system.before {
            match index_of.get(dependent) {
                Some(&to) => {
                    edges[index].push(to);
                    indegree[to] += 1;
                }
                None if all_names.contains_key(dependent) => {}
                None => {
                    return Err(ScheduleError::UnknownDependency {
                        system: system.name,
                        dependency: dependent,
                    })
                }
            }
        }
    }

    // Kahn's algorithm, picking the lowest registration index first so the
    // result is deterministic.
    let mut ready: Vec<usize> = indegree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| index)
        .collect();
    let mut order: Vec<usize> = Vec::with_capacity(systems.len());

    while !ready.is_empty() {
        let slot = ready
            .iter()
            .enumerate()
            .min_by_key(|(_, index)| **index)
            .map(|(slot, _)| slot)
            .expect("ready list is non-empty");
        let index = ready.swap_remove(slot);
        order.push(index);
        for &next in &edges[index] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(next);
            }
        }
    }

    if order.len() != systems.len() {
        let stuck: Vec<&'static str> = systems
            .iter()
            .enumerate()
            .filter(|(index, _)| !order.contains(index))
            .map(|(_, system)| system.name)
            .collect();
        return Err(ScheduleError::DependencyCycle { phase, names: stuck });
    }

    let mut slots: Vec<Option<SystemDescriptor>> = systems.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .map(|index| slots[index].take().expect("each index appears once"))
        .collect())
}

/// A validated, phase-ordered list of systems.
pub struct SystemSchedule {
    ordered: Vec<SystemDescriptor>,
}

impl SystemSchedule {
    pub fn run(&mut self, view: &mut SimView, delta: f32) {
        for system in &mut self.ordered {
            (system.run)(view, delta);
        }
    }

    pub fn order(&self) -> Vec<&'static str> {
        self.ordered.iter().map(|system| system.name).collect()
    }
}

/// A module assembled from scheduled in-process systems.
pub struct ScheduledModule {
    name: String,
    tier: ModuleTier,
    update_frequency: u32,
    components: ComponentMask,
    events: EventTypeMask,
    schedule: SystemSchedule,
}

impl ScheduledModule {
    pub fn new(name: impl Into<String>, tier: ModuleTier, schedule: SystemSchedule) -> Self {
        Self {
            name: name.into(),
            tier,
            update_frequency: 1,
            components: ComponentMask::all(),
            events: EventTypeMask::all(),
            schedule,
        }
    }

    pub fn with_update_frequency(mut self, frequency: u32) -> Self {
        self.update_frequency = frequency.max(1);
        self
    }

    pub fn with_component_requirements(mut self, mask: ComponentMask) -> Self {
        self.components = mask;
        self
    }

    pub fn with_event_requirements(mut self, mask: EventTypeMask) -> Self {
        self.events = mask;
        self
    }
}

impl Module for ScheduledModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> ModuleTier {
        self.tier
    }

    fn update_frequency(&self) -> u32 {
        self.update_frequency
    }

    fn component_requirements(&self) -> ComponentMask {
        self.components
    }

    fn event_requirements(&self) -> EventTypeMask {
        self.events
    }

    fn tick(&mut self, view: &mut SimView, delta: f32) {
        self.schedule.run(view, delta);
    }
}
