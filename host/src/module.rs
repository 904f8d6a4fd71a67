use tern_shared::{ComponentMask, EventTypeMask};

use crate::view::SimView;

/// Service tier of a module; decides which snapshot provider backs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleTier {
    /// Runs every frame against the persistent full replica.
    Fast,
    /// Runs every `update_frequency` frames against a pooled, filtered
    /// snapshot; receives cumulative delta so simulation stays
    /// time-accurate.
    Slow,
}

/// A unit of application logic hosted by the kernel.
///
/// Modules never touch the live world: they read a snapshot view and
/// record mutations into the view's command buffer, which the kernel
/// replays on the owning thread after the join barrier.
pub trait Module: Send {
    fn name(&self) -> &str;

    fn tier(&self) -> ModuleTier;

    /// Frames between ticks; 1 means every frame.
    fn update_frequency(&self) -> u32 {
        1
    }

    /// Component columns this module reads. Only meaningful for the Slow
    /// tier, where it bounds what the filtered sync copies.
    fn component_requirements(&self) -> ComponentMask {
        ComponentMask::all()
    }

    /// Event types this module consumes; bounds on-demand event flushing.
    fn event_requirements(&self) -> EventTypeMask {
        EventTypeMask::all()
    }

    fn tick(&mut self, view: &mut SimView, delta: f32);
}
