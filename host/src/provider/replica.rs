use std::collections::HashMap;

use tern_shared::{ComponentMask, ComponentTypeId};

use crate::world::{chunks_for, ColumnSlot, World};

/// Per-sync accounting; the dirty-chunk skip rate is the headline number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub chunks_total: usize,
    pub chunks_skipped: usize,
}

impl SyncStats {
    pub fn skip_rate(&self) -> f64 {
        if self.chunks_total == 0 {
            return 1.0;
        }
        self.chunks_skipped as f64 / self.chunks_total as f64
    }
}

/// A world copy plus the per-chunk versions it last saw from its source.
///
/// Syncing compares source chunk versions against the recorded ones and
/// copies only chunks that moved; at steady state most chunks are skipped.
/// Unknown source columns are auto-registered on first sight, so callers
/// never pre-register component types against replicas.
pub struct Replica {
    world: World,
    last_seen_headers: Vec<u64>,
    last_seen_columns: HashMap<ComponentTypeId, Vec<u64>>,
}

impl Replica {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            last_seen_headers: Vec::new(),
            last_seen_columns: HashMap::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Clears the replica's event buffers, retaining allocations. Component
    /// data stays: the dirty-chunk bookkeeping keeps it coherent.
    pub(crate) fn soft_clear_events(&mut self) {
        self.world.bus_mut().clear();
    }

    /// Copies changed chunks from `src`. `filter` bounds the columns copied
    /// (`None` copies everything); transient columns are skipped unless
    /// `include_transient` opts in.
    pub(crate) fn sync_from(
        &mut self,
        src: &World,
        filter: Option<&ComponentMask>,
        include_transient: bool,
    ) -> SyncStats {
        let mut stats = SyncStats::default();

        self.world.ensure_entity_capacity(src.capacity());

        let header_chunks = src.header_chunk_count();
        if self.last_seen_headers.len() < header_chunks {
            self.last_seen_headers.resize(header_chunks, 0);
        }
        for chunk in 0..header_chunks {
            let version = src.header_chunk_version(chunk);
            stats.chunks_total += 1;
            if self.last_seen_headers[chunk] == version {
                stats.chunks_skipped += 1;
                continue;
            }
            self.world.copy_header_chunk_from(src, chunk);
            self.last_seen_headers[chunk] = version;
        }

        for type_id in src.registered_type_ids() {
            if let Some(filter) = filter {
                if !filter.test(type_id) {
                    continue;
                }
            }
            if !include_transient && src.transient_mask().test(type_id) {
                continue;
            }

            let src_slot = src.slot(type_id).expect("listed type id is registered");
            if self.world.slot(type_id).is_none() {
                self.world
                    .register_like(type_id, src_slot)
                    .expect("replica schema registration");
            }

            let chunks = chunks_for(src.capacity());
            let seen = self.last_seen_columns.entry(type_id).or_default();
            if seen.len() < chunks {
                seen.resize(chunks, 0);
            }

            let dst_slot = self
                .world
                .slot_mut(type_id)
                .expect("just ensured registration");
            for chunk in 0..chunks {
                let version = src_slot.chunk_version(chunk);
                stats.chunks_total += 1;
                if seen[chunk] == version {
                    stats.chunks_skipped += 1;
                    continue;
                }
                match (&mut *dst_slot, src_slot) {
                    (ColumnSlot::Pod(dst), ColumnSlot::Pod(src_column)) => {
                        dst.copy_chunk_from(src_column, chunk);
                    }
                    (ColumnSlot::Managed(dst), ColumnSlot::Managed(src_column)) => {
                        dst.copy_chunk_from(src_column, chunk);
                    }
                    _ => unreachable!("column kind never changes for a type id"),
                }
                seen[chunk] = version;
            }
        }

        stats
    }
}

impl Default for Replica {
    fn default() -> Self {
        Self::new()
    }
}
