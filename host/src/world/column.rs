use std::any::Any;

use crossbeam::utils::CachePadded;

use crate::world::bytes::AlignedBytes;

/// Entities per chunk; chunk versions drive the dirty-skip sync path.
pub const CHUNK_ENTITIES: usize = 64;

pub(crate) fn chunk_of(index: usize) -> usize {
    index / CHUNK_ENTITIES
}

pub(crate) fn chunks_for(entities: usize) -> usize {
    (entities + CHUNK_ENTITIES - 1) / CHUNK_ENTITIES
}

/// Dense column of plain-old-data components, addressed by entity index.
///
/// Chunk version counters are cache-line padded: they are read from sync
/// code while module threads read neighbouring chunks of the same column.
pub(crate) struct PodColumn {
    elem_size: usize,
    data: AlignedBytes,
    chunk_versions: Vec<CachePadded<u64>>,
}

impl PodColumn {
    pub fn new(elem_size: usize) -> Self {
        Self {
            elem_size,
            data: AlignedBytes::new(),
            chunk_versions: Vec::new(),
        }
    }

    pub fn new_like(&self) -> Self {
        Self::new(self.elem_size)
    }

    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    pub fn ensure_capacity(&mut self, entities: usize) {
        self.data.set_len(entities * self.elem_size);
        let chunks = chunks_for(entities);
        if self.chunk_versions.len() < chunks {
            self.chunk_versions.resize_with(chunks, || CachePadded::new(0));
        }
    }

    pub fn write(&mut self, index: usize, bytes: &[u8], version: u64) {
        debug_assert_eq!(bytes.len(), self.elem_size);
        if self.elem_size > 0 {
            self.data.write_at(index * self.elem_size, bytes);
        }
        self.touch(index, version);
    }

    pub fn read(&self, index: usize) -> &[u8] {
        if self.elem_size == 0 {
            return &[];
        }
        let offset = index * self.elem_size;
        &self.data.as_slice()[offset..offset + self.elem_size]
    }

    pub fn read_mut(&mut self, index: usize) -> &mut [u8] {
        let offset = index * self.elem_size;
        let end = offset + self.elem_size;
        &mut self.data.as_mut_slice()[offset..end]
    }

    pub fn touch(&mut self, index: usize, version: u64) {
        let chunk = chunk_of(index);
        if chunk < self.chunk_versions.len() {
            *self.chunk_versions[chunk] = version;
        }
    }

    pub fn chunk_version(&self, chunk: usize) -> u64 {
        self.chunk_versions.get(chunk).map(|v| **v).unwrap_or(0)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_versions.len()
    }

    /// Copies one chunk's worth of component bytes from `src`, adopting the
    /// source chunk version.
    pub fn copy_chunk_from(&mut self, src: &PodColumn, chunk: usize) {
        debug_assert_eq!(self.elem_size, src.elem_size);
        if self.elem_size > 0 {
            let start = chunk * CHUNK_ENTITIES * self.elem_size;
            let end = ((chunk + 1) * CHUNK_ENTITIES * self.elem_size).min(src.data.len());
            if end > start {
                self.data.write_at(start, &src.data.as_slice()[start..end]);
            }
        }
        if chunk >= self.chunk_versions.len() {
            self.chunk_versions
                .resize_with(chunk + 1, || CachePadded::new(0));
        }
        *self.chunk_versions[chunk] = src.chunk_version(chunk);
    }
}

pub(crate) type CloneFn = fn(&(dyn Any + Send + Sync)) -> Box<dyn Any + Send + Sync>;

fn clone_boxed<T: Clone + Send + Sync + 'static>(
    item: &(dyn Any + Send + Sync),
) -> Box<dyn Any + Send + Sync> {
    let concrete = item
        .downcast_ref::<T>()
        .expect("managed component type confusion");
    Box::new(concrete.clone())
}

/// Sparse column of heap components. Items are cloned into replicas through
/// the column's clone hook, so replicas need no knowledge of the concrete
/// type.
pub(crate) struct ManagedColumn {
    items: Vec<Option<Box<dyn Any + Send + Sync>>>,
    clone_fn: CloneFn,
    chunk_versions: Vec<CachePadded<u64>>,
}

impl ManagedColumn {
    pub fn new<T: Clone + Send + Sync + 'static>() -> Self {
        Self {
            items: Vec::new(),
            clone_fn: clone_boxed::<T>,
            chunk_versions: Vec::new(),
        }
    }

    pub fn new_like(&self) -> Self {
        Self {
            items: Vec::new(),
            clone_fn: self.clone_fn,
            chunk_versions: Vec::new(),
        }
    }

    pub fn ensure_capacity(&mut self, entities: usize) {
        if self.items.len() < entities {
            self.items.resize_with(entities, || None);
        }
        let chunks = chunks_for(entities);
        if self.chunk_versions.len() < chunks {
            self.chunk_versions.resize_with(chunks, || CachePadded::new(0));
        }
    }

    pub fn set(&mut self, index: usize, item: Box<dyn Any + Send + Sync>, version: u64) {
        self.items[index] = Some(item);
        self.touch(index, version);
    }

    pub fn get(&self, index: usize) -> Option<&(dyn Any + Send + Sync)> {
        self.items.get(index).and_then(|slot| slot.as_deref())
    }

    pub fn get_mut(&mut self, index: usize, version: u64) -> Option<&mut (dyn Any + Send + Sync)> {
        self.touch(index, version);
        self.items
            .get_mut(index)
            .and_then(|slot| slot.as_deref_mut())
    }

    pub fn remove(&mut self, index: usize, version: u64) {
        if index < self.items.len() {
            self.items[index] = None;
            self.touch(index, version);
        }
    }

    pub fn touch(&mut self, index: usize, version: u64) {
        let chunk = chunk_of(index);
        if chunk < self.chunk_versions.len() {
            *self.chunk_versions[chunk] = version;
        }
    }

    pub fn chunk_version(&self, chunk: usize) -> u64 {
        self.chunk_versions.get(chunk).map(|v| **v).unwrap_or(0)
    }

    pub fn copy_chunk_from(&mut self, src: &ManagedColumn, chunk: usize) {
        let start = chunk * CHUNK_ENTITIES;
        let end = ((chunk + 1) * CHUNK_ENTITIES).min(src.items.len());
        for index in start..end {
            self.items[index] = src.items[index]
                .as_ref()
                .map(|item| (src.clone_fn)(item.as_ref()));
        }
        if chunk >= self.chunk_versions.len() {
            self.chunk_versions
                .resize_with(chunk + 1, || CachePadded::new(0));
        }
        *self.chunk_versions[chunk] = src.chunk_version(chunk);
    }
}

/// A registered component column; the world's per-type-id lookup table
/// stores these directly so playback never touches a hash map.
pub(crate) enum ColumnSlot {
    Pod(PodColumn),
    Managed(ManagedColumn),
}

impl ColumnSlot {
    pub fn new_like(&self) -> ColumnSlot {
        match self {
            ColumnSlot::Pod(column) => ColumnSlot::Pod(column.new_like()),
            ColumnSlot::Managed(column) => ColumnSlot::Managed(column.new_like()),
        }
    }

    pub fn ensure_capacity(&mut self, entities: usize) {
        match self {
            ColumnSlot::Pod(column) => column.ensure_capacity(entities),
            ColumnSlot::Managed(column) => column.ensure_capacity(entities),
        }
    }

    pub fn chunk_version(&self, chunk: usize) -> u64 {
        match self {
            ColumnSlot::Pod(column) => column.chunk_version(chunk),
            ColumnSlot::Managed(column) => column.chunk_version(chunk),
        }
    }

    pub fn remove(&mut self, index: usize, version: u64) {
        match self {
            ColumnSlot::Pod(column) => column.touch(index, version),
            ColumnSlot::Managed(column) => column.remove(index, version),
        }
    }
}
