use std::any::Any;
use std::collections::VecDeque;

use crossbeam::queue::SegQueue;

use tern_shared::{EventTypeId, EventTypeMask, FrameIndex};

use crate::world::{AlignedBytes, EventBus, ManagedEventVTable};

/// Lock-free pool of captured byte buffers. Buffers trimmed out of the
/// history go back here, so steady-state capture allocates nothing.
pub(crate) struct BytePool {
    stack: SegQueue<AlignedBytes>,
}

impl BytePool {
    pub fn new() -> Self {
        Self {
            stack: SegQueue::new(),
        }
    }

    pub fn acquire(&self) -> AlignedBytes {
        self.stack.pop().unwrap_or_else(AlignedBytes::new)
    }

    pub fn release(&self, mut buffer: AlignedBytes) {
        buffer.clear();
        self.stack.push(buffer);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.stack.len()
    }
}

struct NativeBatch {
    type_id: EventTypeId,
    elem_size: usize,
    bytes: AlignedBytes,
}

struct ManagedBatch {
    type_id: EventTypeId,
    items: Box<dyn Any + Send + Sync>,
    vtable: ManagedEventVTable,
}

struct EventBatch {
    frame: FrameIndex,
    native: Vec<NativeBatch>,
    managed: Vec<ManagedBatch>,
}

/// Bounded history of per-frame event batches captured from the live bus.
///
/// Capture is non-destructive; the live bus keeps its buffers. Any view can
/// later be brought up to date by flushing every batch newer than the tick
/// it last saw, which is what lets slow modules observe every event
/// published since their previous run.
pub struct EventAccumulator {
    history: VecDeque<EventBatch>,
    max_history_frames: usize,
    pool: BytePool,
}

impl EventAccumulator {
    pub fn new(max_history_frames: usize) -> Self {
        assert!(max_history_frames > 0, "history must hold at least one frame");
        Self {
            history: VecDeque::with_capacity(max_history_frames + 1),
            max_history_frames,
            pool: BytePool::new(),
        }
    }

    /// Snapshots the bus's currently visible buffers into a new batch and
    /// trims the history to its configured depth.
    pub fn capture_frame(&mut self, frame: FrameIndex, bus: &EventBus) {
        let mut native = Vec::new();
        for (type_id, buffer) in bus.iter_native() {
            if buffer.bytes.is_empty() {
                continue;
            }
            let mut bytes = self.pool.acquire();
            bytes.extend_from_slice(buffer.bytes.as_slice());
            native.push(NativeBatch {
                type_id,
                elem_size: buffer.elem_size,
                bytes,
            });
        }

        let mut managed = Vec::new();
        for (type_id, buffer) in bus.iter_managed() {
            if (buffer.vtable.len)(buffer.items.as_ref()) == 0 {
                continue;
            }
            managed.push(ManagedBatch {
                type_id,
                items: (buffer.vtable.clone_all)(buffer.items.as_ref()),
                vtable: buffer.vtable,
            });
        }

        self.history.push_back(EventBatch {
            frame,
            native,
            managed,
        });

        while self.history.len() > self.max_history_frames {
            let batch = self.history.pop_front().expect("non-empty history");
            for native in batch.native {
                self.pool.release(native.bytes);
            }
        }
    }

    /// Appends every batch newer than `last_seen` into the replica bus and
    /// returns the new high-water mark. `None` means the view has never
    /// seen any frame. Append-only: events already in the replica bus stay.
    pub fn flush_to_replica(
        &self,
        bus: &mut EventBus,
        last_seen: Option<FrameIndex>,
        mask: Option<&EventTypeMask>,
    ) -> Option<FrameIndex> {
        let mut high = last_seen;
        for batch in &self.history {
            if let Some(seen) = last_seen {
                if batch.frame <= seen {
                    continue;
                }
            }
            for native in &batch.native {
                if filtered_out(mask, native.type_id) {
                    continue;
                }
                bus.publish_raw(native.type_id, native.elem_size, native.bytes.as_slice());
            }
            for managed in &batch.managed {
                if filtered_out(mask, managed.type_id) {
                    continue;
                }
                bus.append_managed_cloned(managed.type_id, managed.items.as_ref(), managed.vtable);
            }
            if high.map(|h| batch.frame > h).unwrap_or(true) {
                high = Some(batch.frame);
            }
        }
        high
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    #[cfg(test)]
    pub(crate) fn pooled_buffers(&self) -> usize {
        self.pool.len()
    }
}

fn filtered_out(mask: Option<&EventTypeMask>, type_id: EventTypeId) -> bool {
    match mask {
        Some(mask) => !mask.test(type_id),
        None => false,
    }
}
