/// Byte storage backed by `u128` words so that typed slices up to 16-byte
/// alignment can be borrowed straight out of the buffer.
///
/// Component columns and native event buffers both sit on top of this;
/// plain-old-data reads never copy.
pub(crate) struct AlignedBytes {
    words: Vec<u128>,
    len: usize,
}

impl AlignedBytes {
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
        }
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            words: Vec::with_capacity(words_for(bytes)),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.words)[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut bytemuck::cast_slice_mut(&mut self.words)[..len]
    }

    /// Grows the buffer to `len` bytes. New space is zero-filled.
    pub fn set_len(&mut self, len: usize) {
        self.ensure(len);
        if len > self.len {
            // Reused buffers may carry stale bytes past the logical length.
            let slice: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words);
            slice[self.len..len].fill(0);
        }
        self.len = len;
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        let offset = self.len;
        self.write_at(offset, bytes);
    }

    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        self.ensure(end);
        if end > self.len {
            self.len = end;
        }
        if bytes.is_empty() {
            return;
        }
        let slice: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words);
        slice[offset..end].copy_from_slice(bytes);
    }

    /// Resets the logical length, keeping the allocation for reuse.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    fn ensure(&mut self, len: usize) {
        let words = words_for(len);
        if self.words.len() < words {
            self.words.resize(words, 0);
        }
    }
}

fn words_for(bytes: usize) -> usize {
    (bytes + 15) / 16
}
