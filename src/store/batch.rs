//! Fixed-capacity aligned vector block.
//!
//! A batch owns one aligned allocation holding up to `capacity` vectors and
//! an append pointer. Batches are move-only and their memory never relocates
//! once allocated, which is the property the store's borrow discipline rests
//! on.

use crate::alloc::AlignedBytes;
use crate::space::VectorSpace;

/// One contiguous block of vectors inside the store.
#[derive(Debug)]
pub struct VectorBatch {
    data: AlignedBytes,
    len: usize,
    capacity: usize,
    vector_byte_size: usize,
}

impl VectorBatch {
    /// Allocates a zeroed batch for `capacity` vectors of `space`'s shape.
    #[must_use]
    pub fn new(space: &VectorSpace, capacity: usize) -> Self {
        Self {
            data: space.alloc_vectors(capacity),
            len: 0,
            capacity,
            vector_byte_size: space.vector_byte_size(),
        }
    }

    /// Number of assigned slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no slot is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of vectors this batch can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Unassigned slots remaining.
    #[must_use]
    pub fn available(&self) -> usize {
        self.capacity - self.len
    }

    /// True once every slot is assigned.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Moves the append pointer. Used by the store when reserving locations
    /// and when rebuilding batches from disk.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the capacity.
    pub fn resize(&mut self, n: usize) {
        assert!(n <= self.capacity, "batch resize past capacity");
        self.len = n;
    }

    /// Borrow of slot `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not an assigned slot.
    #[must_use]
    pub fn vector(&self, i: usize) -> &[u8] {
        assert!(i < self.len, "batch slot {i} beyond len {}", self.len);
        let start = i * self.vector_byte_size;
        &self.data.as_slice()[start..start + self.vector_byte_size]
    }

    /// Raw pointer to slot `i`. Stable for the life of the batch.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not an assigned slot.
    #[must_use]
    pub fn vector_ptr(&self, i: usize) -> *const u8 {
        assert!(i < self.len, "batch slot {i} beyond len {}", self.len);
        // SAFETY: i * vbs is within the allocation by the assert above.
        unsafe { self.data.as_ptr().add(i * self.vector_byte_size) }
    }

    /// Copies `bytes` into slot `i` through a shared reference.
    ///
    /// # Safety
    ///
    /// The caller must guarantee that no other thread reads or writes slot
    /// `i` for the duration of the copy. The store provides this through its
    /// per-label lock discipline; fresh slots are additionally invisible to
    /// readers until the engine publishes them.
    ///
    /// # Panics
    ///
    /// Panics if `i` is unassigned or `bytes` has the wrong length.
    pub unsafe fn write_vector(&self, i: usize, bytes: &[u8]) {
        assert!(i < self.len, "batch slot {i} beyond len {}", self.len);
        assert_eq!(bytes.len(), self.vector_byte_size, "vector byte size mismatch");
        let dst = self.data.as_raw_mut().add(i * self.vector_byte_size);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
    }

    /// Copies `bytes` into slot `i` through an exclusive reference.
    ///
    /// # Panics
    ///
    /// Panics if `i` is unassigned or `bytes` has the wrong length.
    pub fn set_vector(&mut self, i: usize, bytes: &[u8]) {
        assert!(i < self.len, "batch slot {i} beyond len {}", self.len);
        assert_eq!(bytes.len(), self.vector_byte_size, "vector byte size mismatch");
        let start = i * self.vector_byte_size;
        self.data.as_mut_slice()[start..start + self.vector_byte_size].copy_from_slice(bytes);
    }

    /// Zeroes slot `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not an assigned slot.
    pub fn clear_vector(&mut self, i: usize) {
        assert!(i < self.len, "batch slot {i} beyond len {}", self.len);
        let start = i * self.vector_byte_size;
        self.data.as_mut_slice()[start..start + self.vector_byte_size].fill(0);
    }

    /// The assigned prefix of the batch as raw bytes, for persistence.
    #[must_use]
    pub fn assigned_bytes(&self) -> &[u8] {
        &self.data.as_slice()[..self.len * self.vector_byte_size]
    }
}
