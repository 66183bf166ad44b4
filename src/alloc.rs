//! Cache-line-aligned byte buffers.
//!
//! Vector batches and per-query scratch buffers are allocated at a fixed
//! 64-byte alignment so that lane views handed to the distance kernels start
//! on SIMD-friendly boundaries. The allocation never moves: a [`AlignedBytes`]
//! value may itself be moved between owners, but the heap block it points at
//! stays put, which is what lets the store hand out vector borrows while the
//! batch list grows.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// Fixed allocation alignment, in bytes.
pub const ALIGNMENT: usize = 64;

/// An owned, zero-initialized, 64-byte-aligned byte block.
///
/// Move-only: cloning a batch-sized block by accident would be an easy way to
/// blow the memory budget, so there is deliberately no `Clone`.
pub struct AlignedBytes {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the buffer is plain bytes with unique ownership; sharing a
// reference across threads is as safe as sharing `&[u8]`.
unsafe impl Send for AlignedBytes {}
unsafe impl Sync for AlignedBytes {}

impl AlignedBytes {
    /// Allocates `len` zeroed bytes at [`ALIGNMENT`].
    ///
    /// # Panics
    ///
    /// Panics on allocation failure, matching `Vec` behavior.
    #[must_use]
    pub fn zeroed(len: usize) -> Self {
        if len == 0 {
            return Self {
                ptr: NonNull::dangling(),
                len: 0,
            };
        }
        let layout = Layout::from_size_align(len, ALIGNMENT).expect("invalid layout");
        // SAFETY: layout has non-zero size and valid alignment.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).unwrap_or_else(|| std::alloc::handle_alloc_error(layout));
        Self { ptr, len }
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Immutable view of the whole buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr/len describe a live allocation owned by self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable view of the whole buffer.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr/len describe a live allocation owned exclusively here.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Raw base pointer. The pointee is stable for the life of `self`.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Raw mutable base pointer.
    ///
    /// Writing through this pointer from `&self` requires the caller to
    /// guarantee exclusive access to the written range; the store does so via
    /// its per-label lock discipline.
    #[must_use]
    pub fn as_raw_mut(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for AlignedBytes {
    fn drop(&mut self) {
        if self.len != 0 {
            let layout = Layout::from_size_align(self.len, ALIGNMENT).expect("invalid layout");
            // SAFETY: allocated with the identical layout in `zeroed`.
            unsafe { dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

impl std::fmt::Debug for AlignedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBytes")
            .field("len", &self.len)
            .field("align", &ALIGNMENT)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_aligned_and_zeroed() {
        let buf = AlignedBytes::zeroed(1024);
        assert_eq!(buf.as_ptr() as usize % ALIGNMENT, 0);
        assert!(buf.as_slice().iter().all(|&b| b == 0));
        assert_eq!(buf.len(), 1024);
    }

    #[test]
    fn zero_length_is_valid() {
        let buf = AlignedBytes::zeroed(0);
        assert!(buf.is_empty());
        assert_eq!(buf.as_slice().len(), 0);
    }

    #[test]
    fn writes_stick() {
        let mut buf = AlignedBytes::zeroed(16);
        buf.as_mut_slice()[3] = 0xAB;
        assert_eq!(buf.as_slice()[3], 0xAB);
    }

    #[test]
    fn address_survives_moves() {
        let buf = AlignedBytes::zeroed(64);
        let before = buf.as_ptr();
        let moved = buf;
        assert_eq!(before, moved.as_ptr());
    }
}
