use crate::FindError;
use crate::fs::Result;
use crate::fs::record::RECORD_ALIGN;

/// Upper bound on a single record buffer, past this growth reports [`FindError::OutOfMemory`].
///
/// A well behaved source never asks for more than a few KiB, this only stops one that
/// keeps reporting "insufficient buffer" from eating the address space.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/**
 A heap buffer for directory records that grows geometrically.

 - Always 8-byte aligned (backed by `u64` words), the alignment records are written with
 - Zero-initialised on allocation, so every byte is always safe to read
 - Never shrinks, it is reused across fetches within one enumeration

 Growing discards the previous contents: the fetch that asked for more room is
 simply retried against the larger buffer.

 # Examples
 ```
 use findop::fs::GrowableBuffer;

 let mut buffer = GrowableBuffer::new();
 buffer.ensure_capacity(1000).unwrap();
 assert_eq!(buffer.capacity(), 1024);
 assert!((buffer.as_bytes().as_ptr() as usize) % 8 == 0, "We expect the buffer to be aligned to 8 bytes");
 ```
*/
#[derive(Debug, Default)]
pub struct GrowableBuffer {
    words: Vec<u64>,
}

impl GrowableBuffer {
    /// Creates an empty buffer, no allocation happens until it is asked for capacity.
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self { words: Vec::new() }
    }

    /// Creates a buffer holding at least `min_bytes`.
    ///
    /// # Errors
    /// [`FindError::OutOfMemory`] if the allocation cannot be satisfied.
    #[inline]
    pub fn with_capacity(min_bytes: usize) -> Result<Self> {
        let mut buffer = Self::new();
        buffer.ensure_capacity(min_bytes)?;
        Ok(buffer)
    }

    /// Capacity in bytes
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.words.len() * RECORD_ALIGN
    }

    /**
     Makes sure the buffer holds at least `min_bytes`.

     When it has to grow, the new capacity is `min_bytes` rounded up to the next power of two.
     Any slice previously taken from the buffer is invalidated (the borrow checker enforces this).

     # Errors
     [`FindError::OutOfMemory`] if the request exceeds [`MAX_BUFFER_SIZE`] or the allocation fails.
    */
    pub fn ensure_capacity(&mut self, min_bytes: usize) -> Result<()> {
        if self.capacity() >= min_bytes {
            return Ok(());
        }

        let target = min_bytes
            .checked_next_power_of_two()
            .filter(|&size| size <= MAX_BUFFER_SIZE)
            .ok_or(FindError::OutOfMemory)?;
        let words = target.div_ceil(RECORD_ALIGN);

        let mut replacement: Vec<u64> = Vec::new();
        replacement
            .try_reserve_exact(words)
            .map_err(|_| FindError::OutOfMemory)?;
        replacement.resize(words, 0);

        tracing::trace!(from = self.capacity(), to = target, "growing record buffer");
        self.words = replacement;
        Ok(())
    }

    /**
     Grows after a source reported the buffer as too small.

     The buffer at least doubles, and reaches `required` when the source said how much it needs.

     # Errors
     As [`ensure_capacity`](Self::ensure_capacity).
    */
    #[inline]
    pub fn grow_for(&mut self, required: Option<usize>) -> Result<()> {
        let doubled = self.capacity().max(RECORD_ALIGN).saturating_mul(2);
        self.ensure_capacity(required.map_or(doubled, |needed| needed.max(doubled)))
    }

    /// Returns the whole buffer as bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: a `u64` slice reinterpreted as bytes is always valid, the length is the
        // byte length of the same allocation and `u8` has no alignment requirement
        unsafe { core::slice::from_raw_parts(self.words.as_ptr().cast(), self.capacity()) }
    }

    /// Returns the whole buffer as mutable bytes, for a source to fill.
    #[inline]
    #[must_use]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.capacity();
        // SAFETY: as above, every byte pattern is a valid `u64` so writes through this slice are fine
        unsafe { core::slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), len) }
    }
}
