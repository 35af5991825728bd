use crate::fs::{GrowableBuffer, Result};
use std::sync::{Mutex, PoisonError};

/**
 A shareable cache of record buffers.

 Enumerations that are handed a pool take their buffers from it and give them back when a
 directory is finished, so a long run of short enumerations allocates only a handful of buffers.
 The pool is an explicit object, share it with an `Arc`; nothing is cached process-wide.

 # Examples
 ```
 use findop::fs::BufferPool;

 let pool = BufferPool::new(4);
 let buffer = pool.acquire(4096).unwrap();
 assert!(buffer.capacity() >= 4096);
 pool.release(buffer);
 assert_eq!(pool.len(), 1);
 ```
*/
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<GrowableBuffer>>,
    max_retained: usize,
}

impl BufferPool {
    /// Creates a pool that keeps at most `max_retained` idle buffers.
    #[must_use]
    pub const fn new(max_retained: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            max_retained,
        }
    }

    /// Takes a buffer of at least `min_bytes`, reusing an idle one when possible.
    ///
    /// # Errors
    /// [`crate::FindError::OutOfMemory`] if a new or grown buffer cannot be allocated.
    pub fn acquire(&self, min_bytes: usize) -> Result<GrowableBuffer> {
        let reused = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match reused {
            Some(mut buffer) => {
                buffer.ensure_capacity(min_bytes)?;
                Ok(buffer)
            }
            None => GrowableBuffer::with_capacity(min_bytes),
        }
    }

    /// Hands a buffer back, it is dropped if the pool is already full.
    pub fn release(&self, buffer: GrowableBuffer) {
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < self.max_retained && buffer.capacity() > 0 {
            buffers.push(buffer);
        }
    }

    /// Number of idle buffers held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(8)
    }
}
