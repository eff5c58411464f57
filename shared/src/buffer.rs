use std::{
    ops::{Deref, DerefMut},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use crate::wire::packet_header::PACKET_HEADER_SIZE;

/// Capacity a fresh pooled buffer starts with: a packet header plus a small
/// body. Larger packets grow their buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = PACKET_HEADER_SIZE + 256;

const DEFAULT_RETAINED: usize = 64;

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    outstanding: AtomicUsize,
    max_retained: usize,
    capacity: usize,
}

impl PoolInner {
    fn free(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        // a panic while holding the lock cannot leave the free list torn
        match self.free.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Pool of reusable byte buffers. Cloning yields another handle to the same
/// pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// `capacity` is the initial capacity of freshly allocated buffers.
    pub fn new(capacity: usize) -> Self {
        Self::with_retained(capacity, DEFAULT_RETAINED)
    }

    /// Like [`BufferPool::new`], keeping at most `max_retained` idle buffers.
    pub fn with_retained(capacity: usize, max_retained: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
                max_retained,
                capacity,
            }),
        }
    }

    /// Takes an empty buffer from the pool, allocating if none is idle.
    pub fn rent(&self) -> PooledBuffer {
        let bytes = self
            .inner
            .free()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.inner.capacity));
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);

        PooledBuffer {
            bytes,
            pool: self.inner.clone(),
        }
    }

    /// Buffers rented and not yet dropped.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Buffers sitting idle in the pool.
    pub fn idle(&self) -> usize {
        self.inner.free().len()
    }
}

/// A buffer rented from a [`BufferPool`]. Dropping it returns it to the pool,
/// so each rental is returned exactly once.
pub struct PooledBuffer {
    bytes: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let mut bytes = std::mem::take(&mut self.bytes);
        bytes.clear();

        let mut free = self.pool.free();
        if free.len() < self.pool.max_retained {
            free.push(bytes);
        }
        drop(free);

        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
