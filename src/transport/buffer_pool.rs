use crossbeam_queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A lock-free pool of recyclable byte buffers.
///
/// Buffers are allocated **lazily**: the pool starts empty and buffers are
/// created on first checkout. When a [`PooledBuf`] drops, its `Vec` is
/// cleared and pushed back for reuse, up to the configured retention limit.
/// Buffers that have grown beyond 4× the pool's buffer capacity are dropped
/// instead of returned.
pub struct BufferPool {
    queue: ArrayQueue<Vec<u8>>,
    buf_capacity: usize,
}

impl BufferPool {
    /// `max_buffers` bounds retained memory; `buf_capacity` is the size
    /// buffers are allocated at.
    pub fn new(max_buffers: usize, buf_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            queue: ArrayQueue::new(max_buffers.max(1)),
            buf_capacity,
        })
    }

    /// Check out a buffer, resized to `len` bytes (zeroed).
    ///
    /// If the queue is empty a fresh buffer is allocated; requests larger
    /// than the pool's capacity are served exactly-sized.
    pub fn checkout(self: &Arc<Self>, len: usize) -> PooledBuf {
        let mut buf = self
            .queue
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.buf_capacity.max(len)));
        buf.resize(len, 0);
        PooledBuf {
            buf: Some(buf),
            pool: Arc::clone(self),
        }
    }

    fn return_buf(&self, mut buf: Vec<u8>) {
        if buf.capacity() <= self.buf_capacity * 4 {
            buf.clear();
            let _ = self.queue.push(buf);
        }
    }
}

/// A buffer checked out from a [`BufferPool`]. Derefs to `[u8]`.
/// On drop, the underlying `Vec` is cleared and returned to the pool.
pub struct PooledBuf {
    buf: Option<Vec<u8>>,
    pool: Arc<BufferPool>,
}

impl PooledBuf {
    /// Wrap an externally-produced `Vec<u8>`; it joins the pool on drop.
    pub fn from_vec(v: Vec<u8>, pool: Arc<BufferPool>) -> Self {
        Self { buf: Some(v), pool }
    }
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY invariant: `buf` is `Some` from construction until `Drop`.
        self.buf.as_ref().expect("PooledBuf used after drop")
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut().expect("PooledBuf used after drop")
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.return_buf(buf);
        }
    }
}
