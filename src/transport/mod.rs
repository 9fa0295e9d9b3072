//! Byte transport abstraction and the in-process fabric.
//!
//! The communicator core is defined over a generic bidirectional tagged
//! byte-message primitive with three independent channels; anything that can
//! carry frames reliably and FIFO per (channel, source, destination) can
//! implement [`Transport`].

pub mod buffer_pool;
mod memory;

use crate::error::Result;
use crate::types::Rank;
pub use buffer_pool::{BufferPool, PooledBuf};
use bytes::Bytes;
pub use memory::{MemoryEndpoint, MemoryFabric};

/// The three logical message channels.
///
/// A flood on `Async` must never starve `Barrier`: implementations keep the
/// channels independently progressable, and the core never blocks on one
/// channel while holding another hostage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channel {
    /// Coalesced remote-invocation records.
    Async = 0,
    /// Barrier synchronization and termination counts.
    Barrier = 1,
    /// Typed collectives and administrative point-to-point.
    User = 2,
}

/// Number of logical channels.
pub const NUM_CHANNELS: usize = 3;

/// All channels, in index order.
pub const CHANNELS: [Channel; NUM_CHANNELS] = [Channel::Async, Channel::Barrier, Channel::User];

/// A completed receive: the posted buffer, filled from `source`.
pub struct RecvCompletion {
    pub source: Rank,
    pub len: usize,
    pub buf: PooledBuf,
}

impl RecvCompletion {
    /// The received bytes.
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// A reliable, per-(channel, source, destination) FIFO byte transport over a
/// fixed rank set. All operations are non-blocking; completion is polled.
pub trait Transport {
    /// This process's rank.
    fn rank(&self) -> Rank;

    /// Number of ranks in the group.
    fn size(&self) -> u32;

    /// Queue one frame toward `dest`. Returns `false` when the send queue is
    /// full; the caller pumps progress and retries — never an error.
    fn try_send(&self, channel: Channel, dest: Rank, frame: Bytes) -> Result<bool>;

    /// Provide a receive buffer for `channel`. Completions hand buffers back
    /// in posting order.
    fn post_recv(&self, channel: Channel, buf: PooledBuf);

    /// Poll for one completed receive on `channel`.
    fn test_any(&self, channel: Channel) -> Result<Option<RecvCompletion>>;

    /// Peek the next pending frame on `channel` without consuming a posted
    /// buffer.
    fn probe_any(&self, channel: Channel) -> Option<(Rank, usize)>;
}
