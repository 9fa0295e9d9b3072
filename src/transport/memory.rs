//! In-process transport fabric: N endpoints over bounded channels, one
//! thread per rank. The test and single-host substrate; the communicator
//! core sees it only through the [`Transport`] trait.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use super::buffer_pool::{BufferPool, PooledBuf};
use super::{Channel, NUM_CHANNELS, RecvCompletion, Transport};
use crate::config::AxonConfig;
use crate::error::{AxonError, Result};
use crate::types::Rank;

type Frame = (Rank, Bytes);

/// Builds the endpoints of an in-process rank group.
pub struct MemoryFabric;

impl MemoryFabric {
    /// Create `size` connected endpoints. Each endpoint is moved onto its
    /// own thread; frames are handed over zero-copy as [`Bytes`].
    pub fn new(size: u32, config: &AxonConfig) -> Vec<MemoryEndpoint> {
        assert!(size > 0, "fabric must have at least one rank");
        let cap = config.fabric_frames;

        let mut txs: Vec<[Sender<Frame>; NUM_CHANNELS]> = Vec::with_capacity(size as usize);
        let mut rxs: Vec<[Receiver<Frame>; NUM_CHANNELS]> = Vec::with_capacity(size as usize);
        for _ in 0..size {
            let (t0, r0) = bounded(cap);
            let (t1, r1) = bounded(cap);
            let (t2, r2) = bounded(cap);
            txs.push([t0, t1, t2]);
            rxs.push([r0, r1, r2]);
        }

        rxs.into_iter()
            .enumerate()
            .map(|(rank, receivers)| MemoryEndpoint {
                rank: rank as Rank,
                size,
                senders: txs.clone(),
                receivers,
                state: std::array::from_fn(|_| RefCell::new(ChannelState::default())),
                pool: BufferPool::new(config.pool_max_buffers, config.recv_buffer_bytes),
            })
            .collect()
    }
}

#[derive(Default)]
struct ChannelState {
    /// Receive buffers provided by the owner, consumed in posting order.
    posted: VecDeque<PooledBuf>,
    /// A frame taken off the wire by `probe_any` (or by `test_any` while no
    /// buffer was posted), delivered before anything newer.
    peeked: Option<Frame>,
}

/// One rank's attachment to a [`MemoryFabric`].
pub struct MemoryEndpoint {
    rank: Rank,
    size: u32,
    /// `senders[dest][channel]`; includes a loop-back sender to this rank,
    /// which also keeps the receive side connected for the endpoint's
    /// lifetime.
    senders: Vec<[Sender<Frame>; NUM_CHANNELS]>,
    receivers: [Receiver<Frame>; NUM_CHANNELS],
    state: [RefCell<ChannelState>; NUM_CHANNELS],
    /// Serves frames that arrive larger than the posted buffer.
    pool: Arc<BufferPool>,
}

impl Transport for MemoryEndpoint {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn try_send(&self, channel: Channel, dest: Rank, frame: Bytes) -> Result<bool> {
        assert!(
            dest < self.size,
            "send to out-of-range rank {dest} (size {})",
            self.size
        );
        match self.senders[dest as usize][channel as usize].try_send((self.rank, frame)) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(AxonError::TransportClosed),
        }
    }

    fn post_recv(&self, channel: Channel, buf: PooledBuf) {
        self.state[channel as usize].borrow_mut().posted.push_back(buf);
    }

    fn test_any(&self, channel: Channel) -> Result<Option<RecvCompletion>> {
        let mut st = self.state[channel as usize].borrow_mut();
        let (source, data) = match st.peeked.take() {
            Some(frame) => frame,
            None => match self.receivers[channel as usize].try_recv() {
                Ok(frame) => frame,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(AxonError::TransportClosed),
            },
        };
        let mut buf = match st.posted.pop_front() {
            Some(b) if b.len() >= data.len() => b,
            Some(undersized) => {
                // Frame outgrew the posted buffer. Retire the credit (the
                // receiver re-posts one per completion, so depth stays
                // constant) and serve the frame exactly-sized.
                drop(undersized);
                self.pool.checkout(data.len())
            }
            None => {
                st.peeked = Some((source, data));
                return Ok(None);
            }
        };
        buf[..data.len()].copy_from_slice(&data);
        Ok(Some(RecvCompletion {
            source,
            len: data.len(),
            buf,
        }))
    }

    fn probe_any(&self, channel: Channel) -> Option<(Rank, usize)> {
        let mut st = self.state[channel as usize].borrow_mut();
        if st.peeked.is_none() {
            match self.receivers[channel as usize].try_recv() {
                Ok(frame) => st.peeked = Some(frame),
                Err(_) => return None,
            }
        }
        st.peeked.as_ref().map(|(src, data)| (*src, data.len()))
    }
}
