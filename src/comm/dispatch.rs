//! Incoming record dispatch: forward what is not ours, invoke what is.

use super::Comm;
use crate::codec;
use crate::error::{AxonError, Result};
use crate::protocol::{RECORD_HEADER_SIZE, RecordHeader};
use crate::transport::Channel;

impl Comm {
    /// Dispatch every queued receive buffer. Guarded against re-entry: user
    /// calls made from inside a handler take the enqueue-only path and never
    /// land back here while a dispatch is on the stack.
    pub(crate) fn process_receive_queue(&self) -> Result<bool> {
        assert!(
            !self.in_dispatch.get(),
            "receive dispatcher re-entered on the same stack"
        );
        if self.recv_queue.borrow().is_empty() {
            return Ok(false);
        }
        self.in_dispatch.set(true);
        let result = self.drain_receive_queue();
        self.in_dispatch.set(false);
        result?;
        Ok(true)
    }

    fn drain_receive_queue(&self) -> Result<()> {
        loop {
            let completion = self.recv_queue.borrow_mut().pop_front();
            let Some(completion) = completion else {
                return Ok(());
            };
            self.dispatch_buffer(completion.data())?;
            // Recycle the credit: the buffer returns to the pool and a fresh
            // one keeps the channel's posted depth constant.
            drop(completion);
            self.transport.post_recv(
                Channel::Async,
                self.pool.checkout(self.config.recv_buffer_bytes),
            );
        }
    }

    /// Walk the records coalesced into one frame.
    fn dispatch_buffer(&self, data: &[u8]) -> Result<()> {
        let me = self.rank();
        let mut offset = 0;
        while offset < data.len() {
            if data.len() - offset < RECORD_HEADER_SIZE {
                return Err(AxonError::MalformedRecord("truncated record header"));
            }
            let mut header_bytes = [0u8; RECORD_HEADER_SIZE];
            header_bytes.copy_from_slice(&data[offset..offset + RECORD_HEADER_SIZE]);
            let header = RecordHeader::decode(&header_bytes)?;
            let start = offset + RECORD_HEADER_SIZE;
            let end = start + header.payload_size as usize;
            if end > data.len() {
                return Err(AxonError::MalformedRecord("truncated record payload"));
            }
            if header.dest == me {
                let (id, args) = codec::split_payload(&data[start..end])?;
                self.registry.invoke(self, id, args)?;
                self.received_count.set(self.received_count.get() + 1);
                self.stats.record_dispatch();
            } else {
                assert!(
                    header.is_routed(),
                    "record for rank {} landed on rank {me} without the routed flag",
                    header.dest
                );
                self.forward(&header, &data[offset..end])?;
            }
            offset = end;
        }
        Ok(())
    }

    /// Relay a record one hop closer to its destination. The header travels
    /// unchanged — final destination preserved — and neither termination
    /// counter moves at an intermediate hop.
    fn forward(&self, header: &RecordHeader, record: &[u8]) -> Result<()> {
        let hop = self.router.next_hop(self.rank(), header.dest);
        tracing::trace!(
            rank = self.rank(),
            dest = header.dest,
            hop,
            "relaying record"
        );
        self.send.borrow_mut().append_raw(hop, record);
        self.stats.record_forward();
        self.backpressure()
    }
}
