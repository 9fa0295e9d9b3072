//! Per-next-hop record coalescing.
//!
//! Records accumulate per next hop until the soft threshold, then move as a
//! single frame onto the submit queue, where they wait for the transport to
//! accept them. `pending_bytes` covers both stages; the progress engine uses
//! it for the high-water backpressure decision.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::protocol::RECORD_HEADER_SIZE;
use crate::types::Rank;

pub(crate) struct SendBuffers {
    soft_limit: usize,
    /// Accumulating buffer per next hop; always whole records.
    bufs: Vec<Vec<u8>>,
    /// Hops with a non-empty accumulator, oldest first. May hold stale
    /// entries for hops flushed out of band; flushing an empty hop is a
    /// no-op.
    queue: VecDeque<Rank>,
    queued: Vec<bool>,
    /// Flushed frames the transport has not yet accepted.
    submit: VecDeque<(Rank, Bytes)>,
    accumulated_bytes: usize,
    submitted_bytes: usize,
}

impl SendBuffers {
    pub fn new(size: u32, soft_limit: usize) -> Self {
        Self {
            soft_limit,
            bufs: vec![Vec::new(); size as usize],
            queue: VecDeque::new(),
            queued: vec![false; size as usize],
            submit: VecDeque::new(),
            accumulated_bytes: 0,
            submitted_bytes: 0,
        }
    }

    /// Unsent bytes across accumulators and the submit queue.
    pub fn pending_bytes(&self) -> usize {
        self.accumulated_bytes + self.submitted_bytes
    }

    /// True if any accumulator holds records not yet flushed.
    pub fn has_accumulated(&self) -> bool {
        self.accumulated_bytes > 0
    }

    /// Append one record (header + payload) for `hop`, flushing first if the
    /// accumulator would cross the soft threshold.
    pub fn append_record(&mut self, hop: Rank, header: &[u8; RECORD_HEADER_SIZE], payload: &[u8]) {
        let total = RECORD_HEADER_SIZE + payload.len();
        self.reserve(hop, total);
        let buf = &mut self.bufs[hop as usize];
        buf.extend_from_slice(header);
        buf.extend_from_slice(payload);
        self.accumulated_bytes += total;
    }

    /// Append an already-framed record unchanged (the forwarding path).
    pub fn append_raw(&mut self, hop: Rank, record: &[u8]) {
        self.reserve(hop, record.len());
        self.bufs[hop as usize].extend_from_slice(record);
        self.accumulated_bytes += record.len();
    }

    fn reserve(&mut self, hop: Rank, len: usize) {
        let h = hop as usize;
        if !self.bufs[h].is_empty() && self.bufs[h].len() + len > self.soft_limit {
            self.flush(hop);
        }
        if !self.queued[h] {
            self.queued[h] = true;
            self.queue.push_back(hop);
        }
    }

    /// Move `hop`'s accumulator onto the submit queue as one frame.
    pub fn flush(&mut self, hop: Rank) {
        let h = hop as usize;
        if self.bufs[h].is_empty() {
            return;
        }
        let frame = std::mem::take(&mut self.bufs[h]);
        self.queued[h] = false;
        self.accumulated_bytes -= frame.len();
        self.submitted_bytes += frame.len();
        self.submit.push_back((hop, Bytes::from(frame)));
    }

    /// Flush every non-empty accumulator.
    pub fn flush_all(&mut self) {
        while let Some(hop) = self.queue.pop_front() {
            self.flush(hop);
        }
    }

    /// Next frame awaiting transport acceptance.
    pub fn take_submit(&mut self) -> Option<(Rank, Bytes)> {
        self.submit.pop_front()
    }

    /// Put back a frame the transport refused.
    pub fn unsubmit(&mut self, hop: Rank, frame: Bytes) {
        self.submit.push_front((hop, frame));
    }

    /// Account a frame the transport accepted.
    pub fn mark_sent(&mut self, len: usize) {
        debug_assert!(self.submitted_bytes >= len);
        self.submitted_bytes -= len;
    }
}
