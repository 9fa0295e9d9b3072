//! Lightweight counters for the communicator core.

use std::cell::Cell;

/// Per-rank counters, single-owner like everything else in the core.
#[derive(Debug, Default)]
pub struct CommStats {
    posted: Cell<u64>,
    dispatched: Cell<u64>,
    forwarded: Cell<u64>,
    bytes_sent: Cell<u64>,
    bytes_received: Cell<u64>,
    buffers_flushed: Cell<u64>,
    barriers: Cell<u64>,
    barrier_rounds: Cell<u64>,
}

/// Plain-data copy of [`CommStats`], summable across ranks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    /// Remote invocations enqueued here (including broadcast relays).
    pub posted: u64,
    /// Records whose handler ran here.
    pub dispatched: u64,
    /// Records relayed toward their destination without dispatch.
    pub forwarded: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Coalesced frames handed to the transport.
    pub buffers_flushed: u64,
    /// Full barriers completed.
    pub barriers: u64,
    /// Count-reduction rounds across all barriers.
    pub barrier_rounds: u64,
}

impl StatsSnapshot {
    /// Field-wise sum, the merge used when aggregating over ranks.
    pub fn merged(self, other: Self) -> Self {
        Self {
            posted: self.posted + other.posted,
            dispatched: self.dispatched + other.dispatched,
            forwarded: self.forwarded + other.forwarded,
            bytes_sent: self.bytes_sent + other.bytes_sent,
            bytes_received: self.bytes_received + other.bytes_received,
            buffers_flushed: self.buffers_flushed + other.buffers_flushed,
            barriers: self.barriers + other.barriers,
            barrier_rounds: self.barrier_rounds + other.barrier_rounds,
        }
    }
}

impl CommStats {
    pub(crate) fn record_post(&self) {
        self.posted.set(self.posted.get() + 1);
    }

    pub(crate) fn record_dispatch(&self) {
        self.dispatched.set(self.dispatched.get() + 1);
    }

    pub(crate) fn record_forward(&self) {
        self.forwarded.set(self.forwarded.get() + 1);
    }

    pub(crate) fn record_flush(&self, bytes: usize) {
        self.buffers_flushed.set(self.buffers_flushed.get() + 1);
        self.bytes_sent.set(self.bytes_sent.get() + bytes as u64);
    }

    pub(crate) fn record_receive(&self, bytes: usize) {
        self.bytes_received
            .set(self.bytes_received.get() + bytes as u64);
    }

    pub(crate) fn record_barrier(&self) {
        self.barriers.set(self.barriers.get() + 1);
    }

    pub(crate) fn record_barrier_round(&self) {
        self.barrier_rounds.set(self.barrier_rounds.get() + 1);
    }

    pub fn reset(&self) {
        self.posted.set(0);
        self.dispatched.set(0);
        self.forwarded.set(0);
        self.bytes_sent.set(0);
        self.bytes_received.set(0);
        self.buffers_flushed.set(0);
        self.barriers.set(0);
        self.barrier_rounds.set(0);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            posted: self.posted.get(),
            dispatched: self.dispatched.get(),
            forwarded: self.forwarded.get(),
            bytes_sent: self.bytes_sent.get(),
            bytes_received: self.bytes_received.get(),
            buffers_flushed: self.buffers_flushed.get(),
            barriers: self.barriers.get(),
            barrier_rounds: self.barrier_rounds.get(),
        }
    }
}
