//! The progress engine: bounded, non-blocking work that advances sends,
//! receives, and dispatch without yielding to a scheduler.

use bytes::Bytes;

use super::Comm;
use crate::error::Result;
use crate::transport::Channel;
use crate::types::Rank;

impl Comm {
    /// Drive one pump round: submit due frames, reap receive completions,
    /// dispatch queued records (unless already inside a dispatch). Returns
    /// whether anything moved.
    pub fn progress(&self) -> Result<bool> {
        self.progress_once()
    }

    pub(crate) fn progress_once(&self) -> Result<bool> {
        let mut any = self.drain_submit()?;
        any |= self.reap_async()?;
        if !self.in_dispatch.get() {
            any |= self.process_receive_queue()?;
        }
        Ok(any)
    }

    /// Hand submit-queue frames to the transport until it refuses one.
    pub(crate) fn drain_submit(&self) -> Result<bool> {
        let mut any = false;
        loop {
            let item = self.send.borrow_mut().take_submit();
            let Some((hop, frame)) = item else {
                return Ok(any);
            };
            let len = frame.len();
            if self.transport.try_send(Channel::Async, hop, frame.clone())? {
                self.send.borrow_mut().mark_sent(len);
                self.stats.record_flush(len);
                any = true;
            } else {
                self.send.borrow_mut().unsubmit(hop, frame);
                return Ok(any);
            }
        }
    }

    /// Move async-channel completions into the local receive queue. Always
    /// legal, even mid-dispatch or mid-reduction: it frees transport
    /// capacity without re-entering the dispatcher, so a peer blocked on
    /// backpressure can always make progress against us.
    pub(crate) fn reap_async(&self) -> Result<bool> {
        let mut any = false;
        while let Some(completion) = self.transport.test_any(Channel::Async)? {
            self.stats.record_receive(completion.len);
            self.recv_queue.borrow_mut().push_back(completion);
            any = true;
        }
        Ok(any)
    }

    /// The send-path blocking point: once pending bytes cross the high-water
    /// mark, pump until they drain back under it.
    pub(crate) fn backpressure(&self) -> Result<()> {
        if self.send.borrow().pending_bytes() <= self.config.high_water_bytes {
            return Ok(());
        }
        tracing::trace!(rank = self.rank(), "send high-water crossed, pumping");
        while self.send.borrow().pending_bytes() > self.config.high_water_bytes {
            self.send.borrow_mut().flush_all();
            if !self.progress_once()? {
                std::thread::yield_now();
            }
        }
        Ok(())
    }

    /// Pump until this rank has nothing left to do: accumulators empty,
    /// every frame accepted by the transport, every received record
    /// dispatched. Other ranks may still be producing work for us — the
    /// barrier's reduction loop is what certifies global quiescence.
    pub(crate) fn pump_until_quiet(&self) -> Result<()> {
        loop {
            let mut any = self.progress_once()?;
            if self.send.borrow().has_accumulated() {
                self.send.borrow_mut().flush_all();
                any = true;
            }
            if !any {
                if self.locally_quiet() {
                    return Ok(());
                }
                std::thread::yield_now();
            }
        }
    }

    pub(crate) fn locally_quiet(&self) -> bool {
        self.send.borrow().pending_bytes() == 0
            && self.recv_queue.borrow().is_empty()
            && self.transport.probe_any(Channel::Async).is_none()
    }

    /// Blocking send on a control channel; control frames bypass coalescing.
    pub(crate) fn ctrl_send(&self, channel: Channel, dest: Rank, frame: Bytes) -> Result<()> {
        while !self.transport.try_send(channel, dest, frame.clone())? {
            std::thread::yield_now();
        }
        Ok(())
    }

    /// Blocking receive of the next control frame from `src`. Never
    /// dispatches async records; while waiting on the barrier channel it
    /// still reaps async completions into the local queue, so a peer whose
    /// send path is saturated toward us cannot wedge the collective. On the
    /// user channel the async channel is left entirely alone — callers of
    /// typed collectives quiesce async traffic first. Frames from other
    /// sources are stashed in arrival order.
    pub(crate) fn ctrl_recv(&self, channel: Channel, src: Rank) -> Result<Vec<u8>> {
        let stash = match channel {
            Channel::Barrier => &self.barrier_stash,
            Channel::User => &self.user_stash,
            Channel::Async => unreachable!("async channel carries records, not control frames"),
        };
        loop {
            if let Some(frame) = stash
                .borrow_mut()
                .get_mut(&src)
                .and_then(|queue| queue.pop_front())
            {
                return Ok(frame);
            }
            match self.transport.test_any(channel)? {
                Some(completion) => {
                    self.stats.record_receive(completion.len);
                    stash
                        .borrow_mut()
                        .entry(completion.source)
                        .or_default()
                        .push_back(completion.data().to_vec());
                    drop(completion);
                    self.transport
                        .post_recv(channel, self.pool.checkout(self.config.recv_buffer_bytes));
                }
                None => {
                    let mut idle = true;
                    if channel == Channel::Barrier {
                        idle = !self.reap_async()?;
                        idle &= !self.drain_submit()?;
                    }
                    if idle {
                        std::thread::yield_now();
                    }
                }
            }
        }
    }
}
