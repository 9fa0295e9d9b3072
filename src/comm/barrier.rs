//! Synchronization: the control-flow barrier and the full barrier with
//! termination detection.

use std::rc::Rc;

use super::Comm;
use crate::error::Result;
use crate::protocol::ControlMsg;
use crate::transport::Channel;
use crate::types::Rank;

/// While held, re-entering a barrier is a fatal programming error. Covers
/// pre-barrier hooks, the reduction rounds, and blocking collectives.
pub(crate) struct InterruptMask<'a> {
    comm: &'a Comm,
}

impl<'a> InterruptMask<'a> {
    pub(crate) fn new(comm: &'a Comm) -> Self {
        assert!(
            comm.interrupts_enabled.get(),
            "barrier re-entered from a pre-barrier hook or collective"
        );
        comm.interrupts_enabled.set(false);
        Self { comm }
    }
}

impl Drop for InterruptMask<'_> {
    fn drop(&mut self) {
        self.comm.interrupts_enabled.set(true);
    }
}

pub(crate) fn tree_parent(rank: Rank) -> Option<Rank> {
    if rank == 0 { None } else { Some((rank - 1) / 2) }
}

pub(crate) fn tree_children(rank: Rank, size: u32) -> impl Iterator<Item = Rank> {
    let r = u64::from(rank);
    let n = u64::from(size);
    [2 * r + 1, 2 * r + 2]
        .into_iter()
        .filter(move |&c| c < n)
        .map(|c| c as Rank)
}

impl Comm {
    /// Control-flow barrier: returns once every rank has arrived. Makes no
    /// delivery guarantee — async records posted before it may still be in
    /// flight — and never dispatches them.
    pub fn cf_barrier(&self) -> Result<()> {
        assert!(
            !self.in_dispatch.get(),
            "cf_barrier called from inside a dispatched handler"
        );
        let _mask = InterruptMask::new(self);
        let epoch = self.next_epoch();
        self.tree_barrier(epoch)
    }

    /// Full barrier: returns only when every remote invocation posted before
    /// entry — and everything those invocations transitively spawned — has
    /// been dispatched on its destination rank.
    ///
    /// Pre-barrier hooks run first, in registration order, and may post
    /// further invocations. The loop then alternates local quiescence with a
    /// global reduction of the termination counters. During a round no rank
    /// dispatches (waits only reap), so records dispatched between rounds
    /// show up as changed totals; the loop exits once a round is balanced
    /// and identical to the previous one, which monotone counters make a
    /// proof that nothing was in flight when the round sampled them.
    pub fn barrier(&self) -> Result<()> {
        assert!(
            !self.in_dispatch.get(),
            "barrier called from inside a dispatched handler"
        );
        let _mask = InterruptMask::new(self);

        let hooks: Vec<Rc<dyn Fn(&Comm)>> = self.pre_barrier.borrow().clone();
        for hook in &hooks {
            hook(self);
        }

        loop {
            self.pump_until_quiet()?;
            let epoch = self.next_epoch();
            let totals = self.reduce_counts(epoch)?;
            self.stats.record_barrier_round();
            let stable = totals == self.last_barrier_counts.get();
            self.last_barrier_counts.set(totals);
            tracing::trace!(
                rank = self.rank(),
                epoch,
                sent = totals.0,
                received = totals.1,
                stable,
                "barrier round"
            );
            if totals.0 == totals.1 && stable && self.locally_quiet() {
                break;
            }
        }
        self.stats.record_barrier();
        Ok(())
    }

    /// Register a callback invoked at the start of every full barrier, in
    /// registration order. Hooks may post async work; they must not call
    /// barriers or collectives.
    pub fn register_pre_barrier_callback<F: Fn(&Comm) + 'static>(&self, hook: F) {
        self.pre_barrier.borrow_mut().push(Rc::new(hook));
    }

    fn next_epoch(&self) -> u64 {
        let epoch = self.epoch.get() + 1;
        self.epoch.set(epoch);
        epoch
    }

    /// Arrive up the rank tree, release back down.
    fn tree_barrier(&self, epoch: u64) -> Result<()> {
        let me = self.rank();
        let n = self.size();
        for child in tree_children(me, n) {
            let msg = self.barrier_recv(child)?;
            assert_eq!(
                msg,
                ControlMsg::Arrive { epoch },
                "rank {child} is out of step with the barrier sequence"
            );
        }
        if let Some(parent) = tree_parent(me) {
            self.send_ctrl(parent, &ControlMsg::Arrive { epoch })?;
            let msg = self.barrier_recv(parent)?;
            assert_eq!(
                msg,
                ControlMsg::Release { epoch },
                "rank {parent} is out of step with the barrier sequence"
            );
        }
        for child in tree_children(me, n) {
            self.send_ctrl(child, &ControlMsg::Release { epoch })?;
        }
        Ok(())
    }

    /// Tree all-reduce of `(sent_count, received_count)` on the barrier
    /// channel. Doubles as the round's synchronization point.
    fn reduce_counts(&self, epoch: u64) -> Result<(u64, u64)> {
        let me = self.rank();
        let n = self.size();
        let mut sent = self.sent_count.get();
        let mut received = self.received_count.get();

        for child in tree_children(me, n) {
            match self.barrier_recv(child)? {
                ControlMsg::Counts {
                    epoch: e,
                    sent: s,
                    received: r,
                } => {
                    assert_eq!(e, epoch, "rank {child} is out of step with the barrier");
                    sent += s;
                    received += r;
                }
                other => panic!("expected counts from rank {child}, got {other:?}"),
            }
        }

        let (sent, received) = if let Some(parent) = tree_parent(me) {
            self.send_ctrl(parent, &ControlMsg::Counts { epoch, sent, received })?;
            match self.barrier_recv(parent)? {
                ControlMsg::CountsTotal {
                    epoch: e,
                    sent,
                    received,
                } => {
                    assert_eq!(e, epoch, "rank {parent} is out of step with the barrier");
                    (sent, received)
                }
                other => panic!("expected count totals from rank {parent}, got {other:?}"),
            }
        } else {
            (sent, received)
        };

        for child in tree_children(me, n) {
            self.send_ctrl(child, &ControlMsg::CountsTotal { epoch, sent, received })?;
        }
        Ok((sent, received))
    }

    fn send_ctrl(&self, dest: Rank, msg: &ControlMsg) -> Result<()> {
        self.ctrl_send(Channel::Barrier, dest, msg.to_bytes()?)
    }

    fn barrier_recv(&self, src: Rank) -> Result<ControlMsg> {
        let frame = self.ctrl_recv(Channel::Barrier, src)?;
        ControlMsg::from_bytes(&frame)
    }
}
