//! Typed collectives over the user channel.
//!
//! Collectives never pump the async channel: callers that need prior async
//! work finished quiesce it first, typically with [`Comm::barrier`].

use std::io::Write;
use std::ops::Add;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Comm;
use super::barrier::{InterruptMask, tree_children, tree_parent};
use crate::codec;
use crate::error::Result;
use crate::transport::Channel;
use crate::types::Rank;

impl Comm {
    /// Reduce `value` across all ranks with `merge`, returning the result on
    /// every rank. `merge` must be commutative and associative.
    pub fn all_reduce<T, F>(&self, value: T, merge: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(T, T) -> T,
    {
        assert!(
            !self.in_dispatch.get(),
            "collective called from inside a dispatched handler"
        );
        let _mask = InterruptMask::new(self);
        let me = self.rank();
        let n = self.size();

        let mut acc = value;
        for child in tree_children(me, n) {
            let frame = self.ctrl_recv(Channel::User, child)?;
            acc = merge(acc, codec::unpack(&frame)?);
        }

        let total = if let Some(parent) = tree_parent(me) {
            self.ctrl_send(Channel::User, parent, Bytes::from(codec::pack(&acc)?))?;
            codec::unpack(&self.ctrl_recv(Channel::User, parent)?)?
        } else {
            acc
        };

        let packed = Bytes::from(codec::pack(&total)?);
        for child in tree_children(me, n) {
            self.ctrl_send(Channel::User, child, packed.clone())?;
        }
        Ok(total)
    }

    pub fn all_reduce_sum<T>(&self, value: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Add<Output = T>,
    {
        self.all_reduce(value, |a, b| a + b)
    }

    pub fn all_reduce_min<T>(&self, value: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + PartialOrd,
    {
        self.all_reduce(value, |a, b| if b < a { b } else { a })
    }

    pub fn all_reduce_max<T>(&self, value: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + PartialOrd,
    {
        self.all_reduce(value, |a, b| if b > a { b } else { a })
    }

    /// Distribute `root`'s value to every rank; the `value` argument of the
    /// other ranks is discarded.
    pub fn broadcast<T>(&self, value: T, root: Rank) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        assert!(
            root < self.size(),
            "broadcast from out-of-range rank {root} (size {})",
            self.size()
        );
        assert!(
            !self.in_dispatch.get(),
            "collective called from inside a dispatched handler"
        );
        let _mask = InterruptMask::new(self);
        let me = self.rank();
        let n = self.size();
        let rel = (me + n - root) % n;

        let packed = if rel == 0 {
            Bytes::from(codec::pack(&value)?)
        } else {
            let parent = (tree_parent(rel).unwrap_or(0) + root) % n;
            Bytes::from(self.ctrl_recv(Channel::User, parent)?)
        };
        for child_rel in tree_children(rel, n) {
            let child = (child_rel + root) % n;
            self.ctrl_send(Channel::User, child, packed.clone())?;
        }
        codec::unpack(&packed)
    }

    /// Raw typed point-to-point on the user channel, for administrative
    /// exchanges outside the active-message path. Not counted for
    /// termination.
    pub fn p2p_send<T: Serialize>(&self, dest: Rank, value: &T) -> Result<()> {
        assert!(
            dest < self.size(),
            "p2p send to out-of-range rank {dest} (size {})",
            self.size()
        );
        assert!(
            !self.in_dispatch.get(),
            "p2p_send called from inside a dispatched handler"
        );
        self.ctrl_send(Channel::User, dest, Bytes::from(codec::pack(value)?))
    }

    /// Blocking receive matching [`p2p_send`](Self::p2p_send) from `src`.
    pub fn p2p_recv<T: DeserializeOwned>(&self, src: Rank) -> Result<T> {
        assert!(
            src < self.size(),
            "p2p receive from out-of-range rank {src} (size {})",
            self.size()
        );
        assert!(
            !self.in_dispatch.get(),
            "p2p_recv called from inside a dispatched handler"
        );
        codec::unpack(&self.ctrl_recv(Channel::User, src)?)
    }

    /// Aggregate statistics over all ranks and print them on rank 0.
    /// Collective: every rank must call it.
    pub fn stats_print<W: Write>(&self, label: &str, out: &mut W) -> Result<()> {
        let totals = self.all_reduce(self.stats(), crate::stats::StatsSnapshot::merged)?;
        if self.rank0() {
            writeln!(out, "==== {} stats: {label} ====", env!("CARGO_PKG_NAME"))?;
            writeln!(out, "ranks              {}", self.size())?;
            writeln!(out, "posted             {}", totals.posted)?;
            writeln!(out, "dispatched         {}", totals.dispatched)?;
            writeln!(out, "forwarded          {}", totals.forwarded)?;
            writeln!(out, "bytes sent         {}", totals.bytes_sent)?;
            writeln!(out, "bytes received     {}", totals.bytes_received)?;
            writeln!(out, "buffers flushed    {}", totals.buffers_flushed)?;
            writeln!(out, "barriers           {}", totals.barriers)?;
            writeln!(out, "barrier rounds     {}", totals.barrier_rounds)?;
        }
        Ok(())
    }
}
