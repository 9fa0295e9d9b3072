//! The communicator: asynchronous remote invocations, barriers, collectives.

mod barrier;
mod collective;
mod dispatch;
mod progress;
mod send_buffers;

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::anchor::Anchor;
use crate::codec;
use crate::config::AxonConfig;
use crate::error::Result;
use crate::layout::Layout;
use crate::protocol::{FLAG_BCAST, FLAG_ROUTED, RecordHeader};
use crate::registry::{Handler, HandlerSet, LambdaRegistry};
use crate::router::Router;
use crate::stats::{CommStats, StatsSnapshot};
use crate::transport::{BufferPool, CHANNELS, RecvCompletion, Transport};
use crate::types::{LambdaId, Rank};
use send_buffers::SendBuffers;

/// One rank's communicator.
///
/// Constructed once per rank at program start and shared (by reference) with
/// every component for the program's lifetime. The communicator is
/// single-owner: it is neither `Send` nor `Sync`, all progress is made
/// cooperatively from the calls documented as suspension points, and
/// concurrent misuse trips a borrow panic instead of corrupting state.
/// Dropping it runs an implicit terminating full barrier.
pub struct Comm {
    transport: Box<dyn Transport>,
    config: AxonConfig,
    router: Router,
    registry: LambdaRegistry,
    pool: Arc<BufferPool>,

    send: RefCell<SendBuffers>,
    /// Async-channel completions reaped but not yet dispatched.
    recv_queue: RefCell<VecDeque<RecvCompletion>>,
    /// Out-of-order control frames, per source, per channel.
    barrier_stash: RefCell<HashMap<Rank, VecDeque<Vec<u8>>>>,
    user_stash: RefCell<HashMap<Rank, VecDeque<Vec<u8>>>>,

    pre_barrier: RefCell<Vec<Rc<dyn Fn(&Comm)>>>,
    anchors: RefCell<Vec<Rc<dyn Any>>>,

    /// Remote invocations enqueued here, counted at append time.
    sent_count: Cell<u64>,
    /// Records dispatched here (their final destination), counted after the
    /// handler returns. Forwarded records touch neither counter.
    received_count: Cell<u64>,

    in_dispatch: Cell<bool>,
    interrupts_enabled: Cell<bool>,
    /// Collective sequence number on the barrier channel; receivers assert
    /// it to catch interleaved collectives.
    epoch: Cell<u64>,
    /// Totals from the most recent count reduction. The barrier exits only
    /// when a round is both balanced and identical to the previous round —
    /// monotone counters make that pair of facts a quiescence certificate.
    last_barrier_counts: Cell<(u64, u64)>,

    stats: CommStats,
}

impl Comm {
    /// Bind to a transport with configuration from the environment.
    pub fn new(transport: Box<dyn Transport>, handlers: HandlerSet) -> Result<Self> {
        Self::with_config(transport, handlers, AxonConfig::from_env())
    }

    pub fn with_config(
        transport: Box<dyn Transport>,
        handlers: HandlerSet,
        config: AxonConfig,
    ) -> Result<Self> {
        let size = transport.size();
        let rank = transport.rank();
        assert!(size > 0, "communicator must have at least one rank");
        assert!(rank < size, "transport rank {rank} outside group of {size}");

        let layout = Layout::new(size, config.ranks_per_node);
        let router = Router::new(config.route_levels, layout);
        let registry = LambdaRegistry::build(handlers.register::<BcastRelay>());
        let pool = BufferPool::new(config.pool_max_buffers, config.recv_buffer_bytes);

        let comm = Self {
            router,
            registry,
            send: RefCell::new(SendBuffers::new(size, config.buffer_bytes)),
            recv_queue: RefCell::new(VecDeque::new()),
            barrier_stash: RefCell::new(HashMap::new()),
            user_stash: RefCell::new(HashMap::new()),
            pre_barrier: RefCell::new(Vec::new()),
            anchors: RefCell::new(Vec::new()),
            sent_count: Cell::new(0),
            received_count: Cell::new(0),
            in_dispatch: Cell::new(false),
            interrupts_enabled: Cell::new(true),
            epoch: Cell::new(0),
            last_barrier_counts: Cell::new((0, 0)),
            stats: CommStats::default(),
            pool,
            config,
            transport,
        };
        for channel in CHANNELS {
            for _ in 0..comm.config.recv_queue_depth {
                comm.transport
                    .post_recv(channel, comm.pool.checkout(comm.config.recv_buffer_bytes));
            }
        }
        tracing::debug!(
            rank,
            size,
            handlers = comm.registry.len(),
            "communicator ready"
        );
        Ok(comm)
    }

    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    pub fn size(&self) -> u32 {
        self.transport.size()
    }

    pub fn rank0(&self) -> bool {
        self.rank() == 0
    }

    pub fn layout(&self) -> &Layout {
        self.router.layout()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Remote invocations enqueued by this rank so far.
    pub fn sent_count(&self) -> u64 {
        self.sent_count.get()
    }

    /// Remote invocations dispatched on this rank so far.
    pub fn received_count(&self) -> u64 {
        self.received_count.get()
    }

    /// Schedule `H` to run on `dest` with `args`. Never executes inline —
    /// even for `dest == rank()` — and returns without waiting; delivery is
    /// guaranteed by the next full [`barrier`](Self::barrier). Blocks only
    /// to pump progress when the send path is over its high-water mark.
    pub fn post<H: Handler>(&self, dest: Rank, _handler: H, args: H::Args) -> Result<()> {
        let id = self.registry.id_of::<H>();
        let payload = codec::record_payload(id, &args)?;
        self.enqueue(dest, 0, &payload)
    }

    /// Schedule `H` on every rank, including this one, fanning out over a
    /// relay tree rooted here.
    pub fn post_bcast<H: Handler>(&self, _handler: H, args: H::Args) -> Result<()> {
        let inner = self.registry.id_of::<H>();
        let packed = codec::pack(&args)?;
        self.post_relay(self.rank(), self.rank(), inner, &packed)
    }

    /// Schedule `H` on each rank in `dests`. An empty list is a no-op.
    pub fn post_mcast<H: Handler>(&self, dests: &[Rank], _handler: H, args: H::Args) -> Result<()> {
        if dests.is_empty() {
            return Ok(());
        }
        let id = self.registry.id_of::<H>();
        let payload = codec::record_payload(id, &args)?;
        for &dest in dests {
            self.enqueue(dest, 0, &payload)?;
        }
        Ok(())
    }

    /// Frame one record, coalesce it toward its next hop, and count it.
    pub(crate) fn enqueue(&self, dest: Rank, extra_flags: u16, payload: &[u8]) -> Result<()> {
        assert!(
            dest < self.size(),
            "post to out-of-range rank {dest} (size {})",
            self.size()
        );
        let hop = self.router.next_hop(self.rank(), dest);
        let mut flags = extra_flags;
        if hop != dest {
            flags |= FLAG_ROUTED;
        }
        let header = RecordHeader {
            dest,
            payload_size: payload.len() as u32,
            flags,
        };
        self.send
            .borrow_mut()
            .append_record(hop, &header.encode(), payload);
        self.sent_count.set(self.sent_count.get() + 1);
        self.stats.record_post();
        self.backpressure()
    }

    pub(crate) fn post_relay(
        &self,
        dest: Rank,
        root: Rank,
        inner: LambdaId,
        packed_args: &[u8],
    ) -> Result<()> {
        let relay = self.registry.id_of::<BcastRelay>();
        let payload = codec::record_payload(relay, &(root, inner, packed_args.to_vec()))?;
        self.enqueue(dest, FLAG_BCAST, &payload)
    }

    /// Forward the relay one tree level down, then run the wrapped handler
    /// locally.
    fn bcast_relay(&self, root: Rank, inner: LambdaId, packed_args: &[u8]) {
        let n = u64::from(self.size());
        let rel = u64::from((self.rank() + self.size() - root) % self.size());
        for child_rel in [2 * rel + 1, 2 * rel + 2] {
            if child_rel < n {
                let child = (root + child_rel as Rank) % self.size();
                if let Err(e) = self.post_relay(child, root, inner, packed_args) {
                    panic!("broadcast relay to rank {child} failed: {e}");
                }
            }
        }
        if let Err(e) = self.registry.invoke(self, inner, packed_args) {
            panic!(
                "broadcast handler {} failed: {e}",
                self.registry.name_of(inner)
            );
        }
    }

    /// Register `value` as this rank's replica of a collectively-constructed
    /// object. Must be called at the same logical site, in the same order,
    /// on every rank; the returned name is only meaningful under that
    /// discipline.
    pub fn make_anchor<T: 'static>(&self, value: T) -> Anchor<T> {
        let mut anchors = self.anchors.borrow_mut();
        let index = anchors.len() as u32;
        anchors.push(Rc::new(RefCell::new(value)) as Rc<dyn Any>);
        Anchor::new(index)
    }

    /// Dereference an anchor to this rank's replica.
    pub fn get<T: 'static>(&self, anchor: Anchor<T>) -> Rc<RefCell<T>> {
        let entry = {
            let anchors = self.anchors.borrow();
            match anchors.get(anchor.index as usize) {
                Some(rc) => Rc::clone(rc),
                None => panic!(
                    "anchor {} was never constructed on rank {}",
                    anchor.index,
                    self.rank()
                ),
            }
        };
        match entry.downcast::<RefCell<T>>() {
            Ok(rc) => rc,
            Err(_) => panic!(
                "anchor {} does not hold a {}",
                anchor.index,
                std::any::type_name::<T>()
            ),
        }
    }

    /// Rank-prefixed line on stdout.
    pub fn cout<D: fmt::Display>(&self, msg: D) {
        println!("{}: {msg}", self.rank());
    }

    /// Line on stdout from rank 0 only.
    pub fn cout0<D: fmt::Display>(&self, msg: D) {
        if self.rank0() {
            println!("{msg}");
        }
    }

    /// Rank-prefixed line on stderr.
    pub fn cerr<D: fmt::Display>(&self, msg: D) {
        eprintln!("{}: {msg}", self.rank());
    }

    /// Line on stderr from rank 0 only.
    pub fn cerr0<D: fmt::Display>(&self, msg: D) {
        if self.rank0() {
            eprintln!("{msg}");
        }
    }

    /// Print a configuration banner (rank 0 only).
    pub fn welcome(&self) {
        self.cout0(format!(
            "{} v{}\n\
             ranks               {}\n\
             nodes               {}\n\
             routing             {:?}\n\
             send buffer bytes   {}\n\
             high water bytes    {}\n\
             recv buffer bytes   {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.size(),
            self.layout().node_count(),
            self.router.levels(),
            self.config.buffer_bytes,
            self.config.high_water_bytes,
            self.config.recv_buffer_bytes,
        ));
    }

    /// Local counters since construction or the last reset.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Zero the statistics counters (not the termination counters).
    pub fn stats_reset(&self) {
        self.stats.reset();
    }
}

impl Drop for Comm {
    fn drop(&mut self) {
        // Tearing down before local completion is a programming error; the
        // terminating barrier drains everything still in flight. Skipped
        // when unwinding so a failing rank does not hang the rest.
        if std::thread::panicking() {
            return;
        }
        if let Err(e) = self.barrier() {
            tracing::warn!(rank = self.rank(), "terminating barrier failed: {e}");
        }
    }
}

/// System handler that fans a broadcast out over a tree: each hop re-posts
/// the relay to its children, then runs the wrapped handler locally.
pub(crate) struct BcastRelay;

impl Handler for BcastRelay {
    type Args = (Rank, LambdaId, Vec<u8>);

    fn call(comm: &Comm, (root, inner, packed_args): Self::Args) {
        comm.bcast_relay(root, inner, &packed_args);
    }

    fn name() -> &'static str {
        "axon::comm::bcast_relay"
    }
}
