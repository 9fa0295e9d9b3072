use std::sync::Arc;

use axon::{Anchor, AxonConfig, Comm, Handler, HandlerSet, MemoryFabric};

/// Run `f` once per rank, each rank on its own thread over an in-process
/// fabric. Communicators drop at the end of `f`, which runs the implicit
/// terminating barrier; a panicking rank skips it so the failure propagates
/// instead of hanging the group.
pub fn run_ranks<F>(size: u32, config: AxonConfig, handlers: HandlerSet, f: F)
where
    F: Fn(&Comm) + Send + Sync + 'static,
{
    let endpoints = MemoryFabric::new(size, &config);
    let f = Arc::new(f);
    let mut joins = Vec::new();
    for endpoint in endpoints {
        let f = Arc::clone(&f);
        let handlers = handlers.clone();
        let config = config.clone();
        joins.push(std::thread::spawn(move || {
            let comm = Comm::with_config(Box::new(endpoint), handlers, config)
                .expect("communicator construction failed");
            f(&comm);
        }));
    }
    for join in joins {
        join.join().expect("rank thread panicked");
    }
}

/// Add `amount` to the anchored counter.
pub struct Increment;

impl Handler for Increment {
    type Args = (Anchor<u64>, u64);

    fn call(comm: &Comm, (slot, amount): Self::Args) {
        *comm.get(slot).borrow_mut() += amount;
    }
}

/// Recursive ring walk: each arrival with `n > 0` re-posts `n - 1` to the
/// next rank.
pub struct Hop;

impl Handler for Hop {
    type Args = (u64,);

    fn call(comm: &Comm, (n,): Self::Args) {
        if n > 0 {
            let next = (comm.rank() + 1) % comm.size();
            comm.post(next, Hop, (n - 1,)).expect("hop re-post failed");
        }
    }
}

/// Payload-carrying handler: adds the blob length to the counter.
pub struct Blob;

impl Handler for Blob {
    type Args = (Anchor<u64>, Vec<u8>);

    fn call(comm: &Comm, (slot, bytes): Self::Args) {
        *comm.get(slot).borrow_mut() += bytes.len() as u64;
    }
}

/// Handler with an empty argument list; observable only through the
/// termination counters.
pub struct Noop;

impl Handler for Noop {
    type Args = ();

    fn call(_comm: &Comm, _args: Self::Args) {}
}

/// The handlers most scenarios need.
pub fn base_handlers() -> HandlerSet {
    HandlerSet::new()
        .register::<Increment>()
        .register::<Hop>()
        .register::<Blob>()
        .register::<Noop>()
}
