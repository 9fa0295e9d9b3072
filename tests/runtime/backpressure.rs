use super::helpers::{Blob, Increment, base_handlers, run_ranks};
use axon::AxonConfig;

fn tight_config() -> AxonConfig {
    let mut cfg = AxonConfig::default();
    cfg.buffer_bytes = 512;
    cfg.high_water_bytes = 4 * 1024;
    cfg.recv_buffer_bytes = 1024;
    cfg.fabric_frames = 4;
    cfg
}

#[test]
fn test_flood_completes_under_tight_limits() {
    // A one-sided flood far past every configured limit: the sender pumps
    // at the high-water mark instead of growing buffers, and the barrier
    // still reaches quiescence with nothing lost.
    const FLOOD: u64 = 100_000;
    run_ranks(2, tight_config(), base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        if comm.rank0() {
            for _ in 0..FLOOD {
                comm.post(1, Increment, (counter, 1)).unwrap();
            }
        }
        comm.barrier().unwrap();
        let expected = if comm.rank() == 1 { FLOOD } else { 0 };
        assert_eq!(*comm.get(counter).borrow(), expected);
        assert_eq!(comm.received_count(), expected);
    });
}

#[test]
fn test_bidirectional_flood() {
    const FLOOD: u64 = 20_000;
    run_ranks(2, tight_config(), base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        let peer = (comm.rank() + 1) % 2;
        for _ in 0..FLOOD {
            comm.post(peer, Increment, (counter, 1)).unwrap();
        }
        comm.barrier().unwrap();
        assert_eq!(*comm.get(counter).borrow(), FLOOD);
    });
}

#[test]
fn test_record_larger_than_buffers() {
    // One record bigger than the soft threshold, the receive buffers, and
    // the high-water mark travels on its own frame.
    run_ranks(2, tight_config(), base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        if comm.rank0() {
            comm.post(1, Blob, (counter, vec![0x5A; 64 * 1024])).unwrap();
        }
        comm.barrier().unwrap();
        let expected = if comm.rank() == 1 { 64 * 1024 } else { 0 };
        assert_eq!(*comm.get(counter).borrow(), expected);
    });
}

#[test]
fn test_flood_from_inside_handlers() {
    // Handlers posting under pressure take the enqueue-only path; the
    // barrier still converges.
    const DEPTH: u64 = 5_000;
    run_ranks(3, tight_config(), base_handlers(), |comm| {
        if comm.rank0() {
            comm.post(1, super::helpers::Hop, (DEPTH,)).unwrap();
        }
        comm.barrier().unwrap();
        let received = comm.all_reduce_sum(comm.received_count()).unwrap();
        assert_eq!(received, DEPTH + 1);
    });
}
