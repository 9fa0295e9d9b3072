use super::helpers::{Increment, Noop, base_handlers, run_ranks};
use axon::{AxonConfig, RouteLevels};

#[test]
fn test_bcast_reaches_all_ranks_including_sender() {
    run_ranks(4, AxonConfig::default(), base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        if comm.rank0() {
            comm.post_bcast(Increment, (counter, 1)).unwrap();
        }
        comm.barrier().unwrap();
        assert_eq!(*comm.get(counter).borrow(), 1);
        // Every rank dispatched exactly one relay record.
        assert_eq!(comm.received_count(), 1);
        let sent = comm.all_reduce_sum(comm.sent_count()).unwrap();
        assert_eq!(sent, u64::from(comm.size()));
    });
}

#[test]
fn test_bcast_empty_args() {
    run_ranks(4, AxonConfig::default(), base_handlers(), |comm| {
        if comm.rank() == 2 {
            comm.post_bcast(Noop, ()).unwrap();
        }
        comm.barrier().unwrap();
        assert_eq!(comm.received_count(), 1);
    });
}

#[test]
fn test_bcast_from_each_root() {
    run_ranks(5, AxonConfig::default(), base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        // Five broadcasts, one per root, all in flight together.
        comm.post_bcast(Increment, (counter, 1)).unwrap();
        comm.barrier().unwrap();
        assert_eq!(*comm.get(counter).borrow(), u64::from(comm.size()));
    });
}

#[test]
fn test_bcast_composes_with_routing() {
    let mut cfg = AxonConfig::default();
    cfg.route_levels = RouteLevels::TwoLevel;
    cfg.ranks_per_node = 3;
    run_ranks(9, cfg, base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        if comm.rank() == 4 {
            comm.post_bcast(Increment, (counter, 3)).unwrap();
        }
        comm.barrier().unwrap();
        assert_eq!(*comm.get(counter).borrow(), 3);
        assert_eq!(comm.received_count(), 1);
    });
}

#[test]
fn test_bcast_single_rank() {
    run_ranks(1, AxonConfig::default(), base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        comm.post_bcast(Increment, (counter, 9)).unwrap();
        comm.barrier().unwrap();
        assert_eq!(*comm.get(counter).borrow(), 9);
        assert_eq!(comm.sent_count(), 1);
        assert_eq!(comm.received_count(), 1);
    });
}
