use super::helpers::{Increment, base_handlers, run_ranks};
use axon::{AxonConfig, RouteLevels};

fn routed_config(levels: RouteLevels, ranks_per_node: u32) -> AxonConfig {
    let mut cfg = AxonConfig::default();
    cfg.route_levels = levels;
    cfg.ranks_per_node = ranks_per_node;
    cfg
}

#[test]
fn test_two_level_relay_counts_only_at_destination() {
    // 16 ranks on 4 nodes; rank 0 -> rank 15 relays through rank 12.
    let cfg = routed_config(RouteLevels::TwoLevel, 4);
    run_ranks(16, cfg, base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        if comm.rank0() {
            comm.post(15, Increment, (counter, 1)).unwrap();
        }
        comm.barrier().unwrap();

        let expected = if comm.rank() == 15 { 1 } else { 0 };
        assert_eq!(*comm.get(counter).borrow(), expected);
        assert_eq!(comm.received_count(), expected);

        // The relay touched rank 12 without counting it as a receive.
        let expected_forwards = if comm.rank() == 12 { 1 } else { 0 };
        assert_eq!(comm.stats().forwarded, expected_forwards);
    });
}

#[test]
fn test_three_level_relay_chain() {
    // 8 ranks on 4 nodes of 2; rank 1 -> rank 7 relays via 0 then 6.
    let cfg = routed_config(RouteLevels::ThreeLevel, 2);
    run_ranks(8, cfg, base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        if comm.rank() == 1 {
            comm.post(7, Increment, (counter, 1)).unwrap();
        }
        comm.barrier().unwrap();

        let expected = if comm.rank() == 7 { 1 } else { 0 };
        assert_eq!(*comm.get(counter).borrow(), expected);
        assert_eq!(comm.received_count(), expected);

        let expected_forwards = match comm.rank() {
            0 | 6 => 1,
            _ => 0,
        };
        assert_eq!(comm.stats().forwarded, expected_forwards);
    });
}

#[test]
fn test_routed_all_pairs_delivery() {
    for levels in [RouteLevels::TwoLevel, RouteLevels::ThreeLevel] {
        let cfg = routed_config(levels, 2);
        run_ranks(8, cfg, base_handlers(), |comm| {
            let counter = comm.make_anchor(0u64);
            for dest in 0..comm.size() {
                comm.post(dest, Increment, (counter, 1)).unwrap();
            }
            comm.barrier().unwrap();
            assert_eq!(*comm.get(counter).borrow(), u64::from(comm.size()));
            assert_eq!(comm.received_count(), u64::from(comm.size()));
        });
    }
}

#[test]
fn test_routed_recursive_chain_terminates() {
    let cfg = routed_config(RouteLevels::TwoLevel, 4);
    run_ranks(16, cfg, base_handlers(), |comm| {
        if comm.rank0() {
            comm.post(1, super::helpers::Hop, (20,)).unwrap();
        }
        comm.barrier().unwrap();
        let received = comm.all_reduce_sum(comm.received_count()).unwrap();
        assert_eq!(received, 21);
    });
}

#[test]
fn test_self_send_under_routing() {
    let cfg = routed_config(RouteLevels::ThreeLevel, 2);
    run_ranks(4, cfg, base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        comm.post(comm.rank(), Increment, (counter, 2)).unwrap();
        comm.barrier().unwrap();
        assert_eq!(*comm.get(counter).borrow(), 2);
        assert_eq!(comm.stats().forwarded, 0);
    });
}
