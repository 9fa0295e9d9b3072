use super::helpers::{base_handlers, run_ranks};
use axon::AxonConfig;

#[test]
fn test_all_reduce_sum_of_ranks() {
    run_ranks(6, AxonConfig::default(), base_handlers(), |comm| {
        let n = u64::from(comm.size());
        let total = comm.all_reduce_sum(u64::from(comm.rank()) + 1).unwrap();
        assert_eq!(total, n * (n + 1) / 2);
    });
}

#[test]
fn test_all_reduce_min_max() {
    run_ranks(5, AxonConfig::default(), base_handlers(), |comm| {
        let value = i64::from(comm.rank()) * 10 - 20;
        assert_eq!(comm.all_reduce_min(value).unwrap(), -20);
        assert_eq!(comm.all_reduce_max(value).unwrap(), 20);

        let f = f64::from(comm.rank()) + 0.5;
        assert_eq!(comm.all_reduce_min(f).unwrap(), 0.5);
        assert_eq!(comm.all_reduce_max(f).unwrap(), 4.5);
    });
}

#[test]
fn test_all_reduce_custom_merge() {
    run_ranks(4, AxonConfig::default(), base_handlers(), |comm| {
        let mine = vec![u32::from(comm.rank())];
        let mut all = comm
            .all_reduce(mine, |mut a, b| {
                a.extend(b);
                a
            })
            .unwrap();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3]);
    });
}

#[test]
fn test_broadcast_value() {
    run_ranks(5, AxonConfig::default(), base_handlers(), |comm| {
        let mine = if comm.rank() == 3 {
            String::from("authoritative")
        } else {
            String::from("discarded")
        };
        let got = comm.broadcast(mine, 3).unwrap();
        assert_eq!(got, "authoritative");
    });
}

#[test]
fn test_broadcast_from_rank0() {
    run_ranks(4, AxonConfig::default(), base_handlers(), |comm| {
        let got = comm.broadcast((comm.rank(), 99u8), 0).unwrap();
        assert_eq!(got, (0, 99));
    });
}

#[test]
fn test_p2p_ring_exchange() {
    run_ranks(4, AxonConfig::default(), base_handlers(), |comm| {
        let next = (comm.rank() + 1) % comm.size();
        let prev = (comm.rank() + comm.size() - 1) % comm.size();
        comm.p2p_send(next, &(comm.rank(), "token")).unwrap();
        let (from, tag): (u32, String) = comm.p2p_recv(prev).unwrap();
        assert_eq!(from, prev);
        assert_eq!(tag, "token");
    });
}

#[test]
fn test_collectives_repeat_cleanly() {
    run_ranks(3, AxonConfig::default(), base_handlers(), |comm| {
        for round in 0..10u64 {
            let total = comm.all_reduce_sum(round).unwrap();
            assert_eq!(total, round * 3);
        }
    });
}

#[test]
fn test_stats_print_aggregates_on_rank0() {
    run_ranks(3, AxonConfig::default(), base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        comm.post((comm.rank() + 1) % comm.size(), super::helpers::Increment, (counter, 1))
            .unwrap();
        comm.barrier().unwrap();

        let mut out = Vec::new();
        comm.stats_print("exchange", &mut out).unwrap();
        if comm.rank0() {
            let text = String::from_utf8(out).unwrap();
            assert!(text.contains("exchange"));
            let field = |name: &str| -> u64 {
                text.lines()
                    .find(|l| l.starts_with(name))
                    .and_then(|l| l.split_whitespace().last())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(|| panic!("missing {name} in:\n{text}"))
            };
            assert_eq!(field("posted"), 3);
            assert_eq!(field("dispatched"), 3);
        } else {
            assert!(out.is_empty());
        }
    });
}

#[test]
fn test_stats_reset() {
    run_ranks(2, AxonConfig::default(), base_handlers(), |comm| {
        let counter = comm.make_anchor(0u64);
        comm.post(0, super::helpers::Increment, (counter, 1)).unwrap();
        comm.barrier().unwrap();
        assert!(comm.stats().posted > 0);
        comm.stats_reset();
        assert_eq!(comm.stats().posted, 0);
        // Termination counters are not statistics and survive the reset.
        if comm.rank0() {
            assert_eq!(comm.received_count(), 2);
        }
    });
}
