use super::helpers::{base_handlers, run_ranks};
use axon::container::{
    ArrayAdd, ArrayBinaryOp, ArraySet, ArrayVisit, ArrayVisitor, BagInsert, BinaryOp,
    HashPartitioner,
};
use axon::{Array, AxonConfig, Bag, Comm, HandlerSet};

/// Scales the visited element and adds the element's own index, so the test
/// can tell the visitor saw both the slot and its global position.
struct ScaleAndBias;

impl ArrayVisitor<i64> for ScaleAndBias {
    type Args = (i64,);

    fn visit(_comm: &Comm, index: u64, value: &mut i64, (factor,): Self::Args) {
        *value = *value * factor + index as i64;
    }
}

/// Keeps the largest value seen for a slot.
struct MaxOp;

impl BinaryOp<i64> for MaxOp {
    fn apply(current: &mut i64, incoming: i64) {
        if incoming > *current {
            *current = incoming;
        }
    }
}

fn container_handlers() -> HandlerSet {
    base_handlers()
        .register::<BagInsert<u64>>()
        .register::<BagInsert<String>>()
        .register::<ArraySet<i64>>()
        .register::<ArrayAdd<i64>>()
        .register::<ArrayVisit<i64, ScaleAndBias>>()
        .register::<ArrayBinaryOp<i64, MaxOp>>()
}

#[test]
fn test_bag_insert_balances_round_robin() {
    run_ranks(4, AxonConfig::default(), container_handlers(), |comm| {
        let bag: Bag<u64> = Bag::new(comm);
        for i in 0..10u64 {
            bag.async_insert(u64::from(comm.rank()) * 100 + i).unwrap();
        }
        assert_eq!(bag.size().unwrap(), 40);
        // Each rank started its round-robin at itself: perfectly balanced.
        assert_eq!(bag.local_size(), 10);
    });
}

#[test]
fn test_bag_for_all_sees_local_items() {
    run_ranks(2, AxonConfig::default(), container_handlers(), |comm| {
        let bag: Bag<String> = Bag::new(comm);
        if comm.rank0() {
            bag.async_insert("a".into()).unwrap();
            bag.async_insert("b".into()).unwrap();
        }
        comm.barrier().unwrap();
        let mut seen = 0;
        bag.for_all(|item| {
            assert!(item == "a" || item == "b");
            seen += 1;
        });
        assert_eq!(seen, bag.local_size());
        assert_eq!(comm.all_reduce_sum(seen as u64).unwrap(), 2);
    });
}

#[test]
fn test_bag_gather_to_root() {
    run_ranks(3, AxonConfig::default(), container_handlers(), |comm| {
        let bag: Bag<u64> = Bag::new(comm);
        bag.async_insert(u64::from(comm.rank())).unwrap();
        let mut all = bag.gather_to(0).unwrap();
        if comm.rank0() {
            all.sort_unstable();
            assert_eq!(all, vec![0, 1, 2]);
        } else {
            assert!(all.is_empty());
        }
    });
}

#[test]
fn test_array_set_and_for_all() {
    run_ranks(4, AxonConfig::default(), container_handlers(), |comm| {
        let array: Array<i64> = Array::new(comm, 10, 0);
        comm.barrier().unwrap();
        if comm.rank0() {
            for i in 0..10u64 {
                array.async_set(i, i as i64 * 2).unwrap();
            }
        }
        comm.barrier().unwrap();
        let mut visited = 0u64;
        array.for_all(|index, value| {
            assert_eq!(*value, index as i64 * 2);
            visited += 1;
        });
        // Block partition of 10 over 4 ranks: 3, 3, 3, 1.
        let expected = if comm.rank() == 3 { 1 } else { 3 };
        assert_eq!(visited, expected);
    });
}

#[test]
fn test_array_concurrent_adds_commute() {
    run_ranks(4, AxonConfig::default(), container_handlers(), |comm| {
        let array: Array<i64> = Array::new(comm, 8, 0);
        comm.barrier().unwrap();
        // Every rank bumps every slot; order of arrival is immaterial.
        for i in 0..8u64 {
            array.async_add(i, 1).unwrap();
        }
        comm.barrier().unwrap();
        array.for_all(|_, value| assert_eq!(*value, 4));
    });
}

#[test]
fn test_array_async_visit_runs_at_owner() {
    run_ranks(3, AxonConfig::default(), container_handlers(), |comm| {
        let array: Array<i64> = Array::new(comm, 6, 1);
        comm.barrier().unwrap();
        if comm.rank() == 1 {
            for i in 0..6u64 {
                array.async_visit::<ScaleAndBias>(i, (10,)).unwrap();
            }
        }
        comm.barrier().unwrap();
        // Every slot held 1; the visitor left 1 * 10 + index.
        array.for_all(|index, value| assert_eq!(*value, 10 + index as i64));
    });
}

#[test]
fn test_array_visits_from_all_ranks_compose() {
    run_ranks(4, AxonConfig::default(), container_handlers(), |comm| {
        let array: Array<i64> = Array::new(comm, 8, 1);
        comm.barrier().unwrap();
        // Each rank posts two scale-by-2 visits to slot 0, whose bias term
        // is zero, so the eight visits commute to a single power of two.
        array.async_visit::<ScaleAndBias>(0, (2,)).unwrap();
        array.async_visit::<ScaleAndBias>(0, (2,)).unwrap();
        comm.barrier().unwrap();
        array.for_all(|index, value| {
            let expected = if index == 0 { 1 << 8 } else { 1 };
            assert_eq!(*value, expected);
        });
    });
}

#[test]
fn test_array_binary_op_custom_merge() {
    run_ranks(4, AxonConfig::default(), container_handlers(), |comm| {
        let array: Array<i64> = Array::new(comm, 5, -1);
        comm.barrier().unwrap();
        // Every rank bids on every slot; the largest bid must win no matter
        // the arrival order.
        for i in 0..5u64 {
            let bid = i64::from(comm.rank()) * 100 + i as i64;
            array.async_binary_op::<MaxOp>(i, bid).unwrap();
        }
        comm.barrier().unwrap();
        array.for_all(|index, value| assert_eq!(*value, 300 + index as i64));
    });
}

#[test]
fn test_array_owner_partition() {
    run_ranks(3, AxonConfig::default(), container_handlers(), |comm| {
        let array: Array<i64> = Array::new(comm, 7, 0);
        // ceil(7/3) = 3: ranks own [0..3), [3..6), [6..7).
        assert_eq!(array.owner(0), 0);
        assert_eq!(array.owner(2), 0);
        assert_eq!(array.owner(3), 1);
        assert_eq!(array.owner(6), 2);
        comm.barrier().unwrap();
    });
}

#[test]
fn test_hash_partitioner_agrees_across_ranks() {
    run_ranks(4, AxonConfig::default(), container_handlers(), |comm| {
        let partitioner = HashPartitioner::new(comm.size());
        let mine: Vec<u32> = ["edge", "vertex", "component", "weight"]
            .iter()
            .map(|key| partitioner.owner(*key))
            .collect();
        // Every rank derives the same placement without any exchange.
        let reference = comm.broadcast(mine.clone(), 0).unwrap();
        assert_eq!(mine, reference);
    });
}
