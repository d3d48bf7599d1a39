//! Property tests for arena, ledger and stack laws.

use std::cmp::Ordering;
use std::sync::Arc;

use ellipse_core::memory::{default_backend, HeapBackend};
use ellipse_core::{Ledger, MemoryArena, OomPolicy, TaggedValue, TypedStack};
use proptest::prelude::*;

fn ledger() -> Arc<Ledger> {
    Ledger::new(default_backend(), OomPolicy::Propagate)
}

#[derive(Clone, Debug)]
enum Op {
    Write { offset: usize, bytes: Vec<u8> },
    Reallocate(usize),
    ReallocateForce(usize),
    Strip,
    Free,
    SetUsed(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..4096, proptest::collection::vec(any::<u8>(), 0..256))
            .prop_map(|(offset, bytes)| Op::Write { offset, bytes }),
        (0usize..8192).prop_map(Op::Reallocate),
        (0usize..8192).prop_map(Op::ReallocateForce),
        Just(Op::Strip),
        Just(Op::Free),
        (0usize..8192).prop_map(Op::SetUsed),
    ]
}

fn apply(arena: &mut MemoryArena, op: &Op) {
    // Local refusals (out of bounds, access) are part of the law under test.
    let _ = match op {
        Op::Write { offset, bytes } => arena.write(*offset, bytes),
        Op::Reallocate(n) => arena.reallocate(*n, 1),
        Op::ReallocateForce(n) => arena.reallocate_force(*n, 1),
        Op::Strip => arena.strip(),
        Op::Free => arena.free(),
        Op::SetUsed(n) => arena.set_used(*n),
    };
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn used_never_exceeds_capacity(
        initial in 0usize..4096,
        ops in proptest::collection::vec(arb_op(), 1..40),
    ) {
        let ledger = ledger();
        let mut arena = MemoryArena::allocate(&ledger, initial, 1).unwrap();
        for op in &ops {
            apply(&mut arena, op);
            prop_assert!(arena.used() <= arena.capacity());
            prop_assert_eq!(arena.has_data(), arena.capacity() > 0);
        }
    }

    #[test]
    fn reallocate_round_trip_preserves_prefix(
        data in proptest::collection::vec(any::<u8>(), 1..2048),
        other in 0usize..6000,
    ) {
        let ledger = ledger();
        let original = data.len();
        let mut arena = MemoryArena::allocate(&ledger, original, 1).unwrap();
        arena.write(0, &data).unwrap();
        let keep = original.min(other);

        arena.reallocate(other, 1).unwrap();
        prop_assert_eq!(arena.used(), keep);
        arena.reallocate(original, 1).unwrap();
        prop_assert_eq!(arena.read(0, keep).unwrap(), data[..keep].to_vec());
    }

    #[test]
    fn strip_is_idempotent(
        capacity in 1usize..4096,
        fill in 0usize..4096,
    ) {
        let ledger = ledger();
        let mut arena = MemoryArena::allocate(&ledger, capacity, 1).unwrap();
        arena.set_used(fill.min(capacity)).unwrap();
        arena.strip().unwrap();
        let (cap, used) = (arena.capacity(), arena.used());
        prop_assert_eq!(cap, used);
        arena.strip().unwrap();
        prop_assert_eq!((arena.capacity(), arena.used()), (cap, used));
    }

    #[test]
    fn ledger_equals_sum_of_capacities(
        sizes in proptest::collection::vec(0usize..5000, 1..12),
        free_mask in proptest::collection::vec(any::<bool>(), 12),
    ) {
        let ledger = Ledger::new(Arc::new(HeapBackend::new()), OomPolicy::Propagate);
        let mut arenas: Vec<MemoryArena> = sizes
            .iter()
            .map(|&n| MemoryArena::allocate(&ledger, n, 1).unwrap())
            .collect();
        for (arena, free) in arenas.iter_mut().zip(&free_mask) {
            if *free {
                arena.free().unwrap();
            }
        }
        let total: usize = arenas.iter().map(MemoryArena::capacity).sum();
        prop_assert_eq!(ledger.all_resources_size(), total);

        ledger.all_resources_free().unwrap();
        prop_assert_eq!(ledger.all_resources_size(), 0);
        prop_assert_eq!(ledger.all_resources_used(), 0);
        ledger.all_resources_free().unwrap();
        prop_assert_eq!(ledger.all_resources_size(), 0);
    }

    #[test]
    fn compare_is_antisymmetric(
        a in proptest::collection::vec(any::<u8>(), 0..64),
        b in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let ledger = ledger();
        let mut x = MemoryArena::allocate(&ledger, 64, 1).unwrap();
        let mut y = MemoryArena::allocate(&ledger, 64, 1).unwrap();
        x.write(0, &a).unwrap();
        y.write(0, &b).unwrap();

        prop_assert_eq!(x.mem_compare(&x).unwrap(), Ordering::Equal);
        let xy = x.mem_compare(&y).unwrap();
        let yx = y.mem_compare(&x).unwrap();
        prop_assert_eq!(xy, yx.reverse());
        prop_assert_eq!(xy, a.cmp(&b));
    }

    #[test]
    fn stack_is_lifo(values in proptest::collection::vec(any::<i64>(), 0..400)) {
        let ledger = ledger();
        let mut stack = TypedStack::create(&ledger).unwrap();
        for &v in &values {
            stack.push(v).unwrap();
        }
        for &v in values.iter().rev() {
            prop_assert_eq!(stack.pop().unwrap(), TaggedValue::I64(v));
        }
        prop_assert!(stack.is_empty());
    }
}
