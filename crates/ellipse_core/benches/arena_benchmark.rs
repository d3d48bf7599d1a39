//! # Arena Benchmark
//!
//! Measures:
//! 1. `mem_copy` throughput between two arenas
//! 2. Reallocate growth (mremap vs heap realloc)
//! 3. Typed stack push/pop, including the doubling path

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ellipse_core::memory::{default_backend, HeapBackend};
use ellipse_core::{Ledger, MemoryArena, OomPolicy, TaggedValue, TypedStack};

fn ledger() -> Arc<Ledger> {
    Ledger::new(default_backend(), OomPolicy::Propagate)
}

fn bench_mem_copy(c: &mut Criterion) {
    let ledger = ledger();
    let mut group = c.benchmark_group("arena_mem_copy");

    for size in [4 * 1024, 64 * 1024, 1024 * 1024, 16 * 1024 * 1024] {
        let mut src = MemoryArena::allocate(&ledger, size, 1).unwrap();
        src.mem_set(0x5A).unwrap();
        src.set_used(size).unwrap();
        let mut dst = MemoryArena::allocate(&ledger, size, 1).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                dst.mem_copy(black_box(&src)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_reallocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_grow_1mb_to_16mb");
    let backends: [(&str, Arc<Ledger>); 2] = [
        ("default", ledger()),
        (
            "heap",
            Ledger::new(Arc::new(HeapBackend::new()), OomPolicy::Propagate),
        ),
    ];

    for (name, ledger) in &backends {
        group.bench_function(*name, |b| {
            b.iter(|| {
                let mut arena = MemoryArena::allocate(ledger, 1 << 20, 1).unwrap();
                arena.reallocate(16 << 20, 1).unwrap();
                black_box(arena.capacity())
            });
        });
    }

    group.finish();
}

fn bench_stack(c: &mut Criterion) {
    let ledger = ledger();
    let mut group = c.benchmark_group("typed_stack");

    group.bench_function("push_pop_100", |b| {
        let mut stack = TypedStack::create(&ledger).unwrap();
        b.iter(|| {
            for i in 0..100i64 {
                stack.push(TaggedValue::I64(i)).unwrap();
            }
            for _ in 0..100 {
                black_box(stack.pop().unwrap());
            }
        });
    });

    group.bench_function("push_10k_with_growth", |b| {
        b.iter(|| {
            let mut stack = TypedStack::create(&ledger).unwrap();
            for i in 0..10_000u32 {
                stack.push(i).unwrap();
            }
            black_box(stack.growth_events())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_mem_copy, bench_reallocate, bench_stack);
criterion_main!(benches);
