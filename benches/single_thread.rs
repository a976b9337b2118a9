use std::hint::black_box;

use criterion::{Criterion, async_executor::FuturesExecutor, criterion_group, criterion_main};
use gaze::ObservableValue;

const SETS_PER_ITER: u64 = 1_000;

// =================================================================
// Set Throughput Benchmarks
// =================================================================

fn bench_set_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_throughput");

    for listeners in [0usize, 1, 8] {
        group.bench_function(format!("listeners_{listeners}"), |b| {
            let state = ObservableValue::new(0u64);
            for _ in 0..listeners {
                state.subscribe(|value| {
                    black_box(*value);
                });
            }
            b.iter(|| {
                for i in 0..SETS_PER_ITER {
                    state.set(i);
                }
            });
        });
    }

    group.finish();
}

// =================================================================
// Borrow Benchmark
// =================================================================

fn bench_borrow(c: &mut Criterion) {
    c.bench_function("borrow", |b| {
        let state = ObservableValue::new(0u64);
        b.iter(|| {
            black_box(*state.borrow());
        })
    });
}

// =================================================================
// Full Cycle Latency Benchmark
// =================================================================

fn bench_full_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_cycle");

    group.bench_function("next", |b| {
        b.to_async(FuturesExecutor).iter_with_setup(
            || ObservableValue::new(0u64),
            |state| async move {
                let next = state.next();
                state.set(1);
                black_box(next.await.unwrap());
            },
        );
    });

    group.bench_function("watch", |b| {
        b.to_async(FuturesExecutor).iter_with_setup(
            || ObservableValue::new(0u64),
            |state| async move {
                use futures_util::StreamExt;
                let mut changes = state.watch();
                let (value, ()) = futures_util::join!(changes.next(), async { state.set(1) });
                black_box(value);
            },
        );
    });

    group.finish();
}

criterion_group!(benches, bench_set_throughput, bench_borrow, bench_full_cycle);
criterion_main!(benches);
