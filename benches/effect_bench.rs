//! Benchmark for IO.
//!
//! Measures the interpreter loop for synchronous chains, error recovery,
//! callback boundaries and the tokio bridge.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use stackless::effect::IO;
use std::hint::black_box;

type Io<A> = IO<String, A>;

// =============================================================================
// IO Benchmarks
// =============================================================================

fn benchmark_io_pure(criterion: &mut Criterion) {
    criterion.bench_function("io_pure", |bencher| {
        bencher.iter(|| black_box(Io::pure(black_box(42)).run()));
    });
}

fn benchmark_io_map_chain(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("io_map_chain");

    for depth in [100, 1_000, 10_000] {
        let mut io = Io::new(|| 0_u64);
        for _ in 0..depth {
            io = io.map(|n| n + 1);
        }
        group.bench_with_input(BenchmarkId::new("run", depth), &io, |bencher, io| {
            bencher.iter(|| black_box(io.run()));
        });
    }

    group.finish();
}

fn benchmark_io_flat_map_chain(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("io_flat_map_chain");

    for depth in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("build_and_run", depth), &depth, |bencher, &depth| {
            bencher.iter(|| {
                let mut io = Io::pure(0_u64);
                for _ in 0..depth {
                    io = io.flat_map(|n| Io::pure(n + 1));
                }
                black_box(io.run())
            });
        });
    }

    group.finish();
}

fn benchmark_io_error_recovery(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("io_error_recovery");

    let mut io = Io::<u64>::raise_error("early".to_string());
    for _ in 0..1_000 {
        io = io.map(|n| n + 1);
    }
    let io = io.handle_error(|error| error.len() as u64);
    group.bench_function("skip_1000_then_recover", |bencher| {
        bencher.iter(|| black_box(io.run()));
    });

    group.finish();
}

fn benchmark_io_callback_boundaries(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("io_callback_boundaries");

    for depth in [100, 1_000] {
        let mut io = Io::pure(0_u64);
        for _ in 0..depth {
            io = io.flat_map(|n| {
                IO::asynchronous(move |callback| {
                    let _ = callback.succeed(n + 1);
                })
            });
        }
        group.bench_with_input(BenchmarkId::new("synchronous_completion", depth), &io, |bencher, io| {
            bencher.iter(|| black_box(io.run()));
        });
    }

    group.finish();
}

fn benchmark_io_run_future(criterion: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
    let mut group = criterion.benchmark_group("io_run_future");

    let io = Io::pure(0_u64).map(|n| n + 1).flat_map(|n| Io::pure(n * 2));
    group.bench_function("synchronous_chain", |bencher| {
        bencher.to_async(&runtime).iter(|| io.run_future());
    });

    let io: Io<u64> = IO::from_future(|| async { Ok(1) }).map(|n| n + 1);
    group.bench_function("from_future", |bencher| {
        bencher.to_async(&runtime).iter(|| io.run_future());
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_io_pure,
    benchmark_io_map_chain,
    benchmark_io_flat_map_chain,
    benchmark_io_error_recovery,
    benchmark_io_callback_boundaries,
    benchmark_io_run_future
);

criterion_main!(benches);
