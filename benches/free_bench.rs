//! Benchmark for Program interpretation.
//!
//! Compares direct interpretation with fold_map into Result and Eval.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use stackless::control::{Eval, Instruction, Program};
use std::hint::black_box;

#[derive(Clone, Debug)]
enum Counter {
    Read,
    Add(i64),
}

impl Instruction for Counter {
    type Response = i64;
}

fn build(depth: usize) -> Program<Counter, i64> {
    let mut program = Program::pure(0);
    for _ in 0..depth {
        program = program.flat_map(|_| Program::lift(Counter::Add(1)));
    }
    program.then(Program::lift(Counter::Read))
}

// =============================================================================
// Program Benchmarks
// =============================================================================

fn benchmark_program_build(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("program_build");

    for depth in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |bencher, &depth| {
            bencher.iter(|| black_box(build(depth)));
        });
    }

    group.finish();
}

fn benchmark_program_interpret(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("program_interpret");

    for depth in [100, 1_000, 10_000] {
        let program = build(depth);

        group.bench_with_input(BenchmarkId::new("interpret", depth), &program, |bencher, program| {
            bencher.iter(|| {
                let mut total = 0;
                black_box(program.interpret(|instruction| match instruction {
                    Counter::Read => total,
                    Counter::Add(amount) => {
                        total += amount;
                        total
                    }
                }))
            });
        });

        group.bench_with_input(BenchmarkId::new("fold_map_result", depth), &program, |bencher, program| {
            bencher.iter(|| {
                let result: Result<i64, String> = program.fold_map(|instruction| match instruction {
                    Counter::Read => Ok(0),
                    Counter::Add(amount) => Ok(amount),
                });
                black_box(result)
            });
        });

        group.bench_with_input(BenchmarkId::new("fold_map_eval", depth), &program, |bencher, program| {
            bencher.iter(|| {
                let eval: Eval<i64> = program.fold_map(|instruction| match instruction {
                    Counter::Read => Eval::now(0),
                    Counter::Add(amount) => Eval::now(amount),
                });
                black_box(eval.value())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_program_build, benchmark_program_interpret);

criterion_main!(benches);
