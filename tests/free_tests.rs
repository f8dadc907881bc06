//! Tests for Program<S, A>, the free program over an instruction set.
//!
//! Tests cover:
//! - Direct interpretation with a stateful handler
//! - fold_map into Option, Result, Eval and IO
//! - lift_instruction narrowing a shared response type
//! - Step-by-step execution with resume
//! - Stack safety of long, deeply recursive and eagerly nested programs

#![cfg(feature = "control")]

use rstest::rstest;
use stackless::control::{Eval, Instruction, Program, Resume};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// Instruction Sets
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
enum Counter {
    Read,
    Add(i64),
}

impl Instruction for Counter {
    type Response = i64;
}

fn add(amount: i64) -> Program<Counter, i64> {
    Program::lift(Counter::Add(amount))
}

fn read() -> Program<Counter, i64> {
    Program::lift(Counter::Read)
}

#[derive(Clone, Debug)]
enum Store {
    Get(String),
    Put(String, i64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Reply {
    Value(Option<i64>),
    Stored,
}

impl Instruction for Store {
    type Response = Reply;
}

fn get(key: &str) -> Program<Store, Option<i64>> {
    Program::lift_instruction(Store::Get(key.to_string()), |reply| match reply {
        Reply::Value(value) => value,
        Reply::Stored => None,
    })
}

fn put(key: &str, value: i64) -> Program<Store, ()> {
    Program::lift_instruction(Store::Put(key.to_string(), value), |_| ())
}

// =============================================================================
// Direct Interpretation
// =============================================================================

#[rstest]
fn pure_program_needs_no_handler() {
    let program: Program<Counter, &str> = Program::pure("done");
    assert_eq!(program.interpret(|_| unreachable!("no instructions")), "done");
}

#[rstest]
fn instructions_run_in_order() {
    let program = add(5).then(add(10)).then(read()).map(|total| total * 2);

    let mut total = 0;
    let mut log = Vec::new();
    let result = program.interpret(|instruction| {
        log.push(instruction.clone());
        match instruction {
            Counter::Read => total,
            Counter::Add(amount) => {
                total += amount;
                total
            }
        }
    });

    assert_eq!(result, 30);
    assert_eq!(log, vec![Counter::Add(5), Counter::Add(10), Counter::Read]);
}

#[rstest]
fn responses_feed_later_instructions() {
    let program = add(3).flat_map(|first| add(first * 10)).flat_map(|second| add(-second));

    let mut total = 0;
    let result = program.interpret(|instruction| match instruction {
        Counter::Read => total,
        Counter::Add(amount) => {
            total += amount;
            total
        }
    });
    assert_eq!(result, 0);
}

#[rstest]
fn a_program_can_be_interpreted_many_times() {
    let program = add(1).then(add(1)).then(read());
    for _ in 0..3 {
        let mut total = 0;
        let result = program.interpret(|instruction| match instruction {
            Counter::Read => total,
            Counter::Add(amount) => {
                total += amount;
                total
            }
        });
        assert_eq!(result, 2);
    }
}

#[rstest]
fn lift_instruction_narrows_a_shared_response() {
    let program = put("a", 40)
        .then(put("b", 2))
        .then(get("a"))
        .flat_map(|a| get("b").map(move |b| a.zip(b).map(|(a, b)| a + b)))
        .flat_map(|sum| get("missing").map(move |missing| (sum, missing)));

    let mut store = HashMap::new();
    let result = program.interpret(|instruction| match instruction {
        Store::Get(key) => Reply::Value(store.get(&key).copied()),
        Store::Put(key, value) => {
            store.insert(key, value);
            Reply::Stored
        }
    });
    assert_eq!(result, (Some(42), None));
}

// =============================================================================
// Resume
// =============================================================================

#[rstest]
fn resume_exposes_one_instruction_at_a_time() {
    let program = add(2).flat_map(|n| add(n * 3));

    let Resume::Suspended(first, continuation) = program.resume() else {
        panic!("expected a pending instruction");
    };
    assert_eq!(first, Counter::Add(2));

    let Resume::Suspended(second, continuation) = continuation.resume(2).resume() else {
        panic!("expected a second instruction");
    };
    assert_eq!(second, Counter::Add(6));

    assert!(matches!(continuation.resume(8).resume(), Resume::Done(8)));
}

#[rstest]
fn a_continuation_can_be_resumed_with_different_responses() {
    let program = read().map(|n| n + 1);
    let Resume::Suspended(_, continuation) = program.resume() else {
        panic!("expected a pending instruction");
    };

    let results: Vec<i64> = [1, 10, 100]
        .into_iter()
        .map(|response| continuation.resume(response).interpret(|_| 0))
        .collect();
    assert_eq!(results, vec![2, 11, 101]);
}

// =============================================================================
// fold_map
// =============================================================================

fn parse_all(words: &[&str]) -> Program<Parse, i64> {
    words.iter().fold(Program::pure(0), |program, word| {
        let word = (*word).to_string();
        program.flat_map(move |sum| {
            Program::lift(Parse(word.clone())).map(move |number| sum + number)
        })
    })
}

#[derive(Clone, Debug)]
struct Parse(String);

impl Instruction for Parse {
    type Response = i64;
}

#[rstest]
#[case(&["1", "2", "39"], Ok(42))]
#[case(&["1", "x", "3"], Err("invalid digit found in string".to_string()))]
fn fold_map_into_result(#[case] words: &[&str], #[case] expected: Result<i64, String>) {
    let result: Result<i64, String> =
        parse_all(words).fold_map(|Parse(text)| text.parse::<i64>().map_err(|e| e.to_string()));
    assert_eq!(result, expected);
}

#[rstest]
fn fold_map_into_option_stops_at_none() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let result: Option<i64> = parse_all(&["4", "", "5"]).fold_map(move |Parse(text)| {
        counter.fetch_add(1, Ordering::SeqCst);
        text.parse().ok()
    });
    assert_eq!(result, None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[rstest]
fn fold_map_into_eval_is_lazy() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let eval: Eval<i64> = parse_all(&["20", "22"]).fold_map(move |Parse(text)| {
        let counter = Arc::clone(&counter);
        Eval::later(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            text.parse().unwrap_or_default()
        })
    });

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(eval.value(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[cfg(feature = "effect")]
mod into_io {
    use super::*;
    use stackless::effect::IO;
    use std::sync::atomic::AtomicI64;

    #[rstest]
    fn fold_map_into_io_runs_on_every_execution() {
        let total = Arc::new(AtomicI64::new(0));
        let state = Arc::clone(&total);
        let program = add(5).then(add(7)).then(read());

        let io: IO<String, i64> = program.fold_map(move |instruction| {
            let state = Arc::clone(&state);
            IO::new(move || match &instruction {
                Counter::Read => state.load(Ordering::SeqCst),
                Counter::Add(amount) => state.fetch_add(*amount, Ordering::SeqCst) + amount,
            })
        });

        assert_eq!(total.load(Ordering::SeqCst), 0);
        assert_eq!(io.run(), Ok(12));
        assert_eq!(io.run(), Ok(24));
    }

    #[rstest]
    fn fold_map_into_io_propagates_failures() {
        let io: IO<String, i64> = parse_all(&["1", "oops", "2"]).fold_map(|Parse(text)| {
            IO::invoke(move || text.parse::<i64>().map_err(|_| format!("bad number: {text}")))
        });
        assert_eq!(io.run(), Err("bad number: oops".to_string()));
    }

    #[rstest]
    fn fold_map_into_io_over_100_000_instructions() {
        let mut program = Program::pure(0);
        for _ in 0..100_000 {
            program = program.flat_map(|_| read());
        }
        let io: IO<String, i64> = program.fold_map(|_| IO::pure(1));
        assert_eq!(io.run(), Ok(1));
    }
}

// =============================================================================
// Stack Safety
// =============================================================================

#[rstest]
fn left_nested_program_of_100_000_instructions() {
    let mut program = Program::pure(0);
    for _ in 0..100_000 {
        program = program.flat_map(|_| add(1));
    }

    let mut total = 0;
    let result = program.interpret(|instruction| match instruction {
        Counter::Read => total,
        Counter::Add(amount) => {
            total += amount;
            total
        }
    });
    assert_eq!(result, 100_000);
}

fn repeat(n: u64) -> Program<Counter, i64> {
    if n == 0 {
        read()
    } else {
        add(1).flat_map(move |_| repeat(n - 1))
    }
}

#[rstest]
fn right_nested_recursive_program_of_100_000_instructions() {
    let mut total = 0;
    let result = repeat(100_000).interpret(|instruction| match instruction {
        Counter::Read => total,
        Counter::Add(amount) => {
            total += amount;
            total
        }
    });
    assert_eq!(result, 100_000);
}

#[rstest]
fn fold_map_into_eval_over_100_000_instructions() {
    let eval: Eval<i64> = repeat(100_000).fold_map(|instruction| match instruction {
        Counter::Read => Eval::now(-1),
        Counter::Add(amount) => Eval::now(amount),
    });
    assert_eq!(eval.value(), -1);
}

#[rstest]
fn fold_map_into_result_over_100_000_instructions() {
    let words: Vec<String> = (0..100_000).map(|_| "1".to_string()).collect();
    let words: Vec<&str> = words.iter().map(String::as_str).collect();
    let result: Result<i64, String> =
        parse_all(&words).fold_map(|Parse(text)| text.parse::<i64>().map_err(|e| e.to_string()));
    assert_eq!(result, Ok(100_000));
}

#[rstest]
fn map_chain_of_100_000_after_one_instruction() {
    let mut program = read();
    for _ in 0..100_000 {
        program = program.map(|n| n + 1);
    }
    assert_eq!(program.interpret(|_| 0), 100_000);
}

#[rstest]
fn eagerly_nested_program_of_100_000_interprets_and_drops() {
    let mut program = read();
    for _ in 0..100_000 {
        let previous = program;
        program = add(1).flat_map(move |_| previous.clone());
    }

    let mut total = 0;
    let result = program.interpret(|instruction| match instruction {
        Counter::Read => total,
        Counter::Add(amount) => {
            total += amount;
            total
        }
    });
    assert_eq!(result, 100_000);
    drop(program);
}

#[rstest]
fn dropping_a_long_program_is_stack_safe() {
    let mut program = Program::<Counter, i64>::pure(0);
    for _ in 0..300_000 {
        program = program.flat_map(|_| read());
    }
    drop(program);
}
