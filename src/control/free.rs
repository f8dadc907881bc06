//! Free programs over arbitrary instruction sets.
//!
//! A [`Program<S, A>`] is a description: a sequence of instructions of type
//! `S` whose results feed later steps, finally producing an `A`. Nothing
//! happens until the program is interpreted, either directly with
//! [`Program::interpret`] or into any [`MonadRec`] target with
//! [`Program::fold_map`].
//!
//! # Design
//!
//! ```text
//! Program<S, A> = Done(A)
//!               | Instruction(S)
//!               | FlatMapped(Program<S, X>, FunctionChain<X, Program<S, A>>)
//! ```
//!
//! `flat_map` on a `FlatMapped` program appends to its chain in O(1).
//! Interpretation first normalizes the program with a loop that re-associates
//! nested `FlatMapped` nodes and feeds `Done` values into the chain, so the
//! head is always a single pending instruction or the final value.
//!
//! # Examples
//!
//! ```rust
//! use stackless::control::{Instruction, Program};
//!
//! #[derive(Clone, Debug)]
//! enum Counter {
//!     Read,
//!     Add(i64),
//! }
//!
//! impl Instruction for Counter {
//!     type Response = i64;
//! }
//!
//! let program = Program::lift(Counter::Add(5))
//!     .then(Program::lift(Counter::Add(10)))
//!     .then(Program::lift(Counter::Read));
//!
//! let mut total = 0;
//! let result = program.interpret(|instruction| match instruction {
//!     Counter::Read => total,
//!     Counter::Add(amount) => {
//!         total += amount;
//!         total
//!     }
//! });
//! assert_eq!(result, 15);
//! ```

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::and_then::{Chain, step};
use super::either::Either;
use super::erased::{Payload, Shared, share, take};
use crate::typeclass::MonadRec;

/// An instruction set a [`Program`] can be built from.
///
/// `Response` is what an interpreter hands back for one instruction. When
/// instructions answer with different shapes, make `Response` an enum and
/// narrow it with [`Program::lift_instruction`].
pub trait Instruction: Clone + Send + Sync + 'static {
    /// Value an interpreter returns for one instruction.
    type Response: Payload;
}

enum Node<S> {
    Done(Shared),
    Instruction(S),
    /// Leaves of the chain produce a shared `Node<S>`.
    FlatMapped(Arc<Self>, Chain),
}

impl<S: Clone> Clone for Node<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Done(value) => Self::Done(Arc::clone(value)),
            Self::Instruction(instruction) => Self::Instruction(instruction.clone()),
            Self::FlatMapped(source, chain) => Self::FlatMapped(Arc::clone(source), chain.clone()),
        }
    }
}

/// Normalizes a program until its head is `Done` or a pending instruction.
fn normalize<S: Instruction>(root: Node<S>) -> Node<S> {
    let mut current = root;
    loop {
        current = match current {
            Node::FlatMapped(source, chain) => {
                if matches!(*source, Node::Instruction(_)) {
                    return Node::FlatMapped(source, chain);
                }
                match &*source {
                    // Built below when a continuation returns a composed program.
                    Node::FlatMapped(inner, inner_chain) => {
                        Node::FlatMapped(Arc::clone(inner), inner_chain.and_then(&chain))
                    }
                    Node::Done(value) => {
                        let (leaf, rest) = chain.split_first();
                        let next = match leaf.apply(Ok(Arc::clone(value))) {
                            Ok(next) => take::<Node<S>>(next),
                            Err(_) => unreachable!("program continuations have no failure channel"),
                        };
                        match rest {
                            Some(rest) => Node::FlatMapped(Arc::new(next), rest),
                            None => next,
                        }
                    }
                    Node::Instruction(_) => unreachable!("pending instructions return above"),
                }
            }
            terminal => return terminal,
        };
    }
}

/// A program of instructions `S` producing an `A`.
///
/// Programs are immutable, cheap to clone, and may be interpreted any
/// number of times, by different interpreters.
///
/// # Laws
///
/// - **Left Identity**: `Program::pure(a).flat_map(f)` interprets like `f(a)`
/// - **Right Identity**: `m.flat_map(Program::pure)` interprets like `m`
/// - **Associativity**: `m.flat_map(f).flat_map(g)` interprets like
///   `m.flat_map(|x| f(x).flat_map(g))`
///
/// # Stack Safety
///
/// Neither building nor interpreting a program recurses per composed step:
/// chains of 100,000+ `flat_map` calls interpret in constant stack depth.
pub struct Program<S, A> {
    node: Node<S>,
    _result: PhantomData<fn() -> A>,
}

/// Result of running a program up to its next instruction.
pub enum Resume<S: Instruction, A> {
    /// The program finished.
    Done(A),
    /// The program is waiting for the response to an instruction.
    Suspended(S, Continuation<S, A>),
}

/// The rest of a suspended program, waiting for an instruction's response.
pub struct Continuation<S, A> {
    rest: Option<Chain>,
    _signature: PhantomData<fn(S) -> A>,
}

impl<S: Instruction, A: Payload> Continuation<S, A> {
    /// Feeds the instruction's response into the rest of the program.
    ///
    /// A continuation may be resumed several times, each time producing an
    /// independent program.
    pub fn resume(&self, response: S::Response) -> Program<S, A> {
        let done = Node::Done(share(response));
        let node = match &self.rest {
            Some(chain) => Node::FlatMapped(Arc::new(done), chain.clone()),
            None => done,
        };
        Program::from_node(node)
    }
}

impl<S, A> Clone for Continuation<S, A> {
    fn clone(&self) -> Self {
        Self {
            rest: self.rest.clone(),
            _signature: PhantomData,
        }
    }
}

impl<S, A> Program<S, A> {
    #[inline]
    const fn from_node(node: Node<S>) -> Self {
        Self {
            node,
            _result: PhantomData,
        }
    }
}

impl<S: Instruction> Program<S, S::Response> {
    /// Lifts one instruction; the program's result is its response.
    #[inline]
    pub const fn lift(instruction: S) -> Self {
        Self::from_node(Node::Instruction(instruction))
    }
}

impl<S: Instruction, A: Payload> Program<S, A> {
    /// A program that performs no instructions.
    #[inline]
    pub fn pure(value: A) -> Self {
        Self::from_node(Node::Done(share(value)))
    }

    /// Lifts one instruction and narrows its response with `extract`.
    ///
    /// ```rust
    /// use stackless::control::{Instruction, Program};
    ///
    /// #[derive(Clone)]
    /// enum Kv {
    ///     Get(String),
    ///     Put(String, String),
    /// }
    ///
    /// #[derive(Clone)]
    /// enum Reply {
    ///     Value(Option<String>),
    ///     Stored,
    /// }
    ///
    /// impl Instruction for Kv {
    ///     type Response = Reply;
    /// }
    ///
    /// fn get(key: &str) -> Program<Kv, Option<String>> {
    ///     Program::lift_instruction(Kv::Get(key.to_string()), |reply| match reply {
    ///         Reply::Value(value) => value,
    ///         Reply::Stored => None,
    ///     })
    /// }
    ///
    /// let program = get("answer");
    /// let result = program.interpret(|_| Reply::Value(Some("42".to_string())));
    /// assert_eq!(result.as_deref(), Some("42"));
    /// ```
    pub fn lift_instruction<F>(instruction: S, extract: F) -> Self
    where
        F: Fn(S::Response) -> A + Send + Sync + 'static,
    {
        Program::lift(instruction).map(extract)
    }

    fn push<B>(self, chain: Chain) -> Program<S, B> {
        let node = match self.node {
            Node::FlatMapped(source, existing) => Node::FlatMapped(source, existing.and_then(&chain)),
            other => Node::FlatMapped(Arc::new(other), chain),
        };
        Program::from_node(node)
    }

    /// Transforms the program's result.
    pub fn map<B, F>(self, function: F) -> Program<S, B>
    where
        B: Payload,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        self.push(Chain::single(step(move |value: A| {
            Ok::<_, Infallible>(Node::<S>::Done(share(function(value))))
        })))
    }

    /// Continues with a program chosen from this program's result.
    pub fn flat_map<B, F>(self, function: F) -> Program<S, B>
    where
        B: Payload,
        F: Fn(A) -> Program<S, B> + Send + Sync + 'static,
    {
        self.push(Chain::single(step(move |value: A| {
            Ok::<_, Infallible>(function(value).node)
        })))
    }

    /// Alias for [`Program::flat_map`].
    #[inline]
    pub fn and_then<B, F>(self, function: F) -> Program<S, B>
    where
        B: Payload,
        F: Fn(A) -> Program<S, B> + Send + Sync + 'static,
    {
        self.flat_map(function)
    }

    /// Runs `self`, discards its result, then runs `next`.
    pub fn then<B: Payload>(self, next: Program<S, B>) -> Program<S, B> {
        self.flat_map(move |_| next.clone())
    }

    /// Normalizes the program without interpreting anything.
    ///
    /// Nested `flat_map`s are re-associated and continuations waiting on
    /// plain values are applied, until the head is the final value or the
    /// next pending instruction.
    ///
    /// ```rust
    /// use stackless::control::{Instruction, Program};
    ///
    /// #[derive(Clone, Debug)]
    /// struct Ping;
    ///
    /// impl Instruction for Ping {
    ///     type Response = ();
    /// }
    ///
    /// let program: Program<Ping, i32> = Program::pure(20).map(|n| n + 1).map(|n| n * 2);
    /// assert_eq!(format!("{:?}", program.step()), "Done(\"<value>\")");
    /// ```
    pub fn step(&self) -> Self {
        Self::from_node(normalize(self.node.clone()))
    }

    /// Runs the program up to its next instruction.
    pub fn resume(&self) -> Resume<S, A> {
        match normalize(self.node.clone()) {
            Node::Done(value) => Resume::Done(take::<A>(value)),
            Node::Instruction(instruction) => Resume::Suspended(
                instruction,
                Continuation {
                    rest: None,
                    _signature: PhantomData,
                },
            ),
            Node::FlatMapped(source, chain) => match &*source {
                Node::Instruction(instruction) => Resume::Suspended(
                    instruction.clone(),
                    Continuation {
                        rest: Some(chain),
                        _signature: PhantomData,
                    },
                ),
                _ => unreachable!("normalize stops only at Done or at a pending instruction"),
            },
        }
    }

    /// Interprets the program with a synchronous handler.
    ///
    /// This is `fold_map` into the identity monad, written as a direct loop.
    pub fn interpret<H>(&self, mut handler: H) -> A
    where
        H: FnMut(S) -> S::Response,
    {
        let mut program = self.clone();
        loop {
            match program.resume() {
                Resume::Done(value) => return value,
                Resume::Suspended(instruction, continuation) => {
                    program = continuation.resume(handler(instruction));
                }
            }
        }
    }

    /// Interprets the program into the monad `M`.
    ///
    /// Each instruction is translated by `interpreter`; sequencing and stack
    /// safety come from `M`'s own [`MonadRec::tail_rec_m`].
    ///
    /// ```rust
    /// use stackless::control::{Instruction, Program};
    ///
    /// #[derive(Clone)]
    /// enum Parse {
    ///     Number(String),
    /// }
    ///
    /// impl Instruction for Parse {
    ///     type Response = i64;
    /// }
    ///
    /// let program = Program::lift(Parse::Number("40".into()))
    ///     .flat_map(|a| Program::lift(Parse::Number("2".into())).map(move |b| a + b));
    ///
    /// let parsed: Result<i64, String> = program.fold_map(|Parse::Number(text)| {
    ///     text.parse::<i64>().map_err(|error| error.to_string())
    /// });
    /// assert_eq!(parsed, Ok(42));
    /// ```
    pub fn fold_map<M, I>(&self, interpreter: I) -> M
    where
        M: MonadRec<Inner = A>,
        I: Fn(S) -> M::WithType<S::Response> + Send + Sync + 'static,
    {
        M::tail_rec_m(self.clone(), move |program: Self| match program.resume() {
            Resume::Done(value) => M::lift_pure(Either::Right(value)),
            Resume::Suspended(instruction, continuation) => {
                M::fmap_with(interpreter(instruction), move |response| {
                    Either::Left(continuation.resume(response))
                })
            }
        })
    }
}

impl<S: Clone, A> Clone for Program<S, A> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<S: fmt::Debug, A> fmt::Debug for Program<S, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Node::Done(_) => formatter.debug_tuple("Done").field(&"<value>").finish(),
            Node::Instruction(instruction) => {
                formatter.debug_tuple("Instruction").field(instruction).finish()
            }
            Node::FlatMapped(..) => formatter
                .debug_struct("FlatMapped")
                .field("continuation", &"<chain>")
                .finish_non_exhaustive(),
        }
    }
}

impl<S: Instruction, A: fmt::Debug> fmt::Debug for Resume<S, A>
where
    S: fmt::Debug,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(value) => formatter.debug_tuple("Done").field(value).finish(),
            Self::Suspended(instruction, _) => formatter
                .debug_tuple("Suspended")
                .field(instruction)
                .finish_non_exhaustive(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Tape {
        Read,
        Write(i32),
    }

    impl Instruction for Tape {
        type Response = i32;
    }

    fn run(program: &Program<Tape, i32>, mut tape: i32) -> (i32, i32) {
        let result = program.interpret(|instruction| match instruction {
            Tape::Read => tape,
            Tape::Write(value) => {
                tape = value;
                value
            }
        });
        (result, tape)
    }

    #[rstest]
    fn pure_needs_no_handler() {
        let program: Program<Tape, i32> = Program::pure(7);
        assert_eq!(run(&program, 0), (7, 0));
    }

    #[rstest]
    fn resume_exposes_the_first_instruction() {
        let program = Program::lift(Tape::Write(3)).then(Program::lift(Tape::Read));
        match program.resume() {
            Resume::Suspended(instruction, continuation) => {
                assert_eq!(instruction, Tape::Write(3));
                match continuation.resume(3).resume() {
                    Resume::Suspended(next, _) => assert_eq!(next, Tape::Read),
                    Resume::Done(_) => panic!("expected a second instruction"),
                }
            }
            Resume::Done(_) => panic!("expected an instruction"),
        }
    }

    #[rstest]
    fn map_on_pure_resumes_to_done() {
        let program: Program<Tape, i32> = Program::pure(20).map(|n| n + 1).map(|n| n * 2);
        assert!(matches!(program.resume(), Resume::Done(42)));
    }

    #[rstest]
    fn continuation_can_be_resumed_twice() {
        let program = Program::lift(Tape::Read).map(|n| n * 10);
        let Resume::Suspended(_, continuation) = program.resume() else {
            panic!("expected an instruction");
        };
        assert!(matches!(continuation.resume(1).resume(), Resume::Done(10)));
        assert!(matches!(continuation.resume(2).resume(), Resume::Done(20)));
    }

    #[rstest]
    fn interpreting_twice_replays_every_instruction() {
        let program = Program::lift(Tape::Read).flat_map(|n| Program::lift(Tape::Write(n + 1)));
        assert_eq!(run(&program, 1), (2, 2));
        assert_eq!(run(&program, 10), (11, 11));
    }

    #[rstest]
    fn normalize_reassociates_a_composed_program_returned_by_a_continuation() {
        let program = Program::<Tape, i32>::pure(4)
            .flat_map(|n| Program::lift(Tape::Read).map(move |read| read + n))
            .map(|n| n * 2);

        let Node::FlatMapped(source, chain) = &program.node else {
            panic!("expected a composed program");
        };
        let Node::Done(value) = &**source else {
            panic!("expected a plain value at the head");
        };
        let (leaf, rest) = chain.split_first();
        let Ok(next) = leaf.apply(Ok(Arc::clone(value))) else {
            panic!("continuations do not fail");
        };
        assert!(matches!(take::<Node<Tape>>(next), Node::FlatMapped(..)));
        assert!(rest.is_some());

        assert_eq!(run(&program, 1), (10, 1));
    }

    #[rstest]
    fn step_stops_at_the_first_pending_instruction() {
        let program = Program::<Tape, i32>::pure(1)
            .map(|n| n + 1)
            .flat_map(|n| Program::lift(Tape::Write(n)))
            .map(|n| n * 3);
        let stepped = program.step();
        assert!(matches!(
            &stepped.node,
            Node::FlatMapped(source, _) if matches!(**source, Node::Instruction(Tape::Write(2)))
        ));
        assert_eq!(run(&stepped, 0), (6, 2));
    }

    #[rstest]
    fn debug_shows_pending_instruction() {
        let program = Program::lift(Tape::Write(1));
        assert_eq!(format!("{program:?}"), "Instruction(Write(1))");
    }
}
