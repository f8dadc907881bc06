//! IO - descriptions of synchronous and asynchronous effects.
//!
//! An [`IO<E, A>`] describes a computation that produces an `A` or fails
//! with an `E`. It uniformly represents pure values, failures, deferred
//! synchronous work and callback-based asynchronous work. Nothing runs
//! while an `IO` is being built; a single driver interprets it when one of
//! the execution methods is called.
//!
//! # Design
//!
//! ```text
//! IO<E, A> = Pure(A)
//!          | Failed(E)
//!          | Deferred(() -> IO<E, A>)
//!          | Sequenced(IO<E, X>, FunctionChain<X, IO<E, A>>)
//!          | Asynchronous(Callback<E, A> -> ())
//! ```
//!
//! The driver is a loop. Synchronous steps never grow the host stack, and
//! an asynchronous step either completes during registration (the loop
//! continues in place) or detaches; the callback then re-enters the driver
//! on whichever thread fires it.
//!
//! # Examples
//!
//! ```rust
//! use stackless::effect::IO;
//!
//! let io: IO<String, i32> = IO::pure(3)
//!     .map(|n| n + 1)
//!     .flat_map(|n| IO::pure(n * 2));
//! assert_eq!(io.run(), Ok(8));
//!
//! let recovered: IO<String, i32> = IO::raise_error("boom".to_string())
//!     .map(|n: i32| n + 1)
//!     .handle_error_with(|_| IO::pure(0));
//! assert_eq!(recovered.run(), Ok(0));
//! ```
//!
//! # Side Effect Deferral
//!
//! ```rust
//! use stackless::effect::IO;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let runs = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&runs);
//! let io: IO<String, usize> = IO::new(move || counter.fetch_add(1, Ordering::SeqCst) + 1);
//!
//! assert_eq!(runs.load(Ordering::SeqCst), 0);
//! assert_eq!(io.run(), Ok(1));
//! assert_eq!(io.run(), Ok(2));
//! ```

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

use futures::channel::oneshot;
use parking_lot::Mutex;

use super::callback::{Callback, Completion, Latch, Outcome};
use super::error::EffectError;
use crate::control::and_then::{Chain, Step, step};
use crate::control::erased::{Shared, share, take};
use crate::control::release::Released;
use crate::control::{Either, Eval, Payload};
use crate::typeclass::{MonadRec, TypeConstructor};

type Register = Released<dyn Fn(Arc<Latch>) + Send + Sync>;

#[derive(Clone)]
enum Op {
    Pure(Shared),
    Failed(Shared),
    Deferred(Released<dyn Fn() -> Self + Send + Sync>),
    /// Leaves of the chain produce a shared `Op`.
    Sequenced(Released<Self>, Chain),
    Asynchronous(Register),
}

impl Op {
    const fn tag(&self) -> &'static str {
        match self {
            Self::Pure(_) => "Pure",
            Self::Failed(_) => "Failed",
            Self::Deferred(_) => "Deferred",
            Self::Sequenced(..) => "Sequenced",
            Self::Asynchronous(_) => "Asynchronous",
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

struct Resumption {
    continuation: Option<Chain>,
    on_complete: Completion,
}

/// Rendezvous between the driver and the callback of one registration.
enum Handoff {
    /// `register` is still running on the driver's thread.
    Registering,
    /// The callback fired before `register` returned.
    Completed(Outcome),
    /// `register` returned first; the callback owns the rest of the run.
    Detached(Resumption),
    Finished,
}

fn settle(continuation: Option<Chain>, outcome: Outcome) -> Op {
    let settled = match outcome {
        Ok(value) => Op::Pure(value),
        Err(error) => Op::Failed(error),
    };
    match continuation {
        Some(chain) => Op::Sequenced(Released::of(settled), chain),
        None => settled,
    }
}

/// Feeds a settled outcome to the first leaf of `chain`.
fn advance(chain: &Chain, state: Outcome) -> Op {
    let (leaf, rest) = chain.split_first();
    let next = match leaf.apply(state) {
        Ok(op) => take::<Op>(op),
        Err(error) => Op::Failed(error),
    };
    match rest {
        Some(rest) => Op::Sequenced(Released::of(next), rest),
        None => next,
    }
}

fn resume(handoff: &Mutex<Handoff>, outcome: Outcome) {
    let mut state = handoff.lock();
    match mem::replace(&mut *state, Handoff::Finished) {
        Handoff::Registering => *state = Handoff::Completed(outcome),
        Handoff::Detached(Resumption {
            continuation,
            on_complete,
        }) => {
            drop(state);
            tracing::trace!("asynchronous effect resumed");
            drive(settle(continuation, outcome), on_complete);
        }
        Handoff::Completed(_) | Handoff::Finished => {
            unreachable!("a callback latch fires at most once")
        }
    }
}

/// Interprets `root` until it settles or detaches at an asynchronous
/// boundary.
fn drive(root: Op, on_complete: Completion) {
    let mut current = root;
    loop {
        let (register, continuation) = match current {
            Op::Pure(value) => return on_complete(Ok(value)),
            Op::Failed(error) => return on_complete(Err(error)),
            Op::Deferred(thunk) => {
                current = thunk();
                continue;
            }
            Op::Asynchronous(register) => (register, None),
            Op::Sequenced(prior, chain) => match &*prior {
                Op::Pure(value) => {
                    current = advance(&chain, Ok(Arc::clone(value)));
                    continue;
                }
                Op::Failed(error) => {
                    current = advance(&chain, Err(Arc::clone(error)));
                    continue;
                }
                Op::Deferred(thunk) => {
                    current = Op::Sequenced(Released::of(thunk()), chain);
                    continue;
                }
                Op::Sequenced(inner, inner_chain) => {
                    current = Op::Sequenced(inner.clone(), inner_chain.and_then(&chain));
                    continue;
                }
                Op::Asynchronous(register) => (register.clone(), Some(chain)),
            },
        };

        tracing::trace!("asynchronous effect suspended");
        let handoff = Arc::new(Mutex::new(Handoff::Registering));
        let completion: Completion = {
            let handoff = Arc::clone(&handoff);
            Box::new(move |outcome: Outcome| resume(&handoff, outcome))
        };
        register(Arc::new(Latch::new(completion)));

        let mut state = handoff.lock();
        match mem::replace(&mut *state, Handoff::Finished) {
            Handoff::Completed(outcome) => {
                drop(state);
                tracing::trace!("asynchronous effect completed during registration");
                current = settle(continuation, outcome);
            }
            Handoff::Registering => {
                *state = Handoff::Detached(Resumption {
                    continuation,
                    on_complete,
                });
                return;
            }
            Handoff::Detached(_) | Handoff::Finished => {
                unreachable!("only the driver detaches its own registration")
            }
        }
    }
}

// =============================================================================
// IO
// =============================================================================

/// A description of an effect producing `A` or failing with `E`.
///
/// # Type Parameters
///
/// - `E`: The failure type. Failures are data: they skip `map`/`flat_map`
///   steps until [`attempt`](IO::attempt) or a `handle_error*` method
///   observes them.
/// - `A`: The success type.
///
/// # Monad Laws
///
/// 1. **Left Identity**: `IO::pure(a).flat_map(f)` runs like `f(a)`
/// 2. **Right Identity**: `m.flat_map(IO::pure)` runs like `m`
/// 3. **Associativity**: `m.flat_map(f).flat_map(g)` runs like
///    `m.flat_map(|x| f(x).flat_map(g))`
///
/// # Re-running
///
/// `IO` is immutable and cheap to clone. Each execution re-runs every
/// deferred step from scratch.
pub struct IO<E, A> {
    op: Op,
    _marker: PhantomData<fn() -> Result<A, E>>,
}

impl<E, A> IO<E, A> {
    #[inline]
    const fn from_op(op: Op) -> Self {
        Self {
            op,
            _marker: PhantomData,
        }
    }
}

impl<E: Payload> IO<E, ()> {
    /// An effect that succeeds with `()`.
    #[inline]
    pub fn unit() -> Self {
        Self::pure(())
    }
}

impl<A: Payload> IO<Infallible, A> {
    /// Views an effect that cannot fail as one that may fail with `E`.
    #[inline]
    pub fn widen_error<E: Payload>(self) -> IO<E, A> {
        IO::from_op(self.op)
    }
}

impl<E: Payload, A: Payload> IO<E, A> {
    // =========================================================================
    // Construction
    // =========================================================================

    /// An effect that succeeds with `value`.
    #[inline]
    pub fn pure(value: A) -> Self {
        Self::from_op(Op::Pure(share(value)))
    }

    /// An effect that fails with `error`.
    #[inline]
    pub fn raise_error(error: E) -> Self {
        Self::from_op(Op::Failed(share(error)))
    }

    /// An effect that settles with `result`.
    pub fn from_result(result: Result<A, E>) -> Self {
        match result {
            Ok(value) => Self::pure(value),
            Err(error) => Self::raise_error(error),
        }
    }

    /// Defers a side effect that cannot fail.
    ///
    /// The action runs once per execution of the `IO`.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::from_op(Op::Deferred(Released::new(Arc::new(move || Op::Pure(share(action()))))))
    }

    /// Defers a side effect that may fail; an `Err` becomes a failure of
    /// the `IO`.
    pub fn invoke<F>(action: F) -> Self
    where
        F: Fn() -> Result<A, E> + Send + Sync + 'static,
    {
        Self::from_op(Op::Deferred(Released::new(Arc::new(move || match action() {
            Ok(value) => Op::Pure(share(value)),
            Err(error) => Op::Failed(share(error)),
        }))))
    }

    /// Defers the construction of an `IO`.
    ///
    /// Use this for recursive definitions; the recursive call happens inside
    /// the driver loop.
    pub fn suspend<F>(thunk: F) -> Self
    where
        F: Fn() -> Self + Send + Sync + 'static,
    {
        Self::from_op(Op::Deferred(Released::new(Arc::new(move || thunk().op))))
    }

    /// Defers forcing an [`Eval`].
    pub fn from_eval(eval: Eval<A>) -> Self {
        Self::from_op(Op::Deferred(Released::new(Arc::new(move || Op::Pure(share(eval.value()))))))
    }

    /// An asynchronous effect completed through a [`Callback`].
    ///
    /// `register` runs once per execution. It may complete the callback
    /// before returning, or hand it to another thread, task or timer.
    ///
    /// ```rust
    /// use stackless::effect::IO;
    ///
    /// let io: IO<String, i32> = IO::asynchronous(|callback| {
    ///     std::thread::spawn(move || {
    ///         let _ = callback.succeed(42);
    ///     });
    /// });
    /// assert_eq!(io.run(), Ok(42));
    /// ```
    pub fn asynchronous<F>(register: F) -> Self
    where
        F: Fn(Callback<E, A>) + Send + Sync + 'static,
    {
        Self::from_op(Op::Asynchronous(Released::new(Arc::new(move |latch: Arc<Latch>| {
            register(Callback::new(latch));
        }))))
    }

    /// An asynchronous effect whose registration may itself fail.
    ///
    /// An `Err` from `procedure` is delivered through the same one-shot
    /// latch as the callback, so the effect settles exactly once: if the
    /// callback already completed, the registration failure is dropped.
    ///
    /// ```rust
    /// use stackless::effect::IO;
    ///
    /// let io: IO<String, i32> = IO::run_async(|_callback| Err("no connection".to_string()));
    /// assert_eq!(io.run(), Err("no connection".to_string()));
    /// ```
    pub fn run_async<F>(procedure: F) -> Self
    where
        F: Fn(Callback<E, A>) -> Result<(), E> + Send + Sync + 'static,
    {
        Self::from_op(Op::Asynchronous(Released::new(Arc::new(move |latch: Arc<Latch>| {
            if let Err(error) = procedure(Callback::new(Arc::clone(&latch)))
                && !latch.fire(Err(share(error)))
            {
                tracing::debug!("run_async registration failed after its callback completed; failure discarded");
            }
        }))))
    }

    // =========================================================================
    // Transformation
    // =========================================================================

    /// Appends an erased step; failures short-circuit.
    fn push<B>(self, chain: Chain) -> IO<E, B> {
        let op = match self.op {
            Op::Failed(error) => Op::Failed(error),
            Op::Sequenced(prior, existing) => Op::Sequenced(prior, existing.and_then(&chain)),
            other => Op::Sequenced(Released::of(other), chain),
        };
        IO::from_op(op)
    }

    /// Appends an error-handling step; successes pass through unchanged.
    fn push_handler<E2, B>(self, apply: Step, recover: Step) -> IO<E2, B> {
        let chain = Chain::with_handler(apply, recover);
        let op = match self.op {
            Op::Sequenced(prior, existing) => Op::Sequenced(prior, existing.and_then(&chain)),
            other => Op::Sequenced(Released::of(other), chain),
        };
        IO::from_op(op)
    }

    /// Transforms the success value.
    pub fn map<B, F>(self, function: F) -> IO<E, B>
    where
        B: Payload,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        self.push(Chain::single(step(move |value: A| {
            Ok::<_, Infallible>(Op::Pure(share(function(value))))
        })))
    }

    /// Sequences a dependent effect.
    pub fn flat_map<B, F>(self, function: F) -> IO<E, B>
    where
        B: Payload,
        F: Fn(A) -> IO<E, B> + Send + Sync + 'static,
    {
        self.push(Chain::single(step(move |value: A| {
            Ok::<_, Infallible>(function(value).op)
        })))
    }

    /// Alias for [`IO::flat_map`].
    #[inline]
    pub fn and_then<B, F>(self, function: F) -> IO<E, B>
    where
        B: Payload,
        F: Fn(A) -> IO<E, B> + Send + Sync + 'static,
    {
        self.flat_map(function)
    }

    /// Runs `self`, discards its value, then runs `next`.
    pub fn then<B: Payload>(self, next: IO<E, B>) -> IO<E, B> {
        self.flat_map(move |_| next.clone())
    }

    /// Runs the effectful `function`, then `self`, and applies one to the
    /// other.
    pub fn ap<B, F>(self, function: IO<E, F>) -> IO<E, B>
    where
        B: Payload,
        F: Fn(A) -> B + Payload,
    {
        function.flat_map(move |apply| self.clone().map(move |value| apply(value)))
    }

    /// Runs `self`, then `other`, and combines their values.
    pub fn map2<B, C, F>(self, other: IO<E, B>, function: F) -> IO<E, C>
    where
        B: Payload,
        C: Payload,
        F: Fn(A, B) -> C + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        self.flat_map(move |first| {
            let function = Arc::clone(&function);
            other
                .clone()
                .map(move |second| function(first.clone(), second))
        })
    }

    /// Runs `self`, then `other`, and pairs their values.
    pub fn product<B: Payload>(self, other: IO<E, B>) -> IO<E, (A, B)> {
        self.map2(other, |first, second| (first, second))
    }

    // =========================================================================
    // Error Handling
    // =========================================================================

    /// Transforms the failure value.
    pub fn map_error<E2, F>(self, function: F) -> IO<E2, A>
    where
        E2: Payload,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let op = match self.op {
            Op::Pure(value) => return IO::from_op(Op::Pure(value)),
            op => op,
        };
        Self::from_op(op).push_handler(
            Arc::new(|value: Shared| -> Result<Shared, Shared> { Ok(share(Op::Pure(value))) }),
            step(move |error: E| Ok::<_, Infallible>(Op::Failed(share(function(error))))),
        )
    }

    /// Exposes the outcome as a value; the resulting effect never fails.
    ///
    /// ```rust
    /// use stackless::effect::IO;
    ///
    /// let failed: IO<String, i32> = IO::raise_error("boom".to_string());
    /// assert_eq!(failed.attempt().run(), Ok(Err("boom".to_string())));
    /// ```
    pub fn attempt(self) -> IO<Infallible, Result<A, E>> {
        match self.op {
            Op::Pure(value) => IO::pure(Ok(take::<A>(value))),
            Op::Failed(error) => IO::pure(Err(take::<E>(error))),
            op => Self::from_op(op).push_handler(
                step(|value: A| Ok::<_, Infallible>(Op::Pure(share(Ok::<A, E>(value))))),
                step(|error: E| Ok::<_, Infallible>(Op::Pure(share(Err::<A, E>(error))))),
            ),
        }
    }

    /// Recovers from a failure with another effect.
    pub fn handle_error_with<F>(self, handler: F) -> Self
    where
        F: Fn(E) -> Self + Send + Sync + 'static,
    {
        self.attempt()
            .widen_error::<E>()
            .flat_map(move |outcome| match outcome {
                Ok(value) => Self::pure(value),
                Err(error) => handler(error),
            })
    }

    /// Recovers from a failure with a value.
    pub fn handle_error<F>(self, handler: F) -> Self
    where
        F: Fn(E) -> A + Send + Sync + 'static,
    {
        self.handle_error_with(move |error| Self::pure(handler(error)))
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Runs the effect, delivering its outcome to `callback`.
    ///
    /// Synchronous steps run on the calling thread before this method
    /// returns. At an asynchronous boundary that does not complete during
    /// registration this method returns early, and the rest of the effect
    /// runs on the thread that completes the boundary's [`Callback`].
    ///
    /// `callback` is called at most once; it is dropped uncalled if an
    /// asynchronous boundary's callback is dropped without completing.
    pub fn unsafe_run_async<F>(&self, callback: F)
    where
        F: FnOnce(Result<A, E>) + Send + 'static,
    {
        drive(
            self.op.clone(),
            Box::new(move |outcome: Outcome| {
                callback(outcome.map(take::<A>).map_err(take::<E>));
            }),
        );
    }

    /// Runs the effect and blocks the calling thread until it settles.
    ///
    /// Do not call this from inside an async task; use
    /// [`IO::run_future`] there.
    ///
    /// # Errors
    ///
    /// Returns `Err(EffectError::CallbackDropped)` if an asynchronous
    /// boundary's callback was dropped without completing.
    pub fn try_run(&self) -> Result<Result<A, E>, EffectError> {
        let (sender, receiver) = oneshot::channel();
        self.unsafe_run_async(move |outcome| {
            if sender.send(outcome).is_err() {
                tracing::debug!("IO outcome discarded: the waiting receiver is gone");
            }
        });
        futures::executor::block_on(receiver).map_err(|_| EffectError::CallbackDropped)
    }

    /// Runs the effect and blocks the calling thread until it settles.
    ///
    /// # Panics
    ///
    /// Panics if an asynchronous boundary's callback was dropped without
    /// completing, because the effect can never settle.
    pub fn run(&self) -> Result<A, E> {
        self.try_run().unwrap_or_else(|error| panic!("{error}"))
    }

    /// Runs the effect as a `Future`.
    ///
    /// The effect starts when the future is first polled. Synchronous steps
    /// run inside that poll; asynchronous boundaries wake the future when
    /// they complete.
    ///
    /// # Errors
    ///
    /// The future resolves to `Err(EffectError::CallbackDropped)` if an
    /// asynchronous boundary's callback was dropped without completing.
    pub fn run_future(&self) -> impl Future<Output = Result<Result<A, E>, EffectError>> + Send + 'static {
        let io = self.clone();
        async move {
            let (sender, receiver) = oneshot::channel();
            io.unsafe_run_async(move |outcome| {
                if sender.send(outcome).is_err() {
                    tracing::debug!("IO outcome discarded: the awaiting future is gone");
                }
            });
            receiver.await.map_err(|_| EffectError::CallbackDropped)
        }
    }
}

// =============================================================================
// Tokio Interop
// =============================================================================

#[cfg(feature = "async")]
impl<E: Payload, A: Payload> IO<E, A> {
    /// An asynchronous effect backed by a future.
    ///
    /// `make` builds a fresh future for every execution. The future is
    /// spawned onto the current tokio runtime, or onto the crate's global
    /// runtime when called outside of one.
    ///
    /// ```rust
    /// use stackless::effect::IO;
    ///
    /// let io: IO<String, u32> = IO::from_future(|| async { Ok(21) }).map(|n| n * 2);
    /// assert_eq!(io.run(), Ok(42));
    /// ```
    pub fn from_future<F, Fut>(make: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<A, E>> + Send + 'static,
    {
        Self::asynchronous(move |callback| {
            let future = make();
            super::runtime::handle().spawn(async move {
                if callback.complete(future.await).is_err() {
                    tracing::debug!("future completed an already settled callback");
                }
            });
        })
    }
}

#[cfg(feature = "async")]
impl<E: Payload> IO<E, ()> {
    /// An effect that completes after `duration` without blocking a thread.
    pub fn sleep(duration: std::time::Duration) -> Self {
        Self::from_future(move || async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<E, A> Clone for IO<E, A> {
    fn clone(&self) -> Self {
        Self::from_op(self.op.clone())
    }
}

impl<E, A> fmt::Debug for IO<E, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("IO").field(&self.op.tag()).finish()
    }
}

impl<E: Payload, A: Payload> From<Result<A, E>> for IO<E, A> {
    fn from(result: Result<A, E>) -> Self {
        Self::from_result(result)
    }
}

impl<E: Payload, A: Payload> From<Eval<A>> for IO<E, A> {
    fn from(eval: Eval<A>) -> Self {
        Self::from_eval(eval)
    }
}

impl<E, A> TypeConstructor for IO<E, A> {
    type Inner = A;
    type WithType<B> = IO<E, B>;
}

impl<E: Payload, A: Payload> MonadRec for IO<E, A> {
    fn lift_pure<B: Payload>(value: B) -> Self::WithType<B> {
        IO::pure(value)
    }

    fn fmap_with<B, C, F>(source: Self::WithType<B>, function: F) -> Self::WithType<C>
    where
        B: Payload,
        C: Payload,
        F: Fn(B) -> C + Send + Sync + 'static,
    {
        source.map(function)
    }

    fn tail_rec_m<S, F>(initial: S, step: F) -> Self
    where
        S: Payload,
        F: Fn(S) -> Self::WithType<Either<S, Self::Inner>> + Send + Sync + 'static,
    {
        fn iterate<E, S, A, F>(state: S, step: Arc<F>) -> IO<E, A>
        where
            E: Payload,
            S: Payload,
            A: Payload,
            F: Fn(S) -> IO<E, Either<S, A>> + Send + Sync + 'static,
        {
            let next = Arc::clone(&step);
            step(state).flat_map(move |outcome| match outcome {
                Either::Left(state) => iterate(state, Arc::clone(&next)),
                Either::Right(value) => IO::pure(value),
            })
        }

        let step = Arc::new(step);
        Self::suspend(move || iterate(initial.clone(), Arc::clone(&step)))
    }
}

static_assertions::assert_impl_all!(IO<String, i32>: Send, Sync, Clone);
