//! Stack-safe lazy evaluation.
//!
//! [`Eval<A>`] describes how to obtain a value of type `A` through zero or
//! more deferred steps. Building an `Eval` never runs user code; calling
//! [`Eval::value`] drives an explicit trampoline that keeps the host stack
//! flat no matter how many `map`/`flat_map` calls were chained or how deep
//! a `defer`-based recursion goes.
//!
//! # Evaluation strategies
//!
//! | Constructor       | Runs                 | Caches |
//! |-------------------|----------------------|--------|
//! | [`Eval::now`]     | immediately (caller) | yes    |
//! | [`Eval::later`]   | on first forcing     | yes    |
//! | [`Eval::always`]  | on every forcing     | no     |
//! | [`Eval::defer`]   | on every forcing     | no     |
//!
//! # Examples
//!
//! ```rust
//! use stackless::control::Eval;
//!
//! fn count_down(n: u64) -> Eval<u64> {
//!     if n == 0 {
//!         Eval::now(0)
//!     } else {
//!         Eval::defer(move || count_down(n - 1)).map(|steps| steps + 1)
//!     }
//! }
//!
//! assert_eq!(count_down(100_000).value(), 100_000);
//! ```

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

use super::and_then::{Chain, step};
use super::either::Either;
use super::erased::{Payload, Shared, share, take};
use super::release::Released;
use crate::typeclass::{MonadRec, TypeConstructor};

type Thunk = Box<dyn FnOnce() -> Shared + Send>;

/// What a memo cell computes on its first forcing.
enum Source {
    /// Behind [`Eval::later`].
    Thunk(Thunk),
    /// Behind [`Eval::memoize`]; evaluated by the trampoline itself.
    Node(Node),
}

enum MemoState {
    Unforced(Source),
    Forcing(ThreadId),
    Settled,
    Poisoned,
}

/// Memo cell behind [`Eval::later`] and [`Eval::memoize`].
///
/// The first forcing thread claims the source and fills `value` once the
/// trampoline reaches it; other threads block on `settled` until then.
struct Memo {
    value: OnceLock<Shared>,
    state: Mutex<MemoState>,
    settled: Condvar,
}

enum Claim {
    Ready(Shared),
    Evaluate(Source, Fill),
}

impl Memo {
    fn new(source: Source) -> Self {
        Self {
            value: OnceLock::new(),
            state: Mutex::new(MemoState::Unforced(source)),
            settled: Condvar::new(),
        }
    }

    /// Returns the cached value, or hands the source to the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if the cell was poisoned by an earlier forcing, or if it is
    /// forced again by the thread that is computing it.
    fn claim(cell: &Released<Self>) -> Claim {
        if let Some(value) = cell.value.get() {
            return Claim::Ready(Arc::clone(value));
        }
        let current = thread::current().id();
        let mut state = cell.state.lock();
        loop {
            if let Some(value) = cell.value.get() {
                return Claim::Ready(Arc::clone(value));
            }
            let owner = match &*state {
                MemoState::Unforced(_) => break,
                MemoState::Forcing(owner) => *owner,
                MemoState::Settled => unreachable!("a settled cell always holds its value"),
                MemoState::Poisoned => {
                    panic!("memoized Eval has been poisoned: its computation panicked during an earlier forcing")
                }
            };
            assert!(owner != current, "memoized Eval was forced while computing its own value");
            cell.settled.wait(&mut state);
        }
        match mem::replace(&mut *state, MemoState::Forcing(current)) {
            MemoState::Unforced(source) => Claim::Evaluate(source, Fill(Some(cell.clone()))),
            _ => unreachable!("the cell was unforced under the same lock"),
        }
    }

    fn finish(&self, outcome: Option<&Shared>) {
        let mut state = self.state.lock();
        *state = match outcome {
            Some(value) => {
                let _ = self.value.set(Arc::clone(value));
                MemoState::Settled
            }
            None => MemoState::Poisoned,
        };
        drop(state);
        self.settled.notify_all();
    }
}

/// A claimed memo cell waiting for its value. Poisons the cell if dropped
/// unfilled, which only happens while unwinding.
struct Fill(Option<Released<Memo>>);

impl Fill {
    fn complete(mut self, value: &Shared) {
        if let Some(cell) = self.0.take() {
            cell.finish(Some(value));
        }
    }
}

impl Drop for Fill {
    fn drop(&mut self) {
        if let Some(cell) = self.0.take() {
            cell.finish(None);
        }
    }
}

#[derive(Clone)]
enum Node {
    Now(Shared),
    Later(Released<Memo>),
    Always(Released<dyn Fn() -> Shared + Send + Sync>),
    Defer(Released<dyn Fn() -> Self + Send + Sync>),
    /// Leaves of the chain produce a shared `Node`.
    FlatMapped(Released<Self>, Chain),
}

/// Work waiting for the value currently being computed.
enum Frame {
    Continue(Chain),
    Fill(Fill),
}

/// Applies the first leaf of `chain` to a forced value.
///
/// The remaining leaves, if any, are pushed back onto `frames`.
fn apply_first(chain: &Chain, value: Shared, frames: &mut SmallVec<[Frame; 8]>) -> Node {
    let (leaf, rest) = chain.split_first();
    if let Some(rest) = rest {
        frames.push(Frame::Continue(rest));
    }
    match leaf.apply(Ok(value)) {
        Ok(next) => take::<Node>(next),
        Err(_) => unreachable!("Eval continuations have no failure channel"),
    }
}

fn evaluate(root: Node) -> Shared {
    let mut current = root;
    let mut frames: SmallVec<[Frame; 8]> = SmallVec::new();
    loop {
        let value = match current {
            Node::Now(value) => value,
            Node::Always(thunk) => thunk(),
            Node::Defer(thunk) => {
                current = thunk();
                continue;
            }
            Node::FlatMapped(source, chain) => {
                frames.push(Frame::Continue(chain));
                current = (*source).clone();
                continue;
            }
            Node::Later(cell) => match Memo::claim(&cell) {
                Claim::Ready(value) => value,
                Claim::Evaluate(Source::Thunk(thunk), fill) => {
                    let value = thunk();
                    fill.complete(&value);
                    value
                }
                Claim::Evaluate(Source::Node(node), fill) => {
                    frames.push(Frame::Fill(fill));
                    current = node;
                    continue;
                }
            },
        };
        current = loop {
            match frames.pop() {
                Some(Frame::Fill(fill)) => fill.complete(&value),
                Some(Frame::Continue(chain)) => break apply_first(&chain, value, &mut frames),
                None => return value,
            }
        };
    }
}

/// A lazily computed value of type `A`.
///
/// `Eval` is immutable and cheap to clone. Forcing it with [`value`] may
/// happen any number of times: `now` and `later` nodes produce their value
/// once, `always` and `defer` nodes rerun their thunk on every forcing.
///
/// [`value`]: Eval::value
///
/// # Examples
///
/// ```rust
/// use stackless::control::Eval;
///
/// let eval = Eval::now(20)
///     .map(|n| n + 1)
///     .flat_map(|n| Eval::later(move || n * 2));
/// assert_eq!(eval.value(), 42);
/// ```
pub struct Eval<A> {
    node: Node,
    _marker: PhantomData<fn() -> A>,
}

impl<A> Eval<A> {
    #[inline]
    const fn from_node(node: Node) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }
}

impl<A: Payload> Eval<A> {
    /// Wraps an already computed value.
    #[inline]
    pub fn now(value: A) -> Self {
        Self::from_node(Node::Now(share(value)))
    }

    /// Alias for [`Eval::now`].
    #[inline]
    pub fn pure(value: A) -> Self {
        Self::now(value)
    }

    /// Computes the value on first forcing and caches it.
    ///
    /// Concurrent forcings of the same `Eval` (or any clone of it) run the
    /// thunk exactly once; every caller observes the same value.
    ///
    /// # Panics
    ///
    /// If the thunk panics, the panic propagates and the `Eval` is
    /// poisoned: every later forcing panics as well.
    ///
    /// ```rust
    /// use stackless::control::Eval;
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// let calls = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&calls);
    /// let eval = Eval::later(move || {
    ///     counter.fetch_add(1, Ordering::SeqCst);
    ///     42
    /// });
    ///
    /// assert_eq!(eval.value(), 42);
    /// assert_eq!(eval.value(), 42);
    /// assert_eq!(calls.load(Ordering::SeqCst), 1);
    /// ```
    pub fn later<F>(thunk: F) -> Self
    where
        F: FnOnce() -> A + Send + 'static,
    {
        Self::from_node(Node::Later(Released::of(Memo::new(Source::Thunk(Box::new(
            move || share(thunk()),
        ))))))
    }

    /// Computes the value on every forcing, without caching.
    pub fn always<F>(thunk: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::from_node(Node::Always(Released::new(Arc::new(move || share(thunk())))))
    }

    /// Defers the construction of an `Eval` until it is forced.
    ///
    /// This is the building block for stack-safe recursion: the recursive
    /// call happens inside the trampoline, not on the caller's stack.
    pub fn defer<F>(thunk: F) -> Self
    where
        F: Fn() -> Self + Send + Sync + 'static,
    {
        Self::from_node(Node::Defer(Released::new(Arc::new(move || thunk().node))))
    }

    /// Appends an erased continuation without forcing anything.
    fn push<B>(self, chain: Chain) -> Eval<B> {
        let node = match self.node {
            Node::FlatMapped(source, existing) => Node::FlatMapped(source, existing.and_then(&chain)),
            other => Node::FlatMapped(Released::of(other), chain),
        };
        Eval::from_node(node)
    }

    /// Transforms the eventual value.
    ///
    /// Mapping an already composed `Eval` appends to its continuation
    /// chain, so a long run of `map` calls stays flat.
    pub fn map<B, F>(self, function: F) -> Eval<B>
    where
        B: Payload,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        self.push(Chain::single(step(move |value: A| {
            Ok::<_, Infallible>(Node::Now(share(function(value))))
        })))
    }

    /// Sequences a dependent computation.
    pub fn flat_map<B, F>(self, function: F) -> Eval<B>
    where
        B: Payload,
        F: Fn(A) -> Eval<B> + Send + Sync + 'static,
    {
        self.push(Chain::single(step(move |value: A| {
            Ok::<_, Infallible>(function(value).node)
        })))
    }

    /// Alias for [`Eval::flat_map`].
    #[inline]
    pub fn and_then<B, F>(self, function: F) -> Eval<B>
    where
        B: Payload,
        F: Fn(A) -> Eval<B> + Send + Sync + 'static,
    {
        self.flat_map(function)
    }

    /// Forces `self`, discards its value, then continues with `next`.
    pub fn then<B: Payload>(self, next: Eval<B>) -> Eval<B> {
        self.flat_map(move |_| next.clone())
    }

    /// Combines two evaluations, left to right.
    pub fn map2<B, C, F>(self, other: Eval<B>, function: F) -> Eval<C>
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

    /// Pairs two evaluations.
    pub fn product<B: Payload>(self, other: Eval<B>) -> Eval<(A, B)> {
        self.map2(other, |first, second| (first, second))
    }

    /// Forces the evaluation and returns the value.
    ///
    /// Runs in constant stack depth with respect to the number of chained
    /// steps and the depth of `defer` recursion.
    ///
    /// # Panics
    ///
    /// Propagates panics from user thunks and continuations, and panics
    /// when forcing a poisoned [`Eval::later`].
    pub fn value(&self) -> A {
        take::<A>(evaluate(self.node.clone()))
    }

    /// Returns an `Eval` that forces `self` at most once.
    ///
    /// `now` and `later` evaluations are returned unchanged. Anything else
    /// is computed by the trampoline on first forcing, so memoizing every
    /// step of a long chain stays stack-safe; concurrent forcings share the
    /// single computation, and a panic during it poisons the result like
    /// [`Eval::later`].
    pub fn memoize(self) -> Self {
        if matches!(self.node, Node::Now(_) | Node::Later(_)) {
            return self;
        }
        Self::from_node(Node::Later(Released::of(Memo::new(Source::Node(self.node)))))
    }

    /// Returns `true` if the value is already available without running
    /// any thunk.
    pub fn is_now(&self) -> bool {
        match &self.node {
            Node::Now(_) => true,
            Node::Later(memo) => memo.value.get().is_some(),
            _ => false,
        }
    }
}

impl<A> Clone for Eval<A> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<A> fmt::Debug for Eval<A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match &self.node {
            Node::Now(_) => "Now",
            Node::Later(_) => "Later",
            Node::Always(_) => "Always",
            Node::Defer(_) => "Defer",
            Node::FlatMapped(..) => "FlatMapped",
        };
        formatter.debug_tuple("Eval").field(&tag).finish()
    }
}

impl<A: Payload + Default> Default for Eval<A> {
    fn default() -> Self {
        Self::now(A::default())
    }
}

// =============================================================================
// Type Class Implementations
// =============================================================================

impl<A> TypeConstructor for Eval<A> {
    type Inner = A;
    type WithType<B> = Eval<B>;
}

impl<A: Payload> MonadRec for Eval<A> {
    fn lift_pure<B: Payload>(value: B) -> Self::WithType<B> {
        Eval::now(value)
    }

    fn fmap_with<B, C, F>(source: Self::WithType<B>, function: F) -> Self::WithType<C>
    where
        B: Payload,
        C: Payload,
        F: Fn(B) -> C + Send + Sync + 'static,
    {
        source.map(function)
    }

    /// Each iteration is a continuation run by the trampoline, so the loop
    /// is as lazy and as stack-safe as any other `Eval`.
    fn tail_rec_m<S, F>(initial: S, step: F) -> Self
    where
        S: Payload,
        F: Fn(S) -> Self::WithType<Either<S, Self::Inner>> + Send + Sync + 'static,
    {
        fn iterate<S, A, F>(state: S, step: Arc<F>) -> Eval<A>
        where
            S: Payload,
            A: Payload,
            F: Fn(S) -> Eval<Either<S, A>> + Send + Sync + 'static,
        {
            let next = Arc::clone(&step);
            step(state).flat_map(move |outcome| match outcome {
                Either::Left(state) => iterate(state, Arc::clone(&next)),
                Either::Right(value) => Eval::now(value),
            })
        }

        let step = Arc::new(step);
        Self::defer(move || iterate(initial.clone(), Arc::clone(&step)))
    }
}

static_assertions::assert_impl_all!(Eval<i32>: Send, Sync, Clone);
static_assertions::assert_impl_all!(Eval<String>: Send, Sync, Clone);
