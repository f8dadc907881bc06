//! Stack-safe function composition.
//!
//! [`FunctionChain<A, B, E>`] is a function `A -> Result<B, E>` assembled
//! from smaller steps. Appending or prepending a step is O(1) and never
//! walks the existing structure; invoking the result is a loop, so a chain
//! composed from a million steps runs in constant stack depth.
//!
//! # Design
//!
//! ```text
//! Link = Single(f)
//!      | ErrorHandler { apply: f, recover: g }
//!      | Concat(Link, Link)
//! ```
//!
//! `and_then` builds `Concat(self, next)`, so repeated appends produce a
//! left-deep tree. Invocation rotates `Concat(Concat(l1, l2), r)` into
//! `l1` followed by `Concat(l2, r)` until the left-most leaf is exposed,
//! applies it, and continues with the right-hand remainder.
//!
//! The same chain doubles as the continuation store of
//! [`Eval`](super::Eval), [`Program`](super::Program) and `IO`: their
//! drivers peel one leaf at a time with the crate-internal `split_first`.
//!
//! # Examples
//!
//! ```rust
//! use stackless::control::FunctionChain;
//!
//! let mut chain: FunctionChain<u64, u64> = FunctionChain::identity();
//! for _ in 0..100_000 {
//!     chain = chain.map(|n| n + 1);
//! }
//! assert_eq!(chain.invoke(0), Ok(100_000));
//! ```

use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::{Arc, LazyLock};

use super::erased::{Payload, Shared, share, take};
use super::release::release;

/// One erased step of a chain: success payload in, success or failure out.
pub(crate) type Step = Arc<dyn Fn(Shared) -> Result<Shared, Shared> + Send + Sync>;

enum Link {
    Single(Step),
    ErrorHandler { apply: Step, recover: Step },
    Concat(Arc<Link>, Arc<Link>),
}

/// Pass-through step. Also the filler swapped into steps released from a
/// dying link.
static PASS: LazyLock<Step> =
    LazyLock::new(|| -> Step { Arc::new(|value: Shared| -> Result<Shared, Shared> { Ok(value) }) });

/// Pass-through leaf. Also the filler swapped into detached `Concat`
/// children while a chain is being dropped.
static IDENTITY: LazyLock<Arc<Link>> = LazyLock::new(|| Arc::new(Link::Single(Arc::clone(&PASS))));

impl Link {
    fn detach_into(&mut self, detached: &mut Vec<Arc<Self>>) {
        if let Self::Concat(left, right) = self {
            detached.push(mem::replace(left, Arc::clone(&IDENTITY)));
            detached.push(mem::replace(right, Arc::clone(&IDENTITY)));
        }
    }
}

/// Hands a step this link owns alone to [`release`], so that whatever its
/// closure captured is not dropped on the current stack.
fn release_step(step: &mut Step) {
    if Arc::get_mut(step).is_some() {
        release(mem::replace(step, Arc::clone(&PASS)));
    }
}

// Dropping a chain with 10^5 nested `Concat`s must not recurse 10^5 times,
// and neither may a chain whose steps capture further chains.
impl Drop for Link {
    fn drop(&mut self) {
        match self {
            Self::Single(step) => release_step(step),
            Self::ErrorHandler { apply, recover } => {
                release_step(apply);
                release_step(recover);
            }
            Self::Concat(..) => {
                let mut detached = Vec::new();
                self.detach_into(&mut detached);
                while let Some(link) = detached.pop() {
                    if let Some(mut owned) = Arc::into_inner(link) {
                        owned.detach_into(&mut detached);
                    }
                }
            }
        }
    }
}

/// The left-most step of a chain, exposed by [`Chain::split_first`].
pub(crate) enum Leaf {
    Single(Step),
    ErrorHandler { apply: Step, recover: Step },
}

impl Leaf {
    /// Applies this step to the running success/failure state.
    ///
    /// `Single` steps skip failures; `ErrorHandler` steps route them to
    /// `recover`, whose own failure stays a failure.
    #[inline]
    pub(crate) fn apply(&self, state: Result<Shared, Shared>) -> Result<Shared, Shared> {
        match (self, state) {
            (Self::Single(step), Ok(value)) => step(value),
            (Self::Single(_), Err(error)) => Err(error),
            (Self::ErrorHandler { apply, .. }, Ok(value)) => apply(value),
            (Self::ErrorHandler { recover, .. }, Err(error)) => recover(error),
        }
    }
}

/// Erased chain shared by [`FunctionChain`] and the interpreters.
#[derive(Clone)]
pub(crate) struct Chain(Arc<Link>);

impl Chain {
    #[inline]
    pub(crate) fn single(step: Step) -> Self {
        Self(Arc::new(Link::Single(step)))
    }

    #[inline]
    pub(crate) fn with_handler(apply: Step, recover: Step) -> Self {
        Self(Arc::new(Link::ErrorHandler { apply, recover }))
    }

    #[inline]
    pub(crate) fn identity() -> Self {
        Self(Arc::clone(&IDENTITY))
    }

    /// `self` followed by `next`. O(1).
    #[inline]
    pub(crate) fn and_then(&self, next: &Self) -> Self {
        Self(Arc::new(Link::Concat(Arc::clone(&self.0), Arc::clone(&next.0))))
    }

    /// Splits off the left-most leaf, rotating left-nested `Concat`s into
    /// the returned remainder.
    ///
    /// After one call on a left-deep chain the remainder is right-deep, so
    /// repeated splitting costs O(1) per leaf.
    pub(crate) fn split_first(&self) -> (Leaf, Option<Self>) {
        let mut left = Arc::clone(&self.0);
        let mut right: Option<Arc<Link>> = None;
        loop {
            let (inner_left, inner_right) = match &*left {
                Link::Single(step) => return (Leaf::Single(Arc::clone(step)), right.map(Self)),
                Link::ErrorHandler { apply, recover } => {
                    let leaf = Leaf::ErrorHandler {
                        apply: Arc::clone(apply),
                        recover: Arc::clone(recover),
                    };
                    return (leaf, right.map(Self));
                }
                Link::Concat(inner_left, inner_right) => {
                    (Arc::clone(inner_left), Arc::clone(inner_right))
                }
            };
            right = Some(match right {
                None => inner_right,
                Some(outer) => Arc::new(Link::Concat(inner_right, outer)),
            });
            left = inner_left;
        }
    }

    /// Runs every step in order, threading the success/failure state.
    pub(crate) fn invoke(&self, input: Result<Shared, Shared>) -> Result<Shared, Shared> {
        let mut state = input;
        let mut current = self.clone();
        loop {
            let (leaf, rest) = current.split_first();
            state = leaf.apply(state);
            match rest {
                Some(next) => current = next,
                None => return state,
            }
        }
    }

    #[cfg(test)]
    fn left_spine(&self) -> usize {
        let mut depth = 0;
        let mut current = Arc::clone(&self.0);
        while let Link::Concat(left, _) = &*Arc::clone(&current) {
            depth += 1;
            current = Arc::clone(left);
        }
        depth
    }
}

/// Builds an erased step from a typed fallible function.
#[inline]
pub(crate) fn step<A, B, E, F>(function: F) -> Step
where
    A: Payload,
    B: Payload,
    E: Payload,
    F: Fn(A) -> Result<B, E> + Send + Sync + 'static,
{
    Arc::new(move |value| function(take::<A>(value)).map(share).map_err(share))
}

/// A composed function `A -> Result<B, E>` with O(1) composition and
/// constant-stack invocation.
///
/// # Type Parameters
///
/// * `A` - The input type.
/// * `B` - The success output type.
/// * `E` - The error channel. Defaults to [`Infallible`] for chains that
///   cannot fail.
///
/// # Laws
///
/// - **Identity**: `identity().and_then(f)` and `f.and_then(identity())`
///   behave like `f`.
/// - **Associativity**: `f.and_then(g).and_then(h)` behaves like
///   `f.and_then(g.and_then(h))`.
/// - **Short-circuit**: once a step fails, every following `single` step is
///   skipped until a `with_handler` step recovers.
///
/// # Examples
///
/// ```rust
/// use stackless::control::FunctionChain;
///
/// let parse = FunctionChain::try_single(|text: String| {
///     text.parse::<i32>().map_err(|error| error.to_string())
/// });
/// let double = FunctionChain::single(|n: i32| n * 2);
/// let recover = FunctionChain::with_handler(|n: i32| Ok(n), |_: String| Ok(-1));
///
/// let chain = parse.and_then(double).and_then(recover);
/// assert_eq!(chain.invoke("21".to_string()), Ok(42));
/// assert_eq!(chain.invoke("twenty".to_string()), Ok(-1));
/// ```
pub struct FunctionChain<A, B, E = Infallible> {
    chain: Chain,
    _signature: PhantomData<fn(A) -> Result<B, E>>,
}

impl<A, B, E> FunctionChain<A, B, E> {
    #[inline]
    const fn from_chain(chain: Chain) -> Self {
        Self {
            chain,
            _signature: PhantomData,
        }
    }
}

impl<A: Payload, B: Payload, E: Payload> FunctionChain<A, B, E> {
    /// Creates a single-step chain from an infallible function.
    ///
    /// ```rust
    /// use stackless::control::FunctionChain;
    ///
    /// let increment: FunctionChain<i32, i32> = FunctionChain::single(|n| n + 1);
    /// assert_eq!(increment.invoke(41), Ok(42));
    /// ```
    pub fn single<F>(function: F) -> Self
    where
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        Self::try_single(move |input| Ok(function(input)))
    }

    /// Creates a single-step chain from a fallible function.
    ///
    /// An `Err` switches the chain into its failure state.
    pub fn try_single<F>(function: F) -> Self
    where
        F: Fn(A) -> Result<B, E> + Send + Sync + 'static,
    {
        Self::from_chain(Chain::single(step(function)))
    }

    /// Creates a step that also handles failures from earlier steps.
    ///
    /// On success `function` runs; on failure `recover` runs. A failure
    /// returned by `recover` remains a failure.
    ///
    /// ```rust
    /// use stackless::control::FunctionChain;
    ///
    /// let fail: FunctionChain<i32, i32, String> =
    ///     FunctionChain::try_single(|_| Err("boom".to_string()));
    /// let handled = fail.and_then(FunctionChain::with_handler(Ok, |error: String| {
    ///     Ok(error.len() as i32)
    /// }));
    /// assert_eq!(handled.invoke(0), Ok(4));
    /// ```
    pub fn with_handler<F, R>(function: F, recover: R) -> Self
    where
        F: Fn(A) -> Result<B, E> + Send + Sync + 'static,
        R: Fn(E) -> Result<B, E> + Send + Sync + 'static,
    {
        Self::from_chain(Chain::with_handler(step(function), step(recover)))
    }

    /// Appends `next` after this chain. O(1).
    #[inline]
    pub fn and_then<C: Payload>(self, next: FunctionChain<B, C, E>) -> FunctionChain<A, C, E> {
        FunctionChain::from_chain(self.chain.and_then(&next.chain))
    }

    /// Prepends `previous` before this chain. O(1).
    ///
    /// ```rust
    /// use stackless::control::FunctionChain;
    ///
    /// let double: FunctionChain<i32, i32> = FunctionChain::single(|n| n * 2);
    /// let increment = FunctionChain::single(|n: i32| n + 1);
    /// assert_eq!(double.compose(increment).invoke(20), Ok(42));
    /// ```
    #[inline]
    pub fn compose<Z: Payload>(self, previous: FunctionChain<Z, A, E>) -> FunctionChain<Z, B, E> {
        previous.and_then(self)
    }

    /// Appends an infallible function.
    #[inline]
    pub fn map<C, F>(self, function: F) -> FunctionChain<A, C, E>
    where
        C: Payload,
        F: Fn(B) -> C + Send + Sync + 'static,
    {
        self.and_then(FunctionChain::single(function))
    }

    /// Runs the chain on `input`.
    ///
    /// Uses constant stack depth regardless of how the chain was composed.
    ///
    /// # Errors
    ///
    /// Returns the failure produced by the last failing step that no later
    /// handler recovered from.
    pub fn invoke(&self, input: A) -> Result<B, E> {
        self.invoke_result(Ok(input))
    }

    /// Runs the chain starting from an already-known success or failure.
    ///
    /// # Errors
    ///
    /// Returns the failure that remains after every step has run.
    pub fn invoke_result(&self, input: Result<A, E>) -> Result<B, E> {
        self.chain
            .invoke(input.map(share).map_err(share))
            .map(take::<B>)
            .map_err(take::<E>)
    }
}

impl<A: Payload, E: Payload> FunctionChain<A, A, E> {
    /// The chain that returns its input unchanged.
    #[inline]
    pub fn identity() -> Self {
        Self::from_chain(Chain::identity())
    }
}

impl<A, B, E> Clone for FunctionChain<A, B, E> {
    fn clone(&self) -> Self {
        Self::from_chain(self.chain.clone())
    }
}

impl<A, B, E> fmt::Debug for FunctionChain<A, B, E> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("FunctionChain")
            .field(&"<steps>")
            .finish()
    }
}
