//! Monads with stack-safe tail recursion.
//!
//! [`MonadRec`] is the only protocol [`Program::fold_map`] needs from its
//! target: lift a value, map over a value, and run a monadic loop without
//! growing the stack. Each target decides how its loop stays flat, so the
//! free interpreter inherits stack safety instead of providing it.
//!
//! [`Program::fold_map`]: crate::control::Program::fold_map
//!
//! # Examples
//!
//! ```rust
//! use stackless::control::Either;
//! use stackless::typeclass::MonadRec;
//!
//! // Sum 1..=n with a loop that can fail.
//! let total = <Result<u64, String> as MonadRec>::tail_rec_m((0_u64, 100_000_u64), |(sum, n)| {
//!     if n == 0 {
//!         Ok(Either::Right(sum))
//!     } else {
//!         Ok(Either::Left((sum + n, n - 1)))
//!     }
//! });
//! assert_eq!(total, Ok(5_000_050_000));
//! ```

use super::TypeConstructor;
use crate::control::{Either, Payload};

/// A monad whose recursion can be expressed as a constant-stack loop.
///
/// # Laws
///
/// - `tail_rec_m(s, |s| lift_pure(Right(a)))` is `lift_pure(a)`.
/// - `tail_rec_m(s, f)` where `f` returns `Left(s')` keeps going with `s'`
///   and behaves like the unbounded recursion `f(s).flat_map(...)` while
///   using bounded stack.
pub trait MonadRec: TypeConstructor + Sized {
    /// Lifts a value into the monad, at any argument type.
    fn lift_pure<B: Payload>(value: B) -> Self::WithType<B>;

    /// Maps over a value of the monad, at any argument type.
    fn fmap_with<B, C, F>(source: Self::WithType<B>, function: F) -> Self::WithType<C>
    where
        B: Payload,
        C: Payload,
        F: Fn(B) -> C + Send + Sync + 'static;

    /// Runs `step` from `initial` until it yields `Right`.
    ///
    /// `Left(state)` continues the loop with a new state; `Right(value)`
    /// finishes it.
    fn tail_rec_m<S, F>(initial: S, step: F) -> Self
    where
        S: Payload,
        F: Fn(S) -> Self::WithType<Either<S, Self::Inner>> + Send + Sync + 'static;
}

impl<A> MonadRec for Option<A> {
    fn lift_pure<B: Payload>(value: B) -> Self::WithType<B> {
        Some(value)
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
        let mut state = initial;
        loop {
            match step(state)? {
                Either::Left(next) => state = next,
                Either::Right(value) => return Some(value),
            }
        }
    }
}

impl<T, E> MonadRec for Result<T, E> {
    fn lift_pure<B: Payload>(value: B) -> Self::WithType<B> {
        Ok(value)
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
        let mut state = initial;
        loop {
            match step(state)? {
                Either::Left(next) => state = next,
                Either::Right(value) => return Ok(value),
            }
        }
    }
}
