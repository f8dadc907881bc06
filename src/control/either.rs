//! Either type - the step result of tail-recursive monadic loops.
//!
//! [`MonadRec::tail_rec_m`](crate::typeclass::MonadRec::tail_rec_m) drives a
//! loop whose body returns `Left(next_state)` to keep going and
//! `Right(result)` to stop. The type is also handy on its own as a plain
//! two-way sum.
//!
//! # Examples
//!
//! ```rust
//! use stackless::control::Either;
//!
//! fn step(n: u32) -> Either<u32, &'static str> {
//!     if n == 0 { Either::Right("done") } else { Either::Left(n - 1) }
//! }
//!
//! let mut state = 3;
//! let result = loop {
//!     match step(state) {
//!         Either::Left(next) => state = next,
//!         Either::Right(done) => break done,
//!     }
//! };
//! assert_eq!(result, "done");
//! ```

use std::fmt;

/// A value that is either `Left(L)` or `Right(R)`.
///
/// In loop position `Left` means "continue with this state" and `Right`
/// means "finished with this value".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Either<L, R> {
    /// The left variant; in a loop, the next state.
    Left(L),
    /// The right variant; in a loop, the final result.
    Right(R),
}

impl<L, R> Either<L, R> {
    /// Returns `true` if this is a `Left` value.
    #[inline]
    pub const fn is_left(&self) -> bool {
        matches!(self, Self::Left(_))
    }

    /// Returns `true` if this is a `Right` value.
    #[inline]
    pub const fn is_right(&self) -> bool {
        matches!(self, Self::Right(_))
    }

    /// Returns the left value, if any.
    #[inline]
    pub fn left(self) -> Option<L> {
        match self {
            Self::Left(value) => Some(value),
            Self::Right(_) => None,
        }
    }

    /// Returns the right value, if any.
    #[inline]
    pub fn right(self) -> Option<R> {
        match self {
            Self::Left(_) => None,
            Self::Right(value) => Some(value),
        }
    }

    /// Transforms the left value.
    ///
    /// ```rust
    /// use stackless::control::Either;
    ///
    /// let state: Either<i32, String> = Either::Left(20);
    /// assert_eq!(state.map_left(|n| n + 1), Either::Left(21));
    /// ```
    #[inline]
    pub fn map_left<T, F>(self, function: F) -> Either<T, R>
    where
        F: FnOnce(L) -> T,
    {
        match self {
            Self::Left(value) => Either::Left(function(value)),
            Self::Right(value) => Either::Right(value),
        }
    }

    /// Transforms the right value.
    #[inline]
    pub fn map_right<T, F>(self, function: F) -> Either<L, T>
    where
        F: FnOnce(R) -> T,
    {
        match self {
            Self::Left(value) => Either::Left(value),
            Self::Right(value) => Either::Right(function(value)),
        }
    }

    /// Collapses both sides into one value.
    #[inline]
    pub fn fold<T, F, G>(self, left_function: F, right_function: G) -> T
    where
        F: FnOnce(L) -> T,
        G: FnOnce(R) -> T,
    {
        match self {
            Self::Left(value) => left_function(value),
            Self::Right(value) => right_function(value),
        }
    }
}

impl<L: fmt::Debug, R: fmt::Debug> fmt::Debug for Either<L, R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left(value) => formatter.debug_tuple("Left").field(value).finish(),
            Self::Right(value) => formatter.debug_tuple("Right").field(value).finish(),
        }
    }
}

impl<L, R> From<Result<R, L>> for Either<L, R> {
    fn from(result: Result<R, L>) -> Self {
        match result {
            Ok(value) => Self::Right(value),
            Err(error) => Self::Left(error),
        }
    }
}

impl<L, R> From<Either<L, R>> for Result<R, L> {
    fn from(either: Either<L, R>) -> Self {
        match either {
            Either::Left(error) => Err(error),
            Either::Right(value) => Ok(value),
        }
    }
}
