//! Type class boundary of the evaluation engine.
//!
//! The engine needs exactly one protocol from the outside world: a target
//! monad that [`Program::fold_map`](crate::control::Program::fold_map) can
//! interpret into. This module provides it:
//!
//! - [`TypeConstructor`]: higher-kinded type emulation through GATs
//! - [`MonadRec`]: `lift_pure`, `fmap_with` and stack-safe `tail_rec_m`
//!
//! `MonadRec` is implemented here for `Option` and `Result`, and next to
//! their definitions for [`Eval`](crate::control::Eval) and
//! `IO` (`effect` feature).
//!
//! # Examples
//!
//! ```rust
//! use stackless::control::Either;
//! use stackless::typeclass::MonadRec;
//!
//! let found = <Option<usize> as MonadRec>::tail_rec_m(0_usize, |index| {
//!     let haystack = [3, 1, 4, 1, 5, 9, 2, 6];
//!     match haystack.get(index) {
//!         Some(9) => Some(Either::Right(index)),
//!         Some(_) => Some(Either::Left(index + 1)),
//!         None => None,
//!     }
//! });
//! assert_eq!(found, Some(5));
//! ```

mod higher;
#[cfg(feature = "control")]
mod monad_rec;

pub use higher::TypeConstructor;
#[cfg(feature = "control")]
pub use monad_rec::MonadRec;
