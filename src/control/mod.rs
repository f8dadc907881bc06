//! Stack-safe control structures.
//!
//! - [`FunctionChain`]: function composition with O(1) append and
//!   constant-stack invocation; also the continuation store of everything
//!   below
//! - [`Eval`]: lazy values forced by an explicit trampoline
//! - [`Program`]: free programs over an [`Instruction`] set, interpreted
//!   directly or into any [`MonadRec`](crate::typeclass::MonadRec) target
//! - [`Either`]: the continue/done step of tail-recursive loops
//! - [`Payload`]: the bound every value flowing through the engine meets
//!
//! # Examples
//!
//! ## Stack-Safe Recursion
//!
//! ```rust
//! use stackless::control::Eval;
//!
//! fn is_even(n: u64) -> Eval<bool> {
//!     if n == 0 {
//!         Eval::now(true)
//!     } else {
//!         Eval::defer(move || is_odd(n - 1))
//!     }
//! }
//!
//! fn is_odd(n: u64) -> Eval<bool> {
//!     if n == 0 {
//!         Eval::now(false)
//!     } else {
//!         Eval::defer(move || is_even(n - 1))
//!     }
//! }
//!
//! assert!(is_even(1_000_000).value());
//! ```
//!
//! ## Long Compositions
//!
//! ```rust
//! use stackless::control::FunctionChain;
//!
//! let chain = (0..10_000).fold(FunctionChain::<u64, u64>::identity(), |chain, _| {
//!     chain.map(|n| n + 2)
//! });
//! assert_eq!(chain.invoke(0), Ok(20_000));
//! ```

pub(crate) mod and_then;
mod either;
pub(crate) mod erased;
mod eval;
mod free;
pub(crate) mod release;

pub use and_then::FunctionChain;
pub use either::Either;
pub use erased::Payload;
pub use eval::Eval;
pub use free::{Continuation, Instruction, Program, Resume};
