//! # stackless
//!
//! A stack-safe evaluation engine for functional effects.
//!
//! ## Overview
//!
//! Programs built by chaining hundreds of thousands of `map`/`flat_map`
//! calls must not overflow the call stack, and asynchronous boundaries must
//! be interpreted without blocking a thread. This crate provides four
//! pieces that share that technique:
//!
//! - **`Eval`**: lazy values with an explicit trampoline
//! - **`FunctionChain`**: function composition that never deepens the stack
//! - **`IO`**: effect descriptions covering pure values, failures, deferred
//!   work and callback-based asynchronous work
//! - **`Program`**: free programs over any instruction set, interpreted
//!   directly or into any `MonadRec` target
//!
//! ## Feature Flags
//!
//! - `typeclass`: `TypeConstructor` and `MonadRec`
//! - `control`: `FunctionChain`, `Eval`, `Program`, `Either`
//! - `effect`: `IO`, `Callback`, `EffectError`
//! - `async`: tokio interop (`IO::from_future`, `IO::sleep`)
//! - `full`: Enable all features
//!
//! ## Example
//!
//! ```rust
//! use stackless::prelude::*;
//!
//! let io: IO<String, i32> = IO::pure(3)
//!     .map(|n| n + 1)
//!     .flat_map(|n| IO::pure(n * 2));
//! assert_eq!(io.run(), Ok(8));
//!
//! let eval = Eval::later(|| 6).map(|n| n * 7);
//! assert_eq!(eval.value(), 42);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use stackless::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "typeclass")]
    pub use crate::typeclass::*;

    #[cfg(feature = "control")]
    pub use crate::control::*;

    #[cfg(feature = "effect")]
    pub use crate::effect::*;
}

#[cfg(feature = "typeclass")]
pub mod typeclass;

#[cfg(feature = "control")]
pub mod control;

#[cfg(feature = "effect")]
pub mod effect;
