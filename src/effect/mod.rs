//! Effect system: descriptions of side effects and their interpreter.
//!
//! - [`IO`]: a description of a computation that produces an `A` or fails
//!   with an `E`, covering pure values, failures, deferred synchronous work
//!   and callback-based asynchronous work
//! - [`Callback`]: the one-shot completion handle given to asynchronous
//!   registrations
//! - [`EffectError`]: violations of the callback protocol
//!
//! With the `async` feature, [`IO::from_future`] and [`IO::sleep`] bridge
//! to tokio, and [`runtime`] exposes the runtime they spawn onto.
//!
//! # Examples
//!
//! ```rust
//! use stackless::effect::IO;
//!
//! fn countdown(n: u64) -> IO<String, u64> {
//!     if n == 0 {
//!         IO::pure(0)
//!     } else {
//!         IO::suspend(move || countdown(n - 1)).map(|steps| steps + 1)
//!     }
//! }
//!
//! assert_eq!(countdown(100_000).run(), Ok(100_000));
//! ```

mod callback;
mod error;
mod io;
#[cfg(feature = "async")]
pub mod runtime;

pub use callback::Callback;
pub use error::EffectError;
pub use io::IO;
