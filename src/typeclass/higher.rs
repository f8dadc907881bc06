//! Higher-kinded type emulation through generic associated types.
//!
//! Interpreting a [`Program`](crate::control::Program) into a target monad
//! `M` needs to talk about `M` applied to several different types: the
//! response of each instruction, the loop state, and the final result.
//! Rust has no higher-kinded types, so [`TypeConstructor`] exposes the
//! "same constructor, different argument" relation as a GAT.
//!
//! # Example
//!
//! ```rust
//! use stackless::typeclass::TypeConstructor;
//!
//! fn retarget<T: TypeConstructor>(_: T) -> T::WithType<&'static str>
//! where
//!     T::WithType<&'static str>: Default,
//! {
//!     Default::default()
//! }
//!
//! let retargeted: Option<&'static str> = retarget(Some(1_u8));
//! assert_eq!(retargeted, None);
//! ```

/// A type constructor applied to some argument.
///
/// `Option<i32>` is `Option<_>` applied to `i32`; its `WithType<String>` is
/// `Option<String>`.
///
/// # Laws
///
/// `<F as TypeConstructor>::WithType<F::Inner>` is `F` itself.
///
/// # Example
///
/// ```rust
/// use stackless::typeclass::TypeConstructor;
///
/// fn expects_counts<T: TypeConstructor<Inner = usize>>() {}
///
/// expects_counts::<Result<usize, String>>();
/// ```
pub trait TypeConstructor {
    /// The argument the constructor is currently applied to.
    type Inner;

    /// The same constructor applied to `B`.
    type WithType<B>: TypeConstructor<Inner = B>;
}

// =============================================================================
// Standard Library Type Implementations
// =============================================================================

impl<A> TypeConstructor for Option<A> {
    type Inner = A;
    type WithType<B> = Option<B>;
}

impl<T, E> TypeConstructor for Result<T, E> {
    type Inner = T;
    type WithType<B> = Result<B, E>;
}
