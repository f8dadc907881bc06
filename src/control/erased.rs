//! Erased value slots shared by every interpreter in the crate.
//!
//! Composition hides intermediate types: the `X` in
//! `FlatMapped(Eval<X>, X -> Eval<A>)` is fixed when the node is built but
//! never named again. Such values travel through the engine as [`Shared`]
//! slots, and the typed wrappers ([`Eval`](super::Eval),
//! [`FunctionChain`](super::FunctionChain), [`Program`](super::Program),
//! `IO`) recover the concrete type at the edge they created.
//!
//! Node kinds are never discovered by inspecting types; every node is an
//! enum variant. Only payloads are erased.

use std::any::Any;
use std::sync::Arc;

/// Bound satisfied by every value that flows through the engine.
///
/// Values are shared between the immutable descriptions (which can be run
/// many times) and whichever thread resumes an asynchronous boundary, so
/// they must be cheap to duplicate and safe to send.
///
/// Implemented automatically for every `Clone + Send + Sync + 'static` type.
///
/// # Examples
///
/// ```rust
/// use stackless::control::Payload;
///
/// fn assert_payload<T: Payload>() {}
///
/// assert_payload::<i32>();
/// assert_payload::<String>();
/// assert_payload::<Result<Vec<u8>, String>>();
/// ```
pub trait Payload: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Payload for T {}

/// A type-erased value whose concrete type is known to whoever built the
/// node holding it.
pub(crate) type Shared = Arc<dyn Any + Send + Sync>;

/// Erases a value into a [`Shared`] slot.
#[inline]
pub(crate) fn share<T: Payload>(value: T) -> Shared {
    Arc::new(value)
}

/// Recovers the value stored by [`share`].
///
/// The slot is unwrapped in place when it is uniquely owned and cloned
/// otherwise, so re-running a description never disturbs the original.
#[inline]
pub(crate) fn take<T: Payload>(value: Shared) -> T {
    match value.downcast::<T>() {
        Ok(typed) => Arc::unwrap_or_clone(typed),
        Err(_) => unreachable!(
            "erased slot holds a different type than the node that created it: expected {}",
            std::any::type_name::<T>()
        ),
    }
}
