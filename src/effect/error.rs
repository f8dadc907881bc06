//! Protocol errors of the effect runtime.
//!
//! Domain failures of an [`IO<E, A>`](super::IO) are the user's own `E` and
//! travel as data. [`EffectError`] covers the other kind: misuse of the
//! asynchronous callback protocol, which no `E` can describe.

use thiserror::Error;

/// Represents violations of the asynchronous callback protocol.
///
/// # Examples
///
/// ```rust
/// use stackless::effect::EffectError;
///
/// let error = EffectError::CallbackAlreadyInvoked;
/// assert_eq!(
///     error.to_string(),
///     "callback already invoked: an asynchronous effect completes exactly once"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum EffectError {
    /// A [`Callback`](super::Callback) was completed a second time. The
    /// outcome was discarded.
    #[error("callback already invoked: an asynchronous effect completes exactly once")]
    CallbackAlreadyInvoked,

    /// Every clone of a [`Callback`](super::Callback) was dropped before any
    /// of them completed, so the effect can never produce an outcome.
    #[error("callback dropped without being invoked: the asynchronous effect never completed")]
    CallbackDropped,
}
