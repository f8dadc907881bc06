//! One-shot completion callbacks for asynchronous effects.
//!
//! An asynchronous [`IO`](super::IO) hands its registration function a
//! [`Callback`]. However many clones of it exist and however many threads
//! race to complete it, exactly one outcome is delivered to the waiting
//! continuation; later attempts are rejected with
//! [`EffectError::CallbackAlreadyInvoked`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::EffectError;
use crate::control::Payload;
use crate::control::erased::{Shared, share};

/// Erased success or failure delivered by a callback.
pub(crate) type Outcome = Result<Shared, Shared>;

/// Consumer of an [`Outcome`]; runs at most once.
pub(crate) type Completion = Box<dyn FnOnce(Outcome) + Send>;

/// One-shot slot guarding a [`Completion`].
pub(crate) struct Latch {
    slot: Mutex<Option<Completion>>,
}

impl Latch {
    pub(crate) fn new(completion: Completion) -> Self {
        Self {
            slot: Mutex::new(Some(completion)),
        }
    }

    /// Delivers `outcome` if nothing was delivered yet.
    ///
    /// Returns `false` when the latch had already fired. The completion
    /// runs after the lock is released.
    pub(crate) fn fire(&self, outcome: Outcome) -> bool {
        let completion = self.slot.lock().take();
        completion.is_some_and(|completion| {
            completion(outcome);
            true
        })
    }

    fn has_fired(&self) -> bool {
        self.slot.lock().is_none()
    }
}

impl Drop for Latch {
    fn drop(&mut self) {
        if self.slot.get_mut().is_some() {
            tracing::debug!("asynchronous callback dropped without being invoked");
        }
    }
}

/// Completes an asynchronous effect with `Ok(A)` or `Err(E)`, exactly once.
///
/// Callbacks are cheap to clone and may be moved to other threads; all
/// clones share the same one-shot latch.
///
/// # Examples
///
/// ```rust
/// use stackless::effect::{EffectError, IO};
///
/// let io: IO<String, i32> = IO::asynchronous(|callback| {
///     assert_eq!(callback.succeed(42), Ok(()));
///     assert_eq!(callback.succeed(7), Err(EffectError::CallbackAlreadyInvoked));
/// });
/// assert_eq!(io.run(), Ok(42));
/// ```
pub struct Callback<E, A> {
    latch: Arc<Latch>,
    _outcome: PhantomData<fn(Result<A, E>)>,
}

impl<E, A> Callback<E, A> {
    pub(crate) const fn new(latch: Arc<Latch>) -> Self {
        Self {
            latch,
            _outcome: PhantomData,
        }
    }

    /// Returns `true` once any clone of this callback has completed.
    pub fn is_completed(&self) -> bool {
        self.latch.has_fired()
    }
}

impl<E: Payload, A: Payload> Callback<E, A> {
    /// Delivers the outcome of the asynchronous effect.
    ///
    /// The waiting continuation runs on the calling thread before this
    /// method returns, unless the effect is still inside its registration
    /// function, in which case the driver picks the outcome up when
    /// registration returns.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::CallbackAlreadyInvoked`] if this callback or
    /// one of its clones already completed; `outcome` is discarded.
    pub fn complete(&self, outcome: Result<A, E>) -> Result<(), EffectError> {
        if self.latch.fire(outcome.map(share).map_err(share)) {
            Ok(())
        } else {
            tracing::warn!("asynchronous callback invoked more than once; outcome discarded");
            Err(EffectError::CallbackAlreadyInvoked)
        }
    }

    /// Completes with a success.
    ///
    /// # Errors
    ///
    /// See [`Callback::complete`].
    pub fn succeed(&self, value: A) -> Result<(), EffectError> {
        self.complete(Ok(value))
    }

    /// Completes with a failure.
    ///
    /// # Errors
    ///
    /// See [`Callback::complete`].
    pub fn fail(&self, error: E) -> Result<(), EffectError> {
        self.complete(Err(error))
    }
}

impl<E, A> Clone for Callback<E, A> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.latch))
    }
}

impl<E, A> fmt::Debug for Callback<E, A> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Callback")
            .field("completed", &self.is_completed())
            .finish()
    }
}

static_assertions::assert_impl_all!(Callback<String, i32>: Send, Sync, Clone);
