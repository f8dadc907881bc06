//! Non-recursive destruction of nested descriptions.
//!
//! A description can own another one through a captured closure:
//! `flat_map(move |_| previous.clone())` stores `previous` inside a step of
//! the new chain, and `Eval::defer(move || previous.clone())` stores it in a
//! thunk. Dropping such a value naively recurses once per level.
//!
//! Every owning edge through which that nesting can happen goes through
//! [`release`]: chain steps directly, node children through [`Released`].
//! The outermost release on a thread drops its value in place; any release
//! triggered while it runs is parked in a per-thread queue and drained by
//! the same loop, so the host stack never grows with the nesting depth.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

thread_local! {
    static DRAINING: Cell<bool> = const { Cell::new(false) };
    static ORPHANS: RefCell<Vec<Box<dyn Any>>> = const { RefCell::new(Vec::new()) };
}

/// Clears the draining flag even if a destructor panics.
struct Draining;

impl Drop for Draining {
    fn drop(&mut self) {
        let _ = DRAINING.try_with(|draining| draining.set(false));
    }
}

/// Drops `value` without letting the destructors it triggers recurse.
///
/// Falls back to an ordinary drop while the thread's locals are being torn
/// down.
pub(crate) fn release<T: 'static>(value: T) {
    match DRAINING.try_with(|draining| draining.replace(true)) {
        Ok(true) => {
            let _ = ORPHANS.try_with(move |orphans| orphans.borrow_mut().push(Box::new(value)));
        }
        Ok(false) => {
            let _draining = Draining;
            drop(value);
            while let Some(orphan) = ORPHANS
                .try_with(|orphans| orphans.borrow_mut().pop())
                .ok()
                .flatten()
            {
                drop(orphan);
            }
        }
        Err(_) => drop(value),
    }
}

/// Shared ownership whose last owner drops the pointee through [`release`].
pub(crate) struct Released<T: ?Sized + 'static>(Option<Arc<T>>);

impl<T: 'static> Released<T> {
    #[inline]
    pub(crate) fn of(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }
}

impl<T: ?Sized + 'static> Released<T> {
    #[inline]
    pub(crate) const fn new(inner: Arc<T>) -> Self {
        Self(Some(inner))
    }
}

impl<T: ?Sized + 'static> Deref for Released<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        match &self.0 {
            Some(inner) => inner,
            None => unreachable!("the pointer is only taken while dropping"),
        }
    }
}

impl<T: ?Sized + 'static> Clone for Released<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized + 'static> Drop for Released<T> {
    fn drop(&mut self) {
        if let Some(mut inner) = self.0.take()
            && Arc::get_mut(&mut inner).is_some()
        {
            release(inner);
        }
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Released<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("Released(..)")
    }
}
