//! Tokio runtime used by the asynchronous effect constructors.
//!
//! [`IO::from_future`](super::IO::from_future) spawns its future onto the
//! runtime the caller is already inside of. When there is none (for
//! example `IO::run` called from `main`), it falls back to a global
//! multi-thread runtime created on first use.

use std::sync::LazyLock;

use tokio::runtime::{Builder, Handle, Runtime};

// =============================================================================
// Global Runtime
// =============================================================================

/// Global tokio runtime initialized lazily on first access.
///
/// Multi-thread scheduler with one worker per CPU and every driver enabled.
/// The runtime has static lifetime and is never dropped.
static GLOBAL_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("stackless-worker")
        .enable_all()
        .build()
        .expect("Failed to create global tokio runtime")
});

/// Returns the global runtime, creating it on first call.
#[inline]
#[must_use]
pub fn global() -> &'static Runtime {
    &GLOBAL_RUNTIME
}

/// Returns a handle to the current runtime, or to the global one when the
/// caller is outside of any runtime.
#[inline]
#[must_use]
pub fn handle() -> Handle {
    Handle::try_current().unwrap_or_else(|_| global().handle().clone())
}
