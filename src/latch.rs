//! Reader/writer latch used per node and at the tree level.
//!
//! A thin wrapper over `parking_lot::RawRwLock`. Latch crabbing needs split
//! acquire/release: a latch acquired during descent is released in a
//! different scope, sometimes by a different function, after the next latch
//! in the chain has been taken. Guard types cannot express that handoff, so
//! the latch exposes the raw operations directly.
//!
//! Writers are mutually exclusive with readers and with each other; readers
//! may be concurrent. No fairness is guaranteed.

use parking_lot::RawRwLock;
use parking_lot::lock_api::RawRwLock as _;

pub struct SharedLatch {
    raw: RawRwLock,
}

impl SharedLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            raw: RawRwLock::INIT,
        }
    }

    /// Block until a shared latch is held.
    #[inline]
    pub fn lock_shared(&self) {
        self.raw.lock_shared();
    }

    /// Attempt to take a shared latch without blocking.
    #[inline]
    pub fn try_lock_shared(&self) -> bool {
        self.raw.try_lock_shared()
    }

    /// Release a shared latch previously acquired by this thread.
    #[inline]
    pub fn unlock_shared(&self) {
        // SAFETY: callers pair every unlock with a prior successful
        // lock_shared/try_lock_shared; the crabbing protocol releases each
        // latch exactly once (a release-discipline bug is a programming
        // error, not a recoverable condition).
        unsafe { self.raw.unlock_shared() }
    }

    /// Block until the exclusive latch is held.
    #[inline]
    pub fn lock_exclusive(&self) {
        self.raw.lock_exclusive();
    }

    /// Release the exclusive latch previously acquired by this thread.
    #[inline]
    pub fn unlock_exclusive(&self) {
        // SAFETY: see unlock_shared.
        unsafe { self.raw.unlock_exclusive() }
    }
}

impl Default for SharedLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SharedLatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedLatch").finish_non_exhaustive()
    }
}
