//! A lock word that works across every process mapping the same memory.
//!
//! The word holds `0` when free and the holder's owner tag while held. Tags
//! are chosen by the caller; the mutex layer packs the process id into the
//! high half and a per-instance serial into the low half. All transitions
//! are compare-and-swap on a plain `AtomicU64`, so the lock carries no
//! process-local state and an all-zero mapping is a free lock.

use std::sync::atomic::{AtomicU64, Ordering};

const FREE: u64 = 0;

#[repr(C)]
#[derive(Debug, Default)]
pub struct SharedLock {
    owner: AtomicU64,
}

impl SharedLock {
    pub const fn new() -> Self {
        Self {
            owner: AtomicU64::new(FREE),
        }
    }

    /// Single attempt to take the lock for `owner`. `owner` must be non-zero.
    #[inline]
    pub fn try_acquire(&self, owner: u64) -> bool {
        debug_assert_ne!(owner, FREE, "owner tag 0 is reserved for 'free'");
        self.owner
            .compare_exchange(FREE, owner, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Frees the lock if it is currently held by `owner`.
    ///
    /// Returns `false` when someone else holds it (or nobody does), in which
    /// case the word is left untouched.
    #[inline]
    pub fn release(&self, owner: u64) -> bool {
        self.owner
            .compare_exchange(owner, FREE, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }

    /// Hands the lock from `expected` to `owner` if `expected` still holds it.
    ///
    /// Used to take over a lock whose holder is presumed dead.
    pub fn steal(&self, expected: u64, owner: u64) -> bool {
        debug_assert_ne!(owner, FREE, "owner tag 0 is reserved for 'free'");
        self.owner
            .compare_exchange(expected, owner, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Clears the word regardless of who holds it.
    pub fn reset(&self) {
        self.owner.store(FREE, Ordering::Release);
    }

    #[inline]
    pub fn is_held(&self) -> bool {
        self.owner.load(Ordering::Acquire) != FREE
    }

    pub fn holder(&self) -> Option<u64> {
        match self.owner.load(Ordering::Acquire) {
            FREE => None,
            owner => Some(owner),
        }
    }
}
