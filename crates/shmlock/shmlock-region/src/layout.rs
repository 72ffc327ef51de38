//! Binary layout of a named mutex region.
//!
//! The layout is mapped at offset 0 of the backing object and read
//! independently by every attached process, so it holds only fixed-size
//! atomics: no pointers, no heap data. A freshly created object is all zero,
//! which reads as "never initialized" (lock free, count 0, timestamp 0).
//!
//! # Memory Layout
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬─────────────────┬──────────────────┐
//! │   lock   │  guard   │ retired  │ reference_count │    created_at    │
//! │  (8B)    │  (8B)    │  (4B)    │      (4B)       │  (8B, ms epoch)  │
//! └──────────┴──────────┴──────────┴─────────────────┴──────────────────┘
//! ```

use crate::SharedLock;
use std::mem::{align_of, size_of};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

#[repr(C)]
#[derive(Debug, Default)]
pub struct SharedLayout {
    /// The mutex itself.
    lock: SharedLock,

    /// Serializes updates of `retired`, `reference_count` and `created_at`.
    guard: SharedLock,

    /// Non-zero once the last holder has unlinked the backing object.
    retired: AtomicU32,

    /// Named mutex instances attached across all processes.
    reference_count: AtomicU32,

    /// Milliseconds since the UNIX epoch at last (re)initialization; 0 = never.
    created_at: AtomicI64,
}

/// Exact size every process maps.
pub const REGION_BYTES: usize = size_of::<SharedLayout>();

const _: () = assert!(REGION_BYTES == 32);
const _: () = assert!(align_of::<SharedLayout>() == 8);

impl SharedLayout {
    #[inline]
    pub fn lock(&self) -> &SharedLock {
        &self.lock
    }

    #[inline]
    pub fn guard(&self) -> &SharedLock {
        &self.guard
    }

    pub fn reference_count(&self) -> u32 {
        self.reference_count.load(Ordering::Acquire)
    }

    pub fn set_reference_count(&self, count: u32) {
        self.reference_count.store(count, Ordering::Release);
    }

    pub fn created_at(&self) -> i64 {
        self.created_at.load(Ordering::Acquire)
    }

    pub fn set_created_at(&self, millis: i64) {
        self.created_at.store(millis, Ordering::Release);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire) != 0
    }

    pub fn mark_retired(&self) {
        self.retired.store(1, Ordering::Release);
    }
}
