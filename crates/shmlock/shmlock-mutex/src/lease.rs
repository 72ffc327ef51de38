//! Short exclusive hold on a region's counter guard.
//!
//! Everything done under the guard is a few atomic stores, so waiters spin
//! (then yield) instead of sleeping. A guard that stays with the same holder
//! past the timeout belonged to a process that died mid-update; it is taken
//! over rather than waited on forever.
//!
//! The takeover cannot tell a dead holder from a live one that was
//! descheduled for longer than the timeout. In that case both processes run
//! their update at once and the counter can drift; keep `guard_timeout` well
//! above the longest expected scheduling stall.

use shmlock_region::{SharedLayout, SharedLock};
use std::time::{Duration, Instant};
use tracing::warn;

const SPINS_BEFORE_YIELD: u32 = 64;

pub(crate) struct GuardLease<'a> {
    guard: &'a SharedLock,
    tag: u64,
}

impl<'a> GuardLease<'a> {
    pub(crate) fn acquire(
        layout: &'a SharedLayout,
        tag: u64,
        timeout: Duration,
        name: &str,
    ) -> Self {
        let guard = layout.guard();
        let mut observed: Option<(u64, Instant)> = None;
        let mut spins = 0u32;

        loop {
            if guard.try_acquire(tag) {
                return Self { guard, tag };
            }

            if let Some(holder) = guard.holder() {
                match observed {
                    Some((prev, since)) if prev == holder => {
                        if since.elapsed() >= timeout && guard.steal(holder, tag) {
                            warn!(name, holder, "counter guard held past timeout, taking it over");
                            return Self { guard, tag };
                        }
                    }
                    _ => observed = Some((holder, Instant::now())),
                }
            }

            if spins < SPINS_BEFORE_YIELD {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }
}

impl Drop for GuardLease<'_> {
    fn drop(&mut self) {
        // Refused only if the guard was stolen from us.
        if !self.guard.release(self.tag) {
            warn!(tag = self.tag, "counter guard was taken over before release");
        }
    }
}
