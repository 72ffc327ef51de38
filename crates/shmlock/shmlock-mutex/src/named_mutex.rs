use crate::lease::GuardLease;
use crate::staleness::{is_fresh, now_ms};
use crate::{CrossProcessLock, LockConfig, MutexError, NamedMutexGuard};
use shmlock_region::{SharedLayout, SharedLock, SharedRegion};
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static NEXT_SERIAL: AtomicU32 = AtomicU32::new(1);

/// Owner tag written into the shared lock words: pid in the high half, a
/// per-instance serial in the low half. Never 0.
fn owner_tag() -> u64 {
    let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
    (u64::from(std::process::id()) << 32) | u64::from(serial)
}

/// A mutex identified by name, shared by every process that attaches to it.
///
/// Construction attaches to the backing region (creating or recycling it as
/// needed) and counts this instance as a holder of the region. Locking is not
/// reentrant. [`NamedMutex::release`] detaches; it also runs on drop.
#[derive(Debug)]
pub struct NamedMutex {
    name: String,
    /// `None` once released.
    region: Option<SharedRegion>,
    config: LockConfig,
    tag: u64,
    locked: bool,
}

impl NamedMutex {
    /// Attaches with the default [`LockConfig`].
    pub fn new(name: &str) -> Result<Self, MutexError> {
        Self::with_config(name, LockConfig::default())
    }

    pub fn with_config(name: &str, config: LockConfig) -> Result<Self, MutexError> {
        config.validate()?;
        let tag = owner_tag();
        let region = attach(name, &config, tag)?;
        Ok(Self {
            name: name.to_string(),
            region: Some(region),
            config,
            tag,
            locked: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_released(&self) -> bool {
        self.region.is_none()
    }

    /// Instances attached across all processes, `None` after release.
    pub fn reference_count(&self) -> Option<u32> {
        self.layout().ok().map(SharedLayout::reference_count)
    }

    /// When the region was last (re)initialized, in epoch milliseconds.
    pub fn created_at_ms(&self) -> Option<i64> {
        self.layout().ok().map(SharedLayout::created_at)
    }

    /// Tries to take the lock, polling until `timeout` has elapsed.
    ///
    /// The deadline is fixed on entry. A zero timeout makes exactly one
    /// attempt and never sleeps; a timeout too large to represent as an
    /// `Instant` (such as `Duration::MAX`) waits until the lock is taken.
    pub fn try_lock(&mut self, timeout: Duration) -> Result<bool, MutexError> {
        let deadline = Instant::now().checked_add(timeout);

        if self.locked {
            self.layout()?;
            warn!(name = %self.name, "try_lock on an instance that already holds the lock");
            return Ok(false);
        }

        let acquired = {
            let lock = self.layout()?.lock();
            acquire_until(lock, self.tag, deadline, self.config.poll_interval())
        };

        if acquired {
            self.locked = true;
            debug!(name = %self.name, "locked");
        }
        Ok(acquired)
    }

    /// Releases the lock if this instance holds it; otherwise does nothing.
    pub fn unlock(&mut self) -> Result<(), MutexError> {
        let layout = self.layout()?;
        if !self.locked {
            debug!(name = %self.name, "unlock without holding the lock ignored");
            return Ok(());
        }

        release_lock_word(layout, self.tag, &self.name);
        self.locked = false;
        debug!(name = %self.name, "unlocked");
        Ok(())
    }

    /// Like [`NamedMutex::try_lock`], returning a guard that unlocks on drop.
    pub fn lock_guard(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<NamedMutexGuard<'_>>, MutexError> {
        if self.try_lock(timeout)? {
            Ok(Some(NamedMutexGuard::new(self)))
        } else {
            Ok(None)
        }
    }

    /// Unlocks if held, drops this instance's reference and, if it was the
    /// last one, removes the backing object. Calling it again is a no-op.
    pub fn release(&mut self) -> Result<(), MutexError> {
        let Some(region) = self.region.take() else {
            return Ok(());
        };
        let layout = region.get().ok_or_else(|| MutexError::NotMapped {
            name: self.name.clone(),
        })?;

        if self.locked {
            release_lock_word(layout, self.tag, &self.name);
            self.locked = false;
        }

        let remaining = {
            let _lease = GuardLease::acquire(
                layout,
                self.tag,
                self.config.guard_timeout(),
                &self.name,
            );
            let remaining = layout.reference_count().saturating_sub(1);
            layout.set_reference_count(remaining);

            // Unlinked under the guard so a concurrent attacher either sees
            // the retired flag or finds the name gone. If unlinking fails the
            // object stays linked with a zero count and no retired flag, and
            // the next attacher reuses or recycles it.
            if remaining == 0 {
                if let Err(err) = region.unlink() {
                    warn!(
                        name = %self.name,
                        error = %err,
                        "last holder could not remove backing object"
                    );
                    return Err(err.into());
                }
                layout.mark_retired();
            }
            remaining
        };

        if remaining == 0 {
            debug!(name = %self.name, "last holder released, backing object removed");
        } else {
            debug!(name = %self.name, remaining, "released");
        }
        drop(region);
        Ok(())
    }

    fn layout(&self) -> Result<&SharedLayout, MutexError> {
        let region = self.region.as_ref().ok_or_else(|| MutexError::Released {
            name: self.name.clone(),
        })?;
        region.get().ok_or_else(|| MutexError::NotMapped {
            name: self.name.clone(),
        })
    }
}

impl CrossProcessLock for NamedMutex {
    fn name(&self) -> &str {
        NamedMutex::name(self)
    }

    fn try_lock(&mut self, timeout: Duration) -> Result<bool, MutexError> {
        NamedMutex::try_lock(self, timeout)
    }

    fn unlock(&mut self) -> Result<(), MutexError> {
        NamedMutex::unlock(self)
    }

    fn is_locked(&self) -> bool {
        NamedMutex::is_locked(self)
    }

    fn release(&mut self) -> Result<(), MutexError> {
        NamedMutex::release(self)
    }
}

impl Drop for NamedMutex {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(name = %self.name, error = %err, "release on drop failed");
        }
    }
}

/// Opens the region and registers one more holder, recycling it if stale.
fn attach(name: &str, config: &LockConfig, tag: u64) -> Result<SharedRegion, MutexError> {
    for attempt in 1..=config.attach_retries {
        let mut region = SharedRegion::new(name)?;
        region.create()?;
        let layout = region.get().ok_or_else(|| MutexError::NotMapped {
            name: name.to_string(),
        })?;

        let lease = GuardLease::acquire(layout, tag, config.guard_timeout(), name);

        // Opened just before the last holder unlinked it; the name now
        // resolves to a new object (or soon will).
        if layout.is_retired() {
            drop(lease);
            debug!(name, attempt, "region retired during attach, reopening");
            thread::yield_now();
            continue;
        }

        let now = now_ms();
        let created_at = layout.created_at();
        if is_fresh(created_at, now, config.staleness_threshold()) {
            let count = layout.reference_count().saturating_add(1);
            layout.set_reference_count(count);
            debug!(name, count, "attached to live region");
        } else {
            if created_at == 0 {
                debug!(name, "initialized new region");
            } else {
                warn!(
                    name,
                    age_ms = now.saturating_sub(created_at),
                    previous_count = layout.reference_count(),
                    lock_held = layout.lock().is_held(),
                    "recycling stale region"
                );
            }
            layout.lock().reset();
            layout.set_reference_count(1);
            layout.set_created_at(now);
        }

        drop(lease);
        return Ok(region);
    }

    Err(MutexError::Retired {
        name: name.to_string(),
        attempts: config.attach_retries,
    })
}

/// Clears the lock word if it still carries `tag`.
fn release_lock_word(layout: &SharedLayout, tag: u64, name: &str) {
    if !layout.lock().release(tag) {
        // The region was recycled as stale while we held the lock.
        warn!(name, "lock was no longer ours at unlock");
    }
}

/// Polls until the lock is taken or `deadline` passes. `None` never expires.
fn acquire_until(
    lock: &SharedLock,
    tag: u64,
    deadline: Option<Instant>,
    poll: Duration,
) -> bool {
    loop {
        if lock.try_acquire(tag) {
            return true;
        }
        let nap = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                poll.min(deadline - now)
            }
            None => poll,
        };
        thread::sleep(nap);
    }
}
