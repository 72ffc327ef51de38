//! Named mutex shared between independent processes.
//!
//! The lock lives in a small POSIX shared-memory object (see
//! `shmlock_region`). Instances attached to the same name, in any process,
//! exclude each other; the last instance to [`release`](NamedMutex::release)
//! removes the backing object.
//!
//! # Crash recovery
//!
//! A process that dies while attached leaves its reference and possibly the
//! lock behind. Each region records when it was initialized; an attacher that
//! finds the region older than the configured staleness threshold treats it
//! as abandoned and starts over with a free lock and a count of one.
//!
//! ```no_run
//! use shmlock_mutex::NamedMutex;
//! use std::time::Duration;
//!
//! let mut mutex = NamedMutex::new("my-app-lock")?;
//! if mutex.try_lock(Duration::from_millis(250))? {
//!     // ... exclusive section ...
//!     mutex.unlock()?;
//! }
//! mutex.release()?;
//! # Ok::<(), shmlock_mutex::MutexError>(())
//! ```

mod error;
mod guard;
mod lease;
mod named_mutex;
mod staleness;

pub use error::MutexError;
pub use guard::NamedMutexGuard;
pub use named_mutex::NamedMutex;
pub use shmlock_config::LockConfig;

use std::time::Duration;

/// Capability set of a cross-process lock.
pub trait CrossProcessLock {
    fn name(&self) -> &str;

    /// `Duration::ZERO` makes a single attempt. Running out of time is
    /// `Ok(false)`, not an error.
    fn try_lock(&mut self, timeout: Duration) -> Result<bool, MutexError>;

    fn unlock(&mut self) -> Result<(), MutexError>;

    /// Whether this instance holds the lock, as last observed locally.
    fn is_locked(&self) -> bool;

    /// Detaches from the shared state. Terminal.
    fn release(&mut self) -> Result<(), MutexError>;
}
