use crate::NamedMutex;
use tracing::warn;

/// Holds a [`NamedMutex`] locked until dropped.
#[derive(Debug)]
pub struct NamedMutexGuard<'a> {
    mutex: &'a mut NamedMutex,
}

impl<'a> NamedMutexGuard<'a> {
    pub(crate) fn new(mutex: &'a mut NamedMutex) -> Self {
        Self { mutex }
    }

    pub fn name(&self) -> &str {
        self.mutex.name()
    }
}

impl Drop for NamedMutexGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.mutex.unlock() {
            warn!(name = %self.mutex.name(), error = %err, "unlock on guard drop failed");
        }
    }
}
