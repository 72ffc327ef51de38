use shmlock_region::remove;

/// Region name unique to this bench process.
pub fn temp_lock_name(label: &str) -> String {
    let pid = std::process::id();
    format!("shmlock_bench_{label}_{pid}")
}

/// Unlinks the named region when dropped, so an aborted bench leaves nothing
/// behind in the shm namespace.
pub struct RegionCleanup(pub String);

impl Drop for RegionCleanup {
    fn drop(&mut self) {
        let _ = remove(&self.0);
    }
}
