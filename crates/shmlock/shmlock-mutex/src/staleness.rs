use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds since the UNIX epoch; 0 if the clock is before it.
///
/// Wall clock rather than `Instant` because the value is compared across
/// processes.
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|t| t.as_millis() as i64)
        .unwrap_or(0)
}

/// Whether a region initialized at `created_at` still counts as live.
///
/// `0` is the never-initialized sentinel. Timestamps further in the future
/// than the threshold are as untrustworthy as old ones.
pub(crate) fn is_fresh(created_at: i64, now: i64, threshold: Duration) -> bool {
    if created_at == 0 {
        return false;
    }
    let age = now.saturating_sub(created_at).unsigned_abs();
    u128::from(age) <= threshold.as_millis()
}
