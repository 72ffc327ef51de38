use crate::RegionError;
use std::ffi::CString;

/// `NAME_MAX` on Linux and macOS; counts the leading '/'.
const POSIX_NAME_MAX: usize = 255;

/// Turns a user-facing region name into the identifier passed to `shm_open`.
///
/// A leading '/' is optional (`SHARE_1` and `/SHARE_1` name the same object);
/// any other '/' is rejected, as are empty names and NUL bytes.
pub(crate) fn to_os_name(name: &str) -> Result<CString, RegionError> {
    let invalid = |reason| RegionError::InvalidName {
        name: name.to_string(),
        reason,
    };

    let bare = name.strip_prefix('/').unwrap_or(name);
    if bare.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if bare.contains('/') {
        return Err(invalid("name must not contain '/' after the leading one"));
    }
    if bare.len() + 1 > POSIX_NAME_MAX {
        return Err(invalid("name must be at most 254 bytes"));
    }

    CString::new(format!("/{bare}")).map_err(|_| invalid("name must not contain NUL bytes"))
}
