use crate::name::to_os_name;
use crate::{REGION_BYTES, RegionError, SharedLayout};
use memmap2::MmapMut;
use std::ffi::{CStr, CString};
use std::fs::File;
use std::io;
use std::os::fd::{FromRawFd, OwnedFd};
use tracing::debug;

/// Process-local handle on a named shared-memory object.
///
/// - `create` opens the object (creating it zero-filled if absent) and maps it.
/// - `unmap` drops only this process's mapping.
/// - `destroy` unlinks the name and unmaps.
///
/// Dropping the handle unmaps but never unlinks. Unlinking while other
/// processes still have the object mapped leaves their mappings valid, but
/// any later `create` under the same name gets a brand new object, so the
/// sharing is broken for whoever is left.
#[derive(Debug)]
pub struct SharedRegion {
    name: String,
    os_name: CString,
    mmap: Option<MmapMut>,
    created: bool,
}

impl SharedRegion {
    /// Validates `name`; nothing is opened until [`SharedRegion::create`].
    pub fn new(name: &str) -> Result<Self, RegionError> {
        Ok(Self {
            name: name.to_string(),
            os_name: to_os_name(name)?,
            mmap: None,
            created: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier handed to `shm_open`, always with a leading '/'.
    pub fn os_name(&self) -> &CStr {
        &self.os_name
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Opens or creates the backing object and maps it.
    ///
    /// Calling this on an already created handle destroys the current object
    /// first. On error the handle is left not created.
    pub fn create(&mut self) -> Result<(), RegionError> {
        if self.created {
            self.destroy()?;
        }

        let file = self.open_object()?;
        let len = file
            .metadata()
            .map_err(|source| RegionError::Size {
                name: self.name.clone(),
                source,
            })?
            .len();

        // Concurrent creators may both see 0 here; both set the same length.
        if len == 0 {
            file.set_len(REGION_BYTES as u64)
                .map_err(|source| RegionError::Size {
                    name: self.name.clone(),
                    source,
                })?;
        } else if len != REGION_BYTES as u64 {
            return Err(RegionError::SizeMismatch {
                name: self.name.clone(),
                expected: REGION_BYTES as u64,
                actual: len,
            });
        }

        // SAFETY: the object is a shm object sized to REGION_BYTES. Other
        // processes may write to it concurrently, which is why the layout is
        // only ever accessed through atomics.
        let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(|source| RegionError::Map {
            name: self.name.clone(),
            source,
        })?;

        // The mapping outlives the descriptor.
        drop(file);

        self.mmap = Some(mmap);
        self.created = true;
        debug!(name = %self.name, bytes = REGION_BYTES, "mapped shared region");
        Ok(())
    }

    /// The mapped layout, or `None` when not created or already unmapped.
    pub fn get(&self) -> Option<&SharedLayout> {
        if !self.created {
            return None;
        }
        let mmap = self.mmap.as_ref()?;
        // SAFETY: the mapping is page aligned and REGION_BYTES long, and
        // every bit pattern is a valid SharedLayout (it is all atomics). The
        // reference borrows `self`, so it cannot outlive the mapping.
        Some(unsafe { &*(mmap.as_ptr() as *const SharedLayout) })
    }

    /// Drops the local mapping. Safe to call repeatedly or when never mapped.
    pub fn unmap(&mut self) {
        if self.mmap.take().is_some() {
            debug!(name = %self.name, "unmapped shared region");
        }
    }

    /// Removes the name from the shm namespace without touching the mapping.
    ///
    /// Returns `false` if the object was already gone.
    pub fn unlink(&self) -> Result<bool, RegionError> {
        unlink(&self.os_name).map_err(|source| RegionError::Unlink {
            name: self.name.clone(),
            source,
        })
    }

    /// Marks the handle not created, unlinks the backing object if this
    /// handle has it mapped, then unmaps.
    pub fn destroy(&mut self) -> Result<(), RegionError> {
        self.created = false;

        let unlinked = match self.mmap {
            Some(_) => self.unlink().map(|_| ()),
            None => Ok(()),
        };
        self.unmap();

        debug!(name = %self.name, "destroyed shared region");
        unlinked
    }

    fn open_object(&self) -> Result<File, RegionError> {
        // SAFETY: os_name is a valid NUL-terminated string.
        let fd = unsafe {
            libc::shm_open(
                self.os_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR,
                (libc::S_IRUSR | libc::S_IWUSR) as libc::c_uint,
            )
        };
        if fd == -1 {
            return Err(RegionError::Open {
                name: self.name.clone(),
                source: io::Error::last_os_error(),
            });
        }

        // SAFETY: shm_open just returned this descriptor and nothing else owns it.
        Ok(File::from(unsafe { OwnedFd::from_raw_fd(fd) }))
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        self.unmap();
    }
}

/// Whether a backing object named `name` currently exists.
pub fn exists(name: &str) -> Result<bool, RegionError> {
    let os_name = to_os_name(name)?;

    // SAFETY: os_name is a valid NUL-terminated string.
    let fd = unsafe { libc::shm_open(os_name.as_ptr(), libc::O_RDONLY, 0 as libc::c_uint) };
    if fd == -1 {
        let source = io::Error::last_os_error();
        return match source.raw_os_error() {
            Some(libc::ENOENT) => Ok(false),
            _ => Err(RegionError::Open {
                name: name.to_string(),
                source,
            }),
        };
    }

    // SAFETY: shm_open just returned this descriptor; dropping closes it.
    drop(unsafe { OwnedFd::from_raw_fd(fd) });
    Ok(true)
}

/// Unlinks the backing object named `name` without mapping it.
///
/// Returns `false` if there was nothing to remove.
pub fn remove(name: &str) -> Result<bool, RegionError> {
    let os_name = to_os_name(name)?;
    unlink(&os_name).map_err(|source| RegionError::Unlink {
        name: name.to_string(),
        source,
    })
}

fn unlink(os_name: &CStr) -> io::Result<bool> {
    // SAFETY: os_name is a valid NUL-terminated string.
    if unsafe { libc::shm_unlink(os_name.as_ptr()) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ENOENT) => Ok(false),
        _ => Err(err),
    }
}
