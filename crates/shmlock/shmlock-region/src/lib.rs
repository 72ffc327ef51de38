//! Named POSIX shared-memory regions holding a fixed [`SharedLayout`].
//!
//! A [`SharedRegion`] opens (or creates) the backing object by name, maps it
//! read-write into the current process and hands out the layout living at
//! offset 0. Mapping lifetime is process-local; removing the backing object
//! is an explicit [`SharedRegion::destroy`] (or [`remove`]) call.

mod error;
mod layout;
mod lock;
mod name;
mod region;

pub use error::RegionError;
pub use layout::{REGION_BYTES, SharedLayout};
pub use lock::SharedLock;
pub use region::{SharedRegion, exists, remove};
