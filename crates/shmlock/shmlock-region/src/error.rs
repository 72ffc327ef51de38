use std::io;

#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("invalid shared memory name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("failed to open shared memory object '{name}'")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to size shared memory object '{name}'")]
    Size {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("shared memory object '{name}' is {actual} bytes, expected {expected}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("failed to map shared memory object '{name}'")]
    Map {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to unlink shared memory object '{name}'")]
    Unlink {
        name: String,
        #[source]
        source: io::Error,
    },
}
