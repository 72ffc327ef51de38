use shmlock_config::ConfigError;
use shmlock_region::RegionError;

#[derive(Debug, thiserror::Error)]
pub enum MutexError {
    #[error(transparent)]
    Region(#[from] RegionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("shared region '{name}' is not mapped")]
    NotMapped { name: String },

    #[error("shared region '{name}' was still retiring after {attempts} attach attempts")]
    Retired { name: String, attempts: u32 },

    #[error("named mutex '{name}' has been released")]
    Released { name: String },
}
