use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Tuning for named mutexes. Every key is optional in the TOML file.
///
/// ```toml
/// staleness_threshold_ms = 60000
/// poll_interval_ms = 1
/// guard_timeout_ms = 1000
/// attach_retries = 8
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// A region initialized longer ago than this is treated as abandoned.
    #[serde(default = "defaults::staleness_threshold_ms")]
    pub staleness_threshold_ms: u64,
    /// Sleep between attempts while `try_lock` waits.
    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// A counter guard held this long by one holder is taken over.
    #[serde(default = "defaults::guard_timeout_ms")]
    pub guard_timeout_ms: u64,
    /// Re-opens allowed when attaching races with the last holder leaving.
    #[serde(default = "defaults::attach_retries")]
    pub attach_retries: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

mod defaults {
    pub fn staleness_threshold_ms() -> u64 {
        60_000
    }

    pub fn poll_interval_ms() -> u64 {
        1
    }

    pub fn guard_timeout_ms() -> u64 {
        1_000
    }

    pub fn attach_retries() -> u32 {
        8
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            staleness_threshold_ms: defaults::staleness_threshold_ms(),
            poll_interval_ms: defaults::poll_interval_ms(),
            guard_timeout_ms: defaults::guard_timeout_ms(),
            attach_retries: defaults::attach_retries(),
        }
    }
}

impl LockConfig {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&toml_to_str)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: LockConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.staleness_threshold_ms == 0 {
            return Err(ConfigError::Invalid("staleness_threshold_ms must be positive"));
        }
        if self.guard_timeout_ms == 0 {
            return Err(ConfigError::Invalid("guard_timeout_ms must be positive"));
        }
        if self.attach_retries == 0 {
            return Err(ConfigError::Invalid("attach_retries must be at least 1"));
        }
        Ok(())
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_millis(self.staleness_threshold_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn guard_timeout(&self) -> Duration {
        Duration::from_millis(self.guard_timeout_ms)
    }
}
