use std::time::Duration;

use derive_more::derive::From;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, From)]
pub enum ConfigError {
    #[from(ignore)]
    IOError(std::io::Error),

    #[from(ignore)]
    DeserializationFailed(toml::de::Error),

    #[from(ignore)]
    Invalid(&'static str),
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::DeserializationFailed(value)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl std::error::Error for ConfigError {}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Reads a TOML file into any deserializable type.
pub fn from_path<T, V>(target: V) -> ConfigResult<T>
where
    T: DeserializeOwned,
    V: Into<std::path::PathBuf>,
{
    let target_path = target.into();
    let config_content = std::fs::read_to_string(target_path)?;
    let config_obj: T = toml::from_str(&config_content)?;
    Ok(config_obj)
}

/// Settings of both demos. Every key is optional and falls back to the
/// defaults below.
///
/// ```toml
/// [queue]
/// capacity = 20
/// producers = 2
/// consumers = 5
/// max_produce_pause_ms = 4000
/// max_consume_pause_ms = 10000
///
/// [guard]
/// readers = 3
/// writers = 1
/// max_read_pause_ms = 3000
/// max_write_pause_ms = 3000
/// max_value = 1000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub queue: QueueConfig,
    pub guard: GuardConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    pub max_produce_pause_ms: u64,
    pub max_consume_pause_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            producers: 2,
            consumers: 5,
            max_produce_pause_ms: 4_000,
            max_consume_pause_ms: 10_000,
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub fn max_produce_pause(&self) -> Duration {
        Duration::from_millis(self.max_produce_pause_ms)
    }

    #[must_use]
    pub fn max_consume_pause(&self) -> Duration {
        Duration::from_millis(self.max_consume_pause_ms)
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] for a zero capacity or no workers on either
    /// side.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("queue.capacity must be at least 1"));
        }
        if self.producers == 0 && self.consumers == 0 {
            return Err(ConfigError::Invalid(
                "queue needs at least one producer or consumer",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    pub readers: usize,
    pub writers: usize,
    pub max_read_pause_ms: u64,
    pub max_write_pause_ms: u64,
    pub max_value: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            readers: 3,
            writers: 1,
            max_read_pause_ms: 3_000,
            max_write_pause_ms: 3_000,
            max_value: 1_000,
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn max_read_pause(&self) -> Duration {
        Duration::from_millis(self.max_read_pause_ms)
    }

    #[must_use]
    pub fn max_write_pause(&self) -> Duration {
        Duration::from_millis(self.max_write_pause_ms)
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when there are no workers at all or
    /// `max_value` is zero.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.readers == 0 && self.writers == 0 {
            return Err(ConfigError::Invalid(
                "guard needs at least one reader or writer",
            ));
        }
        if self.max_value == 0 {
            return Err(ConfigError::Invalid("guard.max_value must be at least 1"));
        }
        Ok(())
    }
}

impl DemoConfig {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// I/O, TOML or validation failures.
    pub fn from_path<V: Into<std::path::PathBuf>>(target: V) -> ConfigResult<Self> {
        let config: Self = from_path(target)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// TOML or validation failures.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// The first section that fails its own `validate`.
    pub fn validate(&self) -> ConfigResult<()> {
        self.queue.validate()?;
        self.guard.validate()
    }
}
