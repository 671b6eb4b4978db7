use codec::SerializerPoolConfig;
use object_pool::PoolConfig;
use serde::{Deserialize, Serialize};
use stream_pair::DEFAULT_CAPACITY;

use crate::error::ConfigError;

/// Everything an [`Incubator`](crate::Incubator) can be tuned with.
///
/// Missing sections and fields fall back to their defaults, so an empty
/// TOML document is a valid configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncubatorConfig {
    pub resource_pool: PoolConfig,
    pub stream: StreamConfig,
    pub serializer_pool: SerializerPoolConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Bytes a single stream pair buffers; a copy larger than this fails.
    pub capacity_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: DEFAULT_CAPACITY,
        }
    }
}

impl IncubatorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Stream capacity is not checked here; an unusable
    /// capacity surfaces as a resource creation failure on first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resource_pool.validate()?;
        Ok(())
    }
}
