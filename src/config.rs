//! Query and runtime configuration.
//!
//! ## Example
//!
//! ```rust
//! use toppartitions::config::{RuntimeConfig, TopPartitionsConfig};
//!
//! let query = TopPartitionsConfig::builder().list_size(5).capacity(64).build();
//! assert_eq!(query.list_size(), 5);
//!
//! let runtime = RuntimeConfig::builder().shards(4).build();
//! assert_eq!(runtime.shards(), 4);
//! ```

use crate::ds::space_saving::DEFAULT_CAPACITY;
use crate::error::ConfigError;

/// Number of partitions reported per list when none is requested.
pub const DEFAULT_LIST_SIZE: usize = 10;

/// Settings of one top-partitions query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopPartitionsConfig {
    list_size: usize,
    capacity: usize,
}

impl TopPartitionsConfig {
    pub fn builder() -> TopPartitionsConfigBuilder {
        TopPartitionsConfigBuilder::default()
    }

    /// Entries reported per read/write list.
    pub fn list_size(&self) -> usize {
        self.list_size
    }

    /// Keys tracked per estimator, on each shard and when merging.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks the cross-field constraints enforced by the builder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.list_size == 0 {
            return Err(ConfigError::new("list_size must be > 0"));
        }
        if self.capacity == 0 {
            return Err(ConfigError::new("capacity must be > 0"));
        }
        if self.list_size > self.capacity {
            return Err(ConfigError::new(format!(
                "list_size ({}) must not exceed capacity ({})",
                self.list_size, self.capacity
            )));
        }
        Ok(())
    }
}

impl Default for TopPartitionsConfig {
    fn default() -> Self {
        Self {
            list_size: DEFAULT_LIST_SIZE,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Builder for [`TopPartitionsConfig`].
#[derive(Debug, Clone, Default)]
pub struct TopPartitionsConfigBuilder {
    config: TopPartitionsConfig,
}

impl TopPartitionsConfigBuilder {
    pub fn list_size(mut self, list_size: usize) -> Self {
        self.config.list_size = list_size;
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if the settings are invalid; use [`try_build`](Self::try_build)
    /// for user-supplied values.
    pub fn build(self) -> TopPartitionsConfig {
        match self.try_build() {
            Ok(config) => config,
            Err(err) => panic!("invalid top-partitions config: {err}"),
        }
    }

    pub fn try_build(self) -> Result<TopPartitionsConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings of a [`ShardRuntime`](crate::runtime::ShardRuntime).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    shards: usize,
    seed: u64,
    max_listeners_per_shard: Option<usize>,
}

impl RuntimeConfig {
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Reads overrides from the environment, falling back to defaults.
    ///
    /// - `TOPPARTITIONS_SHARDS`: shard count (default `1`)
    /// - `TOPPARTITIONS_SEED`: routing seed (default `0`)
    /// - `TOPPARTITIONS_MAX_LISTENERS`: per-shard listener limit (default none)
    ///
    /// An unset variable keeps its default; a set one that does not parse is
    /// an error naming the variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| -> Result<Option<u64>, ConfigError> {
            match lookup(name) {
                None => Ok(None),
                Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                    ConfigError::new(format!("{name} must be an unsigned integer, got {raw:?}"))
                }),
            }
        };
        let count = |name: &str| -> Result<Option<usize>, ConfigError> {
            var(name)?
                .map(|n| {
                    usize::try_from(n)
                        .map_err(|_| ConfigError::new(format!("{name} is out of range: {n}")))
                })
                .transpose()
        };

        let mut builder = Self::builder();
        if let Some(shards) = count("TOPPARTITIONS_SHARDS")? {
            builder = builder.shards(shards);
        }
        if let Some(seed) = var("TOPPARTITIONS_SEED")? {
            builder = builder.seed(seed);
        }
        if let Some(limit) = count("TOPPARTITIONS_MAX_LISTENERS")? {
            builder = builder.max_listeners_per_shard(limit);
        }
        builder.try_build()
    }

    pub fn shards(&self) -> usize {
        self.shards
    }

    /// Seed of the key-to-shard hash.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn max_listeners_per_shard(&self) -> Option<usize> {
        self.max_listeners_per_shard
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.shards == 0 {
            return Err(ConfigError::new("shards must be > 0"));
        }
        if self.max_listeners_per_shard == Some(0) {
            return Err(ConfigError::new("max_listeners_per_shard must be > 0"));
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            shards: 1,
            seed: 0,
            max_listeners_per_shard: None,
        }
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    pub fn shards(mut self, shards: usize) -> Self {
        self.config.shards = shards;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn max_listeners_per_shard(mut self, limit: usize) -> Self {
        self.config.max_listeners_per_shard = Some(limit);
        self
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if the settings are invalid.
    pub fn build(self) -> RuntimeConfig {
        match self.try_build() {
            Ok(config) => config,
            Err(err) => panic!("invalid runtime config: {err}"),
        }
    }

    pub fn try_build(self) -> Result<RuntimeConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
