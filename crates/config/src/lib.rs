//! # Config - Multidex tuning knobs
//!
//! Growth and bucket sizing shared by the row store, the key indices and the
//! `MultiIndex` facade.
//!
//! ```text
//! MULTIDEX_MIN_CAPACITY   smallest non-zero row capacity   (default: 5)
//! MULTIDEX_GROWTH_FACTOR  capacity multiplier when full    (default: 2)
//! MULTIDEX_MIN_BUCKETS    smallest bucket count per index  (default: 5)
//! ```

use thiserror::Error;

/// Capacity allocated by the first growth of an empty store.
pub const DEFAULT_MIN_CAPACITY: usize = 5;
/// Multiplier applied to the capacity when a full store grows.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;
/// Smallest number of buckets a key index ever has.
pub const DEFAULT_MIN_BUCKETS: usize = 5;

pub const ENV_MIN_CAPACITY: &str = "MULTIDEX_MIN_CAPACITY";
pub const ENV_GROWTH_FACTOR: &str = "MULTIDEX_GROWTH_FACTOR";
pub const ENV_MIN_BUCKETS: &str = "MULTIDEX_MIN_BUCKETS";

/// Errors produced while building or validating a [`TableConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment override could not be parsed as an unsigned integer.
    #[error("invalid value for {key}: {value:?}")]
    Parse { key: &'static str, value: String },

    /// A setting is below the smallest value the containers can work with.
    #[error("{key} must be >= {min} (got {value})")]
    TooSmall {
        key: &'static str,
        value: usize,
        min: usize,
    },
}

/// Sizing policy for a `MultiIndex` and its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableConfig {
    /// Capacity of the first allocation of an empty store.
    pub min_capacity: usize,
    /// Capacity multiplier applied on growth.
    pub growth_factor: usize,
    /// Lower bound on every index's bucket count.
    pub min_buckets: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            min_capacity: DEFAULT_MIN_CAPACITY,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            min_buckets: DEFAULT_MIN_BUCKETS,
        }
    }
}

impl TableConfig {
    /// Checks that every knob is usable.
    ///
    /// A growth factor below 2 would never make room for a push, and zero
    /// capacities or bucket counts would divide by zero in the indices.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_capacity < 1 {
            return Err(ConfigError::TooSmall {
                key: ENV_MIN_CAPACITY,
                value: self.min_capacity,
                min: 1,
            });
        }
        if self.growth_factor < 2 {
            return Err(ConfigError::TooSmall {
                key: ENV_GROWTH_FACTOR,
                value: self.growth_factor,
                min: 2,
            });
        }
        if self.min_buckets < 1 {
            return Err(ConfigError::TooSmall {
                key: ENV_MIN_BUCKETS,
                value: self.min_buckets,
                min: 1,
            });
        }
        Ok(())
    }

    /// Builds a config from the process environment, falling back to the
    /// defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str, default: usize| -> Result<usize, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Parse {
                    key,
                    value: raw.clone(),
                }),
            }
        };

        let cfg = Self {
            min_capacity: read(ENV_MIN_CAPACITY, DEFAULT_MIN_CAPACITY)?,
            growth_factor: read(ENV_GROWTH_FACTOR, DEFAULT_GROWTH_FACTOR)?,
            min_buckets: read(ENV_MIN_BUCKETS, DEFAULT_MIN_BUCKETS)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Capacity a full store of capacity `current` grows to, or `None` on
    /// overflow.
    #[must_use]
    pub fn next_capacity(&self, current: usize) -> Option<usize> {
        current
            .checked_mul(self.growth_factor)
            .map(|grown| grown.max(self.min_capacity))
    }

    /// Bucket count an index should have to hold `capacity` rows.
    #[must_use]
    pub fn buckets_for(&self, capacity: usize) -> usize {
        capacity.max(self.min_buckets)
    }
}
