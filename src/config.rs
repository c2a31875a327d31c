//! Growth policy of a [`ChainedHashMap`](crate::ChainedHashMap)

use crate::error::{ChainHashError, Result};

/// Number of buckets a map starts with when none is given
pub const DEFAULT_CAPACITY: usize = 10;

/// Longest chain tolerated in a single bucket before the map rehashes
pub const MAX_CHAIN_LENGTH: usize = 3;

/// Highest ratio of occupied buckets to total buckets before the map rehashes
pub const MAX_LOAD_FACTOR: f64 = 0.8;

/// Capacity and rehash thresholds of a map.
///
/// A rehash is triggered right after inserting a new key whenever the bucket it
/// landed in holds more than `max_chain_length` nodes, or whenever
/// `used_buckets / bucket_count` exceeds `max_load_factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainConfig {
    /// Number of buckets allocated up front
    pub initial_capacity: usize,
    /// Chain length that, once exceeded, forces a rehash
    pub max_chain_length: usize,
    /// Occupied-bucket ratio that, once exceeded, forces a rehash
    pub max_load_factor: f64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            max_chain_length: MAX_CHAIN_LENGTH,
            max_load_factor: MAX_LOAD_FACTOR,
        }
    }
}

impl ChainConfig {
    /// Sets the number of buckets allocated up front
    #[must_use]
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Sets the chain length threshold
    #[must_use]
    pub fn with_max_chain_length(mut self, length: usize) -> Self {
        self.max_chain_length = length;
        self
    }

    /// Sets the load factor threshold
    #[must_use]
    pub fn with_max_load_factor(mut self, load_factor: f64) -> Self {
        self.max_load_factor = load_factor;
        self
    }

    /// Checks that the configuration describes a usable map.
    ///
    /// # Errors
    ///
    /// Returns [`ChainHashError::InvalidConfig`] when the capacity or the chain
    /// length is zero, or when the load factor is not a positive finite number.
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(ChainHashError::InvalidConfig(
                "initial capacity must be at least 1".to_string(),
            ));
        }
        if self.max_chain_length == 0 {
            return Err(ChainHashError::InvalidConfig(
                "max chain length must be at least 1".to_string(),
            ));
        }
        if !self.max_load_factor.is_finite() || self.max_load_factor <= 0.0 {
            return Err(ChainHashError::InvalidConfig(format!(
                "max load factor must be positive and finite, got {}",
                self.max_load_factor
            )));
        }
        Ok(())
    }
}
