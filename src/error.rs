//! Error type shared by every fallible `ChainedHashMap` operation

use thiserror::Error;

/// Errors reported by [`ChainedHashMap`](crate::ChainedHashMap) and [`ChainConfig`](crate::ChainConfig)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainHashError {
    /// The requested key is not present in the map
    #[error("key not found")]
    KeyNotFound,

    /// A bucket index outside `0..bucket_count` was requested
    #[error("bucket index {index} out of range for {bucket_count} buckets")]
    IndexOutOfRange {
        /// The index that was asked for
        index: usize,
        /// The bucket count at the time of the call
        bucket_count: usize,
    },

    /// The map was configured with unusable parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Growing past `capacity` buckets would overflow `usize`
    #[error("cannot grow past {capacity} buckets")]
    CapacityOverflow {
        /// The bucket count that could not be grown
        capacity: usize,
    },

    /// The bucket arrays for a rehash could not be allocated
    #[error("failed to allocate {requested} buckets")]
    AllocationFailed {
        /// The bucket count that was being allocated
        requested: usize,
    },
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ChainHashError>;
