//! # Chained Hash Map
//!
//! A Rust implementation of a hash table using open hashing with separate chaining.
//!
//! `ChainedHashMap` keeps one singly linked chain per bucket together with a count of
//! the entries in every bucket. Right after a new key is inserted the map checks two
//! thresholds: the length of the chain the key landed in, and the share of buckets
//! that are occupied. Exceeding either one rehashes the whole map into
//! `2 * bucket_count + 1` buckets, relinking the existing nodes rather than copying
//! their keys and values.
//!
//! The thresholds default to [`MAX_CHAIN_LENGTH`] and [`MAX_LOAD_FACTOR`] and can be
//! changed through [`ChainConfig`].
//!
//! ## Basic Usage
//!
//! ```rust
//! use chainhash::{ChainHashError, ChainedHashMap};
//!
//! // Create a new hash map with ten buckets
//! let mut map = ChainedHashMap::new(10)?;
//!
//! // Insert values
//! map.set("apple".to_string(), 1)?;
//! map.set("banana".to_string(), 2)?;
//!
//! // Retrieve values
//! assert_eq!(map.get("apple"), Ok(&1));
//! assert_eq!(map.get("cherry"), Err(ChainHashError::KeyNotFound));
//!
//! // Update values
//! map.set("apple".to_string(), 10)?;
//! assert_eq!(map.get("apple"), Ok(&10));
//! assert_eq!(map.size(), 2);
//!
//! // Remove values
//! assert!(map.remove("apple"));
//! assert!(!map.contains("apple"));
//! # Ok::<(), ChainHashError>(())
//! ```
//!
//! ## Inspecting Buckets
//!
//! ```rust
//! use chainhash::{ChainConfig, ChainHashError, ChainedHashMap};
//!
//! let config = ChainConfig::default().with_initial_capacity(4).with_max_chain_length(2);
//! let mut map = ChainedHashMap::with_config(config)?;
//! for i in 0..32_u32 {
//!     map.set(i, i * i)?;
//! }
//!
//! let mut total = 0;
//! for index in 0..map.bucket_count() {
//!     for (key, value) in map.bucket(index)? {
//!         assert_eq!(*value, key * key);
//!     }
//!     total += map.bucket_size(index)?;
//! }
//! assert_eq!(total, map.size());
//! # Ok::<(), ChainHashError>(())
//! ```

/// Module implementing the separate-chaining hash map
mod chained_hashmap;
/// Module holding the capacity and rehash thresholds
mod config;
/// Module defining the crate error type
mod error;
/// Utility functions and traits for the hash map
mod utils;

pub use chained_hashmap::{BucketIter, ChainedHashMap, IntoIter, Iter};
pub use config::{ChainConfig, DEFAULT_CAPACITY, MAX_CHAIN_LENGTH, MAX_LOAD_FACTOR};
pub use error::{ChainHashError, Result};
pub use utils::{HashMapExtensions, try_from_iter};
