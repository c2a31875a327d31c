//! Utility functions and traits for `ChainedHashMap`

use crate::{ChainedHashMap, error::Result};
use std::hash::Hash;

/// Extension trait for map implementations that provides additional utility methods
pub trait HashMapExtensions<K, V> {
    /// Returns the keys of the hash map as a Vec
    fn keys(&self) -> Vec<K>;

    /// Returns the values of the hash map as a Vec
    fn values(&self) -> Vec<V>;

    /// Returns the length of the longest chain
    fn longest_chain(&self) -> usize;

    /// Returns how many buckets hold each chain length.
    ///
    /// Entry `n` of the result counts the buckets whose chain has exactly `n`
    /// entries, so entry 0 is the number of empty buckets.
    fn chain_length_histogram(&self) -> Vec<usize>;
}

impl<K, V> HashMapExtensions<K, V> for ChainedHashMap<K, V>
where
    K: Clone,
    V: Clone,
{
    fn keys(&self) -> Vec<K> {
        self.iter().map(|(k, _)| k.clone()).collect()
    }

    fn values(&self) -> Vec<V> {
        self.iter().map(|(_, v)| v.clone()).collect()
    }

    fn longest_chain(&self) -> usize {
        chain_lengths(self).max().unwrap_or(0)
    }

    fn chain_length_histogram(&self) -> Vec<usize> {
        let mut histogram = vec![0_usize; self.longest_chain().saturating_add(1)];
        for length in chain_lengths(self) {
            if let Some(buckets) = histogram.get_mut(length) {
                *buckets = buckets.saturating_add(1);
            }
        }
        histogram
    }
}

/// Walks the bucket counts in index order
fn chain_lengths<K, V>(map: &ChainedHashMap<K, V>) -> impl Iterator<Item = usize> + '_ {
    (0..map.bucket_count()).filter_map(|index| map.bucket_size(index).ok())
}

/// Creates a `ChainedHashMap` with the default configuration from an iterator of key-value pairs.
///
/// Later pairs overwrite earlier pairs with the same key.
///
/// # Errors
///
/// Returns the first error reported by [`ChainedHashMap::set`].
pub fn try_from_iter<K, V, I>(iter: I) -> Result<ChainedHashMap<K, V>>
where
    K: Eq + Hash,
    I: IntoIterator<Item = (K, V)>,
{
    let mut map = ChainedHashMap::default();
    for (key, value) in iter {
        map.set(key, value)?;
    }
    Ok(map)
}
