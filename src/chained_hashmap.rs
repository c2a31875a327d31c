use std::{
    borrow::Borrow,
    collections::TryReserveError,
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    iter::FusedIterator,
    mem,
};

use log::{debug, trace, warn};

use crate::{
    config::ChainConfig,
    error::{ChainHashError, Result},
};

/// A key-value pair and the owning link to the next node of its chain
#[derive(Debug)]
struct Node<K, V> {
    /// The key in the key-value pair
    key: K,
    /// The value associated with the key
    value: V,
    /// Rest of the chain, `None` at the tail
    next: Link<K, V>,
}

/// Owning pointer to the head of a chain, or to the rest of one
type Link<K, V> = Option<Box<Node<K, V>>>;

/// Bucket array, per-bucket counts and the two counters derived from them.
///
/// A rehash builds a fresh `Table` and moves every node into it, so the
/// counters of a new table start at zero and are accumulated node by node.
struct Table<K, V> {
    /// One chain head per bucket
    buckets: Vec<Link<K, V>>,
    /// Number of nodes in each bucket, parallel to `buckets`
    bucket_sizes: Vec<usize>,
    /// Total number of nodes
    size: usize,
    /// Number of buckets holding at least one node
    used_buckets: usize,
}

impl<K, V> Table<K, V> {
    /// Allocates `capacity` empty buckets, aborting on allocation failure like `Vec` does
    fn with_capacity(capacity: usize) -> Self {
        Self::filled(Vec::with_capacity(capacity), Vec::with_capacity(capacity), capacity)
    }

    /// Allocates `capacity` empty buckets, reporting allocation failure instead of aborting
    fn try_with_capacity(capacity: usize) -> Result<Self> {
        let failed = |_: TryReserveError| ChainHashError::AllocationFailed { requested: capacity };

        let mut buckets = Vec::new();
        buckets.try_reserve_exact(capacity).map_err(failed)?;
        let mut bucket_sizes = Vec::new();
        bucket_sizes.try_reserve_exact(capacity).map_err(failed)?;

        Ok(Self::filled(buckets, bucket_sizes, capacity))
    }

    /// Sizes freshly reserved vectors to `capacity` empty buckets
    fn filled(
        mut buckets: Vec<Link<K, V>>,
        mut bucket_sizes: Vec<usize>,
        capacity: usize,
    ) -> Self {
        buckets.resize_with(capacity, || None);
        bucket_sizes.resize(capacity, 0);
        Self { buckets, bucket_sizes, size: 0, used_buckets: 0 }
    }

    /// Number of buckets
    fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Walks bucket `index`, yielding nothing for an index past the end
    fn chain(&self, index: usize) -> BucketIter<'_, K, V> {
        BucketIter { next: self.buckets.get(index).and_then(|head| head.as_deref()) }
    }

    /// Finds the first node of bucket `index` whose key satisfies `is_match`
    fn find_mut(
        &mut self,
        index: usize,
        mut is_match: impl FnMut(&K) -> bool,
    ) -> Option<&mut Node<K, V>> {
        let mut cursor = self.buckets.get_mut(index)?.as_deref_mut();
        while let Some(node) = cursor {
            if is_match(&node.key) {
                return Some(node);
            }
            cursor = node.next.as_deref_mut();
        }
        None
    }

    /// Links `node` in as the new head of bucket `index`
    #[allow(clippy::indexing_slicing)]
    fn push_front(&mut self, index: usize, mut node: Box<Node<K, V>>) {
        let head = &mut self.buckets[index];
        node.next = head.take();
        *head = Some(node);

        let count = &mut self.bucket_sizes[index];
        if *count == 0 {
            self.used_buckets = self.used_buckets.saturating_add(1);
        }
        *count = count.saturating_add(1);
        self.size = self.size.saturating_add(1);
    }

    /// Detaches the first node of bucket `index` whose key satisfies `is_match`.
    ///
    /// The trailing link is either the bucket head or the `next` field of the
    /// predecessor, so unlinking is the same operation in both cases.
    #[allow(clippy::indexing_slicing)]
    fn unlink(
        &mut self,
        index: usize,
        mut is_match: impl FnMut(&K) -> bool,
    ) -> Option<Box<Node<K, V>>> {
        let mut link = &mut self.buckets[index];
        while link.as_ref().is_some_and(|node| !is_match(&node.key)) {
            link = &mut link.as_mut()?.next;
        }
        let mut node = link.take()?;
        *link = node.next.take();

        let count = &mut self.bucket_sizes[index];
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.used_buckets = self.used_buckets.saturating_sub(1);
        }
        self.size = self.size.saturating_sub(1);
        Some(node)
    }

    /// Drops every node, one at a time so long chains never recurse
    fn clear(&mut self) {
        for head in &mut self.buckets {
            let mut cursor = head.take();
            while let Some(mut node) = cursor {
                cursor = node.next.take();
            }
        }
        self.bucket_sizes.fill(0);
        self.size = 0;
        self.used_buckets = 0;
    }
}

impl<K, V> Drop for Table<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

/// A hash map using open hashing with separate chaining.
///
/// Every bucket owns a singly linked chain of nodes. New keys are linked at the
/// head of their bucket's chain. Right after a new key is linked, the map
/// rehashes into `2 * bucket_count + 1` buckets if that chain has grown past
/// [`ChainConfig::max_chain_length`] or if the share of occupied buckets has
/// grown past [`ChainConfig::max_load_factor`]. Rehashing moves the existing
/// nodes into the new buckets; keys and values are never copied. The map never
/// shrinks.
///
/// Keys are hashed with [`DefaultHasher`] built with fixed keys, so bucket
/// placement is deterministic for a given key type.
///
/// Note: This implementation is not thread-safe.
pub struct ChainedHashMap<K, V> {
    /// Buckets, counts and counters
    table: Table<K, V>,
    /// Rehash thresholds
    config: ChainConfig,
}

impl<K, V> Default for ChainedHashMap<K, V> {
    /// Creates an empty map with [`DEFAULT_CAPACITY`](crate::DEFAULT_CAPACITY) buckets
    fn default() -> Self {
        let config = ChainConfig::default();
        Self { table: Table::with_capacity(config.initial_capacity), config }
    }
}

impl<K, V> ChainedHashMap<K, V>
where
    K: Hash + Eq,
{
    /// Creates an empty map with `initial_capacity` buckets and the default thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ChainHashError::InvalidConfig`] if `initial_capacity` is zero and
    /// [`ChainHashError::AllocationFailed`] if the buckets cannot be allocated.
    pub fn new(initial_capacity: usize) -> Result<Self> {
        Self::with_config(ChainConfig::default().with_initial_capacity(initial_capacity))
    }

    /// Creates an empty map from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChainHashError::InvalidConfig`] if `config` fails
    /// [`ChainConfig::validate`] and [`ChainHashError::AllocationFailed`] if the
    /// buckets cannot be allocated.
    pub fn with_config(config: ChainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { table: Table::try_with_capacity(config.initial_capacity)?, config })
    }

    /// Returns a reference to the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainHashError::KeyNotFound`] if the key is absent.
    pub fn get<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table
            .chain(self.bucket_index(key))
            .find(|&(candidate, _)| candidate.borrow() == key)
            .map(|(_, value)| value)
            .ok_or(ChainHashError::KeyNotFound)
    }

    /// Returns a mutable reference to the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainHashError::KeyNotFound`] if the key is absent.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.bucket_index(key);
        self.table
            .find_mut(index, |candidate| candidate.borrow() == key)
            .map(|node| &mut node.value)
            .ok_or(ChainHashError::KeyNotFound)
    }

    /// Returns true if the map holds `key`
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.chain(self.bucket_index(key)).any(|(candidate, _)| candidate.borrow() == key)
    }

    /// Inserts `value` under `key`, returning the value it replaced.
    ///
    /// An existing key has its value overwritten in place and the bucket layout
    /// is left alone. A new key is linked at the head of its bucket; if that
    /// pushes the bucket past the chain-length threshold or the map past the
    /// load-factor threshold, the whole map is rehashed before returning.
    ///
    /// # Errors
    ///
    /// Returns [`ChainHashError::CapacityOverflow`] or
    /// [`ChainHashError::AllocationFailed`] if a needed rehash cannot get its new
    /// buckets. The map is left exactly as it was before the call.
    pub fn set(&mut self, key: K, value: V) -> Result<Option<V>> {
        let index = self.bucket_index(&key);
        if let Some(node) = self.table.find_mut(index, |candidate| *candidate == key) {
            return Ok(Some(mem::replace(&mut node.value, value)));
        }

        let chain_length =
            self.table.bucket_sizes.get(index).map_or(1, |count| count.saturating_add(1));
        let used_buckets = if chain_length == 1 {
            self.table.used_buckets.saturating_add(1)
        } else {
            self.table.used_buckets
        };

        // The grown table is allocated before the node is linked: a failed
        // allocation must leave the map untouched.
        let grown = if self.exceeds_thresholds(chain_length, used_buckets) {
            Some(self.grown_table()?)
        } else {
            None
        };

        self.table.push_front(index, Box::new(Node { key, value, next: None }));
        trace!("linked new key into bucket {index} ({chain_length} entries)");

        if let Some(table) = grown {
            self.rehash(table);
        }
        Ok(None)
    }

    /// Removes `key`, returning true if it was present
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).is_some()
    }

    /// Removes `key` and hands back the stored key and value
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.bucket_index(key);
        let node = self.table.unlink(index, |candidate| candidate.borrow() == key)?;
        let Node { key, value, .. } = *node;
        Some((key, value))
    }

    /// Bucket a key belongs to at the current capacity
    fn bucket_index<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        Self::index_for(key, self.table.capacity())
    }

    /// Reduces the hash of `key` modulo `capacity`
    #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
    fn index_for<Q: Hash + ?Sized>(key: &Q, capacity: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        // capacity is never zero, and the remainder is below it so it fits back into usize
        (hasher.finish() % capacity as u64) as usize
    }

    /// True if a bucket of `chain_length` or `used_buckets` occupied buckets calls for a rehash
    #[allow(clippy::cast_precision_loss)]
    fn exceeds_thresholds(&self, chain_length: usize, used_buckets: usize) -> bool {
        chain_length > self.config.max_chain_length ||
            used_buckets as f64 / self.table.capacity() as f64 > self.config.max_load_factor
    }

    /// Allocates the empty `2 * capacity + 1` table the next rehash moves into
    fn grown_table(&self) -> Result<Table<K, V>> {
        let capacity = self.table.capacity();
        capacity
            .checked_mul(2)
            .and_then(|doubled| doubled.checked_add(1))
            .ok_or(ChainHashError::CapacityOverflow { capacity })
            .and_then(Table::try_with_capacity)
            .inspect_err(|err| warn!("cannot rehash {capacity} buckets: {err}"))
    }

    /// Moves every node, in bucket order then chain order, into `grown`.
    ///
    /// Each node is detached from its old chain and linked at the head of the
    /// bucket its key maps to at the new capacity. `grown` accumulates its own
    /// size and occupancy as nodes arrive.
    fn rehash(&mut self, mut grown: Table<K, V>) {
        let old_capacity = self.table.capacity();
        let new_capacity = grown.capacity();

        for head in &mut self.table.buckets {
            let mut cursor = head.take();
            while let Some(mut node) = cursor {
                cursor = node.next.take();
                let index = Self::index_for(&node.key, new_capacity);
                grown.push_front(index, node);
            }
        }

        debug!(
            "rehashed {} entries from {old_capacity} to {new_capacity} buckets ({} in use)",
            grown.size, grown.used_buckets
        );
        self.table = grown;
    }
}

impl<K, V> ChainedHashMap<K, V> {
    /// Returns the number of entries in the map
    #[must_use]
    pub fn size(&self) -> usize {
        self.table.size
    }

    /// Returns true if the map holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.size == 0
    }

    /// Returns the number of buckets
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the number of buckets holding at least one entry
    #[must_use]
    pub fn used_buckets(&self) -> usize {
        self.table.used_buckets
    }

    /// Returns the share of buckets holding at least one entry
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn load_factor(&self) -> f64 {
        self.table.used_buckets as f64 / self.table.capacity() as f64
    }

    /// Returns the thresholds this map was created with
    #[must_use]
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Returns the number of entries in bucket `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainHashError::IndexOutOfRange`] unless `index < bucket_count()`.
    pub fn bucket_size(&self, index: usize) -> Result<usize> {
        self.table.bucket_sizes.get(index).copied().ok_or_else(|| self.out_of_range(index))
    }

    /// Returns an iterator over the chain of bucket `index`, head to tail.
    ///
    /// # Errors
    ///
    /// Returns [`ChainHashError::IndexOutOfRange`] unless `index < bucket_count()`.
    pub fn bucket(&self, index: usize) -> Result<BucketIter<'_, K, V>> {
        if index < self.table.capacity() {
            Ok(self.table.chain(index))
        } else {
            Err(self.out_of_range(index))
        }
    }

    /// Returns an iterator over every entry, bucket by bucket
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.table.buckets.iter(),
            chain: BucketIter { next: None },
            remaining: self.table.size,
        }
    }

    /// Removes every entry, keeping the current bucket count
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Error for a bucket index past the end
    fn out_of_range(&self, index: usize) -> ChainHashError {
        ChainHashError::IndexOutOfRange { index, bucket_count: self.table.capacity() }
    }
}

impl<K, V> Clone for ChainedHashMap<K, V>
where
    K: Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        let mut table = Table::with_capacity(self.table.capacity());
        for (index, head) in self.table.buckets.iter().enumerate() {
            let chain: Vec<_> = BucketIter { next: head.as_deref() }.collect();
            // Linking tail first rebuilds the chain in its original order
            for (key, value) in chain.into_iter().rev() {
                table.push_front(
                    index,
                    Box::new(Node { key: key.clone(), value: value.clone(), next: None }),
                );
            }
        }
        Self { table, config: self.config }
    }
}

impl<K, V> fmt::Debug for ChainedHashMap<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> IntoIterator for &'a ChainedHashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K, V> IntoIterator for ChainedHashMap<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(mut self) -> IntoIter<K, V> {
        let remaining = self.table.size;
        let buckets = mem::take(&mut self.table.buckets);
        IntoIter { buckets: buckets.into_iter(), chain: None, remaining }
    }
}

/// Iterator over the chain of a single bucket
#[derive(Debug)]
pub struct BucketIter<'a, K, V> {
    /// Node to yield next
    next: Option<&'a Node<K, V>>,
}

impl<K, V> Clone for BucketIter<'_, K, V> {
    fn clone(&self) -> Self {
        Self { next: self.next }
    }
}

impl<'a, K, V> Iterator for BucketIter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|node| {
            self.next = node.next.as_deref();
            (&node.key, &node.value)
        })
    }
}

impl<K, V> FusedIterator for BucketIter<'_, K, V> {}

/// Iterator over every entry of the map
#[derive(Debug)]
pub struct Iter<'a, K, V> {
    /// Buckets not yet visited
    buckets: std::slice::Iter<'a, Link<K, V>>,
    /// Chain currently being walked
    chain: BucketIter<'a, K, V>,
    /// Entries left to yield
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.chain.next() {
                self.remaining = self.remaining.saturating_sub(1);
                return Some(entry);
            }
            let head = self.buckets.next()?;
            self.chain = BucketIter { next: head.as_deref() };
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// Owning iterator over every entry of the map
#[derive(Debug)]
pub struct IntoIter<K, V> {
    /// Buckets not yet visited
    buckets: std::vec::IntoIter<Link<K, V>>,
    /// Rest of the chain currently being drained
    chain: Link<K, V>,
    /// Entries left to yield
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(mut node) = self.chain.take() {
                self.chain = node.next.take();
                self.remaining = self.remaining.saturating_sub(1);
                let Node { key, value, .. } = *node;
                return Some((key, value));
            }
            self.chain = self.buckets.next()?;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<K, V> Drop for IntoIter<K, V> {
    fn drop(&mut self) {
        self.by_ref().for_each(drop);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::config::{MAX_CHAIN_LENGTH, MAX_LOAD_FACTOR};

    /// Key whose hash ignores its value, so every instance shares a bucket
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Colliding(u32);

    impl Hash for Colliding {
        fn hash<H: Hasher>(&self, state: &mut H) {
            0_u8.hash(state);
        }
    }

    /// Checks the counters against the chains they summarize
    fn assert_consistent<K: Hash + Eq + fmt::Debug, V>(map: &ChainedHashMap<K, V>) {
        let mut total = 0;
        let mut used = 0;
        for index in 0..map.bucket_count() {
            let chain: Vec<_> = map.bucket(index).into_iter().flatten().collect();
            assert_eq!(map.bucket_size(index), Ok(chain.len()));
            for (key, _) in &chain {
                assert_eq!(map.bucket_index(*key), index, "{key:?} lives in the wrong bucket");
            }
            total += chain.len();
            if !chain.is_empty() {
                used += 1;
            }
        }
        assert_eq!(total, map.size());
        assert_eq!(used, map.used_buckets());
    }

    fn is_growth_of(capacity: usize, initial: usize) -> bool {
        let mut step = initial;
        while step < capacity {
            step = step * 2 + 1;
        }
        step == capacity
    }

    fn occupied_bucket<K, V>(map: &ChainedHashMap<K, V>) -> Option<usize> {
        (0..map.bucket_count()).find(|&index| map.bucket_size(index).is_ok_and(|size| size > 0))
    }

    #[test]
    fn test_new_rejects_zero_capacity() {
        let result = ChainedHashMap::<u32, u32>::new(0);
        assert!(matches!(result, Err(ChainHashError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_reports_failed_allocation() {
        let requested = usize::MAX / 4;
        let result = ChainedHashMap::<u32, u32>::new(requested);
        assert!(matches!(result, Err(ChainHashError::AllocationFailed { requested: r }) if r == requested));
    }

    #[test]
    fn test_default() {
        let map: ChainedHashMap<String, i32> = ChainedHashMap::default();
        assert_eq!(map.bucket_count(), 10);
        assert_eq!(map.size(), 0);
        assert_eq!(map.used_buckets(), 0);
        assert!(map.is_empty());
        assert_eq!(*map.config(), ChainConfig::default());
    }

    #[test]
    fn test_set_and_get() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        assert_eq!(map.set("key1".to_string(), 1)?, None);
        assert_eq!(map.set("key2".to_string(), 2)?, None);
        assert_eq!(map.set("key3".to_string(), 3)?, None);

        assert_eq!(map.get("key1"), Ok(&1));
        assert_eq!(map.get("key2"), Ok(&2));
        assert_eq!(map.get("key3"), Ok(&3));
        assert_eq!(map.get("key4"), Err(ChainHashError::KeyNotFound));
        assert_eq!(map.size(), 3);
        assert_consistent(&map);
        Ok(())
    }

    #[test]
    fn test_overwrite_keeps_size() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        assert_eq!(map.set("a", 1)?, None);
        let used = map.used_buckets();
        assert_eq!(map.set("a", 2)?, Some(1));

        assert_eq!(map.get(&"a"), Ok(&2));
        assert_eq!(map.size(), 1);
        assert_eq!(map.used_buckets(), used);
        assert_consistent(&map);
        Ok(())
    }

    #[test]
    fn test_missing_key() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        map.set(1_u32, "one")?;

        assert_eq!(map.get(&2), Err(ChainHashError::KeyNotFound));
        assert!(!map.contains(&2));
        assert!(map.contains(&1));
        Ok(())
    }

    #[test]
    fn test_get_mut() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        map.set("key1".to_string(), 1)?;

        *map.get_mut("key1")? += 10;

        assert_eq!(map.get("key1"), Ok(&11));
        assert!(matches!(map.get_mut("key2"), Err(ChainHashError::KeyNotFound)));
        Ok(())
    }

    #[test]
    fn test_remove() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        map.set("key1".to_string(), 1)?;
        map.set("key2".to_string(), 2)?;

        assert!(map.remove("key1"));
        assert!(!map.contains("key1"));
        assert_eq!(map.get("key2"), Ok(&2));
        assert_eq!(map.size(), 1);

        assert!(!map.remove("key1"));
        assert_eq!(map.size(), 1);
        assert_consistent(&map);
        Ok(())
    }

    #[test]
    fn test_remove_entry_returns_owned_pair() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        map.set("key".to_string(), vec![1, 2, 3])?;

        assert_eq!(map.remove_entry("key"), Some(("key".to_string(), vec![1, 2, 3])));
        assert_eq!(map.remove_entry("key"), None);
        assert!(map.is_empty());
        Ok(())
    }

    #[test]
    fn test_bucket_index_out_of_range() -> Result<()> {
        let map: ChainedHashMap<u32, u32> = ChainedHashMap::new(10)?;
        let expected = ChainHashError::IndexOutOfRange { index: 10, bucket_count: 10 };

        assert_eq!(map.bucket_size(9), Ok(0));
        assert_eq!(map.bucket_size(10), Err(expected.clone()));
        assert!(map.bucket(9)?.next().is_none());
        assert!(matches!(map.bucket(10), Err(err) if err == expected));
        assert!(map.bucket(usize::MAX).is_err());
        Ok(())
    }

    #[test]
    fn test_ten_keys_into_ten_buckets() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        for i in 0..10_u64 {
            map.set(i, format!("v{i}"))?;
            assert_consistent(&map);
        }

        assert_eq!(map.size(), 10);
        assert!(is_growth_of(map.bucket_count(), 10), "unexpected capacity {}", map.bucket_count());
        assert_eq!(map.get(&5).map(String::as_str), Ok("v5"));

        assert!(map.remove(&5));
        assert_eq!(map.get(&5), Err(ChainHashError::KeyNotFound));
        assert_eq!(map.size(), 9);
        assert_consistent(&map);
        Ok(())
    }

    #[test]
    fn test_many_keys_force_growth() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        // Ten buckets holding at most three entries each cannot hold 100 keys
        for i in 0..100_u32 {
            map.set(i, i * 2)?;
        }

        assert!(map.bucket_count() > 10);
        assert!(is_growth_of(map.bucket_count(), 10));
        for i in 0..100_u32 {
            assert_eq!(map.get(&i), Ok(&(i * 2)));
        }
        assert_consistent(&map);
        Ok(())
    }

    #[test]
    fn test_single_bucket_grows_on_first_insert() -> Result<()> {
        let mut map = ChainedHashMap::new(1)?;
        map.set("only", 1)?;

        // One used bucket out of one is above the 0.8 load factor
        assert_eq!(map.bucket_count(), 3);
        assert_eq!(map.used_buckets(), 1);
        assert_eq!(map.get(&"only"), Ok(&1));
        assert_consistent(&map);
        Ok(())
    }

    #[test]
    fn test_low_load_factor_threshold() -> Result<()> {
        let config = ChainConfig::default().with_max_load_factor(0.05);
        let mut map = ChainedHashMap::with_config(config)?;
        map.set(7_u8, ())?;

        assert_eq!(map.bucket_count(), 21);
        assert_eq!(map.size(), 1);
        Ok(())
    }

    #[test]
    fn test_chain_order_is_most_recent_first() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        for i in 0..3 {
            map.set(Colliding(i), i)?;
        }

        assert_eq!(map.bucket_count(), 10);
        assert_eq!(map.used_buckets(), 1);
        let index = occupied_bucket(&map).ok_or(ChainHashError::KeyNotFound)?;
        let order: Vec<u32> = map.bucket(index)?.map(|(key, _)| key.0).collect();
        assert_eq!(order, vec![2, 1, 0]);
        Ok(())
    }

    #[test]
    fn test_long_chain_triggers_rehash() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        for i in 0..3 {
            map.set(Colliding(i), i)?;
        }
        assert_eq!(map.bucket_count(), 10);

        // A fourth colliding key exceeds the chain limit of three
        map.set(Colliding(3), 3)?;
        assert_eq!(map.bucket_count(), 21);
        assert_eq!(map.size(), 4);
        assert_eq!(map.used_buckets(), 1);

        // The chain cannot be split, so every further key grows the map again
        map.set(Colliding(4), 4)?;
        assert_eq!(map.bucket_count(), 43);

        for i in 0..5 {
            assert_eq!(map.get(&Colliding(i)), Ok(&i));
        }
        assert_consistent(&map);
        Ok(())
    }

    #[test]
    fn test_overwrite_never_rehashes() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        for i in 0..3 {
            map.set(Colliding(i), i)?;
        }
        for i in 0..3 {
            assert_eq!(map.set(Colliding(i), i + 10)?, Some(i));
        }
        assert_eq!(map.bucket_count(), 10);
        assert_eq!(map.get(&Colliding(1)), Ok(&11));
        Ok(())
    }

    #[test]
    fn test_custom_chain_threshold() -> Result<()> {
        let config = ChainConfig::default().with_max_chain_length(1);
        let mut map = ChainedHashMap::with_config(config)?;
        map.set(Colliding(0), 'a')?;
        assert_eq!(map.bucket_count(), 10);

        map.set(Colliding(1), 'b')?;
        assert_eq!(map.bucket_count(), 21);
        Ok(())
    }

    #[test]
    fn test_remove_from_every_chain_position() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        for i in 0..3 {
            map.set(Colliding(i), i)?;
        }
        let index = occupied_bucket(&map).ok_or(ChainHashError::KeyNotFound)?;

        // Chain is 2 -> 1 -> 0; drop the middle, then the tail, then the head
        assert!(map.remove(&Colliding(1)));
        assert_eq!(map.bucket(index)?.map(|(key, _)| key.0).collect::<Vec<_>>(), vec![2, 0]);
        assert_eq!(map.bucket_size(index), Ok(2));

        assert!(map.remove(&Colliding(0)));
        assert_eq!(map.bucket(index)?.map(|(key, _)| key.0).collect::<Vec<_>>(), vec![2]);

        assert!(map.remove(&Colliding(2)));
        assert!(map.bucket(index)?.next().is_none());
        assert_eq!(map.bucket_size(index), Ok(0));
        assert_eq!(map.used_buckets(), 0);
        assert!(map.is_empty());
        assert_consistent(&map);
        Ok(())
    }

    #[test]
    fn test_remove_missing_from_occupied_chain() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        map.set(Colliding(0), 0)?;
        map.set(Colliding(1), 1)?;

        assert!(!map.remove(&Colliding(9)));
        assert_eq!(map.size(), 2);
        assert_consistent(&map);
        Ok(())
    }

    #[test]
    fn test_clear() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        for i in 0..50_u32 {
            map.set(i, i)?;
        }
        let capacity = map.bucket_count();

        map.clear();

        assert!(map.is_empty());
        assert_eq!(map.used_buckets(), 0);
        assert_eq!(map.bucket_count(), capacity);
        assert!(!map.contains(&1));
        assert_consistent(&map);

        map.clear();
        map.set(1, 1)?;
        assert_eq!(map.get(&1), Ok(&1));
        Ok(())
    }

    #[test]
    fn test_iter() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        map.set("key1".to_string(), 1)?;
        map.set("key2".to_string(), 2)?;
        map.set("key3".to_string(), 3)?;

        let iter = map.iter();
        assert_eq!(iter.len(), 3);
        assert_eq!(iter.map(|(_, value)| value).sum::<i32>(), 6);

        let mut keys: Vec<&String> = (&map).into_iter().map(|(key, _)| key).collect();
        keys.sort();
        assert_eq!(keys, ["key1", "key2", "key3"]);
        Ok(())
    }

    #[test]
    fn test_into_iter() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        for i in 0..20_u32 {
            map.set(i, i.to_string())?;
        }

        let mut entries: Vec<(u32, String)> = map.into_iter().collect();
        entries.sort();
        assert_eq!(entries.len(), 20);
        assert_eq!(entries.first(), Some(&(0, "0".to_string())));
        assert_eq!(entries.last(), Some(&(19, "19".to_string())));
        Ok(())
    }

    #[test]
    fn test_partially_consumed_into_iter() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        for i in 0..20_u32 {
            map.set(i, vec![i])?;
        }

        let mut iter = map.into_iter();
        assert!(iter.next().is_some());
        assert_eq!(iter.len(), 19);
        Ok(())
    }

    #[test]
    fn test_clone_is_independent() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        for i in 0..3 {
            map.set(Colliding(i), i)?;
        }
        let mut copy = map.clone();
        copy.set(Colliding(0), 100)?;

        assert_eq!(map.get(&Colliding(0)), Ok(&0));
        assert_eq!(copy.get(&Colliding(0)), Ok(&100));
        assert_eq!(copy.bucket_count(), map.bucket_count());

        let index = occupied_bucket(&map).ok_or(ChainHashError::KeyNotFound)?;
        let original: Vec<u32> = map.bucket(index)?.map(|(key, _)| key.0).collect();
        let cloned: Vec<u32> = copy.bucket(index)?.map(|(key, _)| key.0).collect();
        assert_eq!(original, cloned);
        assert_consistent(&copy);
        Ok(())
    }

    #[test]
    fn test_debug_format() -> Result<()> {
        let mut map = ChainedHashMap::new(10)?;
        map.set("a", 1)?;
        assert_eq!(format!("{map:?}"), r#"{"a": 1}"#);
        Ok(())
    }

    /// Operation applied to both the map under test and a std model
    #[derive(Debug, Clone)]
    enum Op {
        Set(u16, i32),
        Remove(u16),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0_u16..200, any::<i32>()).prop_map(|(key, value)| Op::Set(key, value)),
            1 => (0_u16..200).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn prop_behaves_like_std_hashmap(
            capacity in 1_usize..32,
            ops in proptest::collection::vec(op(), 1..300),
        ) {
            let mut map = ChainedHashMap::new(capacity).map_err(|err| TestCaseError::fail(err.to_string()))?;
            let mut model = HashMap::new();

            for action in ops {
                match action {
                    Op::Set(key, value) => {
                        let before = map.bucket_count();
                        let is_new = !model.contains_key(&key);
                        let previous = map.set(key, value).map_err(|err| TestCaseError::fail(err.to_string()))?;
                        prop_assert_eq!(previous, model.insert(key, value));

                        if map.bucket_count() == before {
                            let index = map.bucket_index(&key);
                            prop_assert!(map.bucket_size(index).is_ok_and(|size| size <= MAX_CHAIN_LENGTH || !is_new));
                            prop_assert!(!is_new || map.load_factor() <= MAX_LOAD_FACTOR);
                        } else {
                            prop_assert!(is_new);
                            prop_assert_eq!(map.bucket_count(), before * 2 + 1);
                        }
                    }
                    Op::Remove(key) => {
                        let before = map.bucket_count();
                        prop_assert_eq!(map.remove(&key), model.remove(&key).is_some());
                        prop_assert!(!map.contains(&key));
                        prop_assert_eq!(map.bucket_count(), before);
                    }
                }
                assert_consistent(&map);
                prop_assert_eq!(map.size(), model.len());
            }

            for (key, value) in &model {
                prop_assert_eq!(map.get(key), Ok(value));
            }
            for key in 0_u16..200 {
                prop_assert_eq!(map.contains(&key), model.contains_key(&key));
            }
        }

        #[test]
        fn prop_rehash_preserves_entries(keys in proptest::collection::hash_set(any::<u64>(), 1..500)) {
            let mut map = ChainedHashMap::new(10).map_err(|err| TestCaseError::fail(err.to_string()))?;
            for &key in &keys {
                map.set(key, key.wrapping_mul(31)).map_err(|err| TestCaseError::fail(err.to_string()))?;
            }

            prop_assert_eq!(map.size(), keys.len());
            prop_assert!(is_growth_of(map.bucket_count(), 10));
            for key in &keys {
                let expected = key.wrapping_mul(31);
                prop_assert_eq!(map.get(key), Ok(&expected));
            }
            prop_assert_eq!(map.iter().count(), keys.len());
        }
    }
}
