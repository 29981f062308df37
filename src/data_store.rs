//! DataStore: the public, lock-wrapped table.

use crate::access::{MappedTableGuard, TableGuard, TableLock};
use crate::buckets::Buckets;
use crate::config::{StoreConfig, DEFAULT_NONZERO_CAPACITY};
use crate::digest::{KeyDigest, Sha256Digest};
use crate::error::Result;
use crate::node::Node;
use core::fmt;
use core::ops::{Deref, DerefMut};

/// A string-keyed hash table with separate chaining.
///
/// Keys are placed by their digest (SHA-256 by default); keys sharing a
/// digest are chained and told apart by comparison. Every operation takes
/// the table lock exactly once, so a `DataStore` can be shared between
/// threads (e.g. behind an `Arc`).
///
/// Operations that return a node hand out a [`NodeRef`], which keeps the
/// table held until it is dropped. Drop it before issuing the next
/// operation on the same table from the same thread; calling back into
/// the table while it is still alive panics rather than deadlocking.
///
/// ```
/// use thread_safe_storage::DataStore;
///
/// let s = DataStore::new();
/// s.insert("k", 1).unwrap();
/// let v = *s.search("k").unwrap().value();
/// s.update("k", v + 1).unwrap();
/// assert_eq!(s.get("k"), Some(2));
/// ```
pub struct DataStore<V, D = Sha256Digest> {
    lock: TableLock<Buckets<V, D>>,
}

impl<V> DataStore<V> {
    /// Table with capacity 10 and locking enabled.
    pub fn new() -> Self {
        Self {
            lock: TableLock::new(Buckets::new(DEFAULT_NONZERO_CAPACITY, Sha256Digest), true),
        }
    }

    /// Table with the given initial capacity and locking enabled.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        StoreConfig::new().capacity(capacity).build()
    }
}

impl<V> Default for DataStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, D> DataStore<V, D>
where
    D: KeyDigest,
{
    pub(crate) fn from_config(config: StoreConfig, digest: D) -> Result<Self> {
        let capacity = config.validated_capacity()?;
        Ok(Self {
            lock: TableLock::new(Buckets::new(capacity, digest), config.is_locking()),
        })
    }

    /// Current load threshold.
    pub fn capacity(&self) -> usize {
        self.lock.enter().capacity()
    }

    /// Number of populated buckets (not entries; see [`DataStore::len`]).
    pub fn size(&self) -> usize {
        self.lock.enter().size()
    }

    /// Number of stored entries across all chains.
    pub fn len(&self) -> usize {
        self.lock.enter().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether operations take the table lock.
    pub fn is_locking(&self) -> bool {
        self.lock.locking()
    }

    /// The digest naming `key`'s bucket.
    pub fn digest_of(&self, key: &str) -> String {
        self.lock.enter().digest_of(key)
    }

    /// True iff a bucket exists for `key`'s digest.
    ///
    /// This tests the bucket, not the key: with a colliding digest it is
    /// also true for keys that were never inserted. Use [`DataStore::search`]
    /// to test for the key itself.
    pub fn contains(&self, key: &str) -> bool {
        self.lock.enter().contains(key)
    }

    /// Insert a new key.
    ///
    /// Grows the table first when the number of populated buckets has
    /// reached capacity, normally by one `ceil(capacity * 1.5)` step.
    /// After a [`DataStore::resize`] below the populated bucket count,
    /// growth takes as many steps as needed to exceed that count, in a
    /// single rehash. Fails with `DuplicateKey` if the key is already
    /// stored (checked before any growth); use [`DataStore::update`] to
    /// change its value.
    pub fn insert(&self, key: impl Into<String>, value: V) -> Result<NodeRef<'_, V>> {
        let key = key.into();
        self.map_node(move |buckets| buckets.insert(key, value))
    }

    /// Overwrite the value stored under an existing key.
    pub fn update(&self, key: &str, value: V) -> Result<NodeRef<'_, V>> {
        self.map_node(move |buckets| buckets.update(key, value))
    }

    /// Remove a key.
    ///
    /// The removed node is dropped after the lock is released, so a
    /// value's destructor may use the table again.
    pub fn delete(&self, key: &str) -> Result<()> {
        let removed = self.lock.enter().remove(key)?;
        drop(removed);
        Ok(())
    }

    /// Find the node stored under `key`.
    pub fn search(&self, key: &str) -> Option<NodeRef<'_, V>> {
        self.lock
            .enter()
            .try_map(|buckets| buckets.find_mut(key))
            .ok()
            .map(|guard| NodeRef { guard })
    }

    /// Clone of the value stored under `key`, taken under the lock.
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        self.lock.enter().find(key).map(|node| node.value().clone())
    }

    /// Set a new capacity and rehash every entry. Fails with
    /// `InvalidCapacity` for 0 and leaves the table unchanged.
    pub fn resize(&self, new_capacity: usize) -> Result<()> {
        self.lock.enter().resize(new_capacity)
    }

    /// Lock the table and expose its bucket heads.
    ///
    /// The lock is held for as long as the returned view lives, so the
    /// iteration sees one consistent state.
    pub fn iterate(&self) -> BucketView<'_, V, D> {
        BucketView {
            guard: self.lock.enter(),
        }
    }

    fn map_node<'a, F>(&'a self, f: F) -> Result<NodeRef<'a, V>>
    where
        F: FnOnce(&mut Buckets<V, D>) -> Result<&mut Node<V>>,
    {
        let mut failure = None;
        let mapped = self.lock.enter().try_map(|buckets| match f(buckets) {
            Ok(node) => Some(node),
            Err(err) => {
                failure = Some(err);
                None
            }
        });
        match mapped {
            Ok(guard) => Ok(NodeRef { guard }),
            Err(guard) => {
                drop(guard);
                Err(failure.expect("failed node operations record their error"))
            }
        }
    }
}

impl<V: fmt::Debug, D: KeyDigest> fmt::Debug for DataStore<V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let view = self.iterate();
        let mut map = f.debug_map();
        map.entries(view.iter());
        map.finish()
    }
}

/// A node borrowed from a held table. The table is released on drop.
pub struct NodeRef<'a, V> {
    guard: MappedTableGuard<'a, Node<V>>,
}

impl<V> Deref for NodeRef<'_, V> {
    type Target = Node<V>;

    fn deref(&self) -> &Node<V> {
        &self.guard
    }
}

impl<V> DerefMut for NodeRef<'_, V> {
    fn deref_mut(&mut self) -> &mut Node<V> {
        &mut self.guard
    }
}

impl<V: fmt::Debug> fmt::Debug for NodeRef<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

/// Locked view of a table's bucket heads, returned by [`DataStore::iterate`].
pub struct BucketView<'a, V, D = Sha256Digest> {
    guard: TableGuard<'a, Buckets<V, D>>,
}

impl<'a, V, D: KeyDigest> BucketView<'a, V, D> {
    /// `(digest, head node)` for every populated bucket, in no
    /// particular order. Chained nodes are reached through
    /// [`Node::next`] or [`Node::chain`].
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            it: self.guard.iter(),
        }
    }

    /// Number of populated buckets.
    pub fn len(&self) -> usize {
        self.guard.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'b, 'a, V, D: KeyDigest> IntoIterator for &'b BucketView<'a, V, D> {
    type Item = (&'b str, &'b Node<V>);
    type IntoIter = Iter<'b, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over bucket heads.
pub struct Iter<'a, V> {
    it: hashbrown::hash_map::Iter<'a, String, Box<Node<V>>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a Node<V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it
            .next()
            .map(|(digest, head)| (digest.as_str(), &**head))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}
