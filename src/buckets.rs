//! Buckets: the unsynchronized core of the table.
//!
//! Every method here assumes the caller already has exclusive access
//! (`&mut self` behind the table lock). Resizing rehashes through
//! `place`, which never checks the load threshold, so growth can not
//! recurse and never needs to take the lock a second time.

use crate::digest::KeyDigest;
use crate::error::{Result, StoreError};
use crate::node::Node;
use core::num::NonZeroUsize;
use hashbrown::hash_map::{Entry, HashMap};

pub(crate) type BucketMap<V> = HashMap<String, Box<Node<V>>>;

pub(crate) struct Buckets<V, D> {
    // digest -> head of that bucket's chain; empty chains are pruned
    table: BucketMap<V>,
    capacity: usize,
    entries: usize,
    digest: D,
}

/// `ceil(capacity * 1.5)`, saturating.
#[inline]
pub(crate) fn growth_step(capacity: usize) -> usize {
    capacity.saturating_add(capacity.div_ceil(2))
}

/// Smallest capacity reached by repeated growth steps from `capacity`
/// that leaves room for one more bucket beyond `populated`.
fn grown_capacity(capacity: usize, populated: usize) -> usize {
    let mut target = capacity;
    while target <= populated && target < usize::MAX {
        target = growth_step(target);
    }
    target
}

impl<V, D> Buckets<V, D>
where
    D: KeyDigest,
{
    pub fn new(capacity: NonZeroUsize, digest: D) -> Self {
        Self {
            table: HashMap::new(),
            capacity: capacity.get(),
            entries: 0,
            digest,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of populated buckets.
    pub fn size(&self) -> usize {
        self.table.len()
    }

    /// Number of chained entries across all buckets.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn digest_of(&self, key: &str) -> String {
        self.digest.digest(key)
    }

    /// True iff a bucket exists for the key's digest.
    ///
    /// This is a bucket test, not a key test: under a colliding digest it
    /// is also true for keys that were never inserted.
    pub fn contains(&self, key: &str) -> bool {
        self.table.contains_key(&self.digest.digest(key))
    }

    pub fn find(&self, key: &str) -> Option<&Node<V>> {
        let digest = self.digest.digest(key);
        self.table
            .get(&digest)?
            .chain()
            .find(|node| node.key() == key)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut Node<V>> {
        let digest = self.digest.digest(key);
        let mut cur = self.table.get_mut(&digest).map(|head| &mut **head);
        while let Some(node) = cur {
            if node.key() == key {
                return Some(node);
            }
            cur = node.next.as_deref_mut();
        }
        None
    }

    /// Insert a new key, growing first when the load threshold is reached.
    ///
    /// The duplicate check runs before growth so a rejected insert leaves
    /// capacity untouched. On success the new node heads its bucket.
    pub fn insert(&mut self, key: String, value: V) -> Result<&mut Node<V>> {
        let digest = self.digest.digest(&key);
        if let Some(head) = self.table.get(&digest) {
            if head.chain().any(|node| node.key() == key) {
                log::trace!("insert rejected: duplicate key {key:?}");
                return Err(StoreError::DuplicateKey(key));
            }
        }

        if self.table.len() >= self.capacity {
            let target = grown_capacity(self.capacity, self.table.len());
            self.resize(target)?;
        }

        Ok(self.place(digest, Box::new(Node::new(key, value))))
    }

    /// Overwrite the value of an existing key.
    pub fn update(&mut self, key: &str, value: V) -> Result<&mut Node<V>> {
        match self.find_mut(key) {
            Some(node) => {
                let _old = node.replace_value(value);
                Ok(node)
            }
            None => {
                log::trace!("update rejected: key {key:?} not found");
                Err(StoreError::KeyNotFound(key.to_owned()))
            }
        }
    }

    /// Unlink a key and hand the detached node back to the caller.
    ///
    /// A bucket whose last node is removed is pruned, so `contains` and
    /// `size` stop reporting it.
    pub fn remove(&mut self, key: &str) -> Result<Box<Node<V>>> {
        let digest = self.digest.digest(key);
        let removed = match self.table.entry(digest) {
            Entry::Vacant(_) => None,
            Entry::Occupied(mut slot) => {
                if slot.get().key() == key {
                    match slot.get_mut().next.take() {
                        Some(next) => Some(core::mem::replace(slot.get_mut(), next)),
                        None => Some(slot.remove()),
                    }
                } else {
                    slot.get_mut().unlink_successor(key)
                }
            }
        };

        match removed {
            Some(node) => {
                self.entries -= 1;
                log::trace!("removed key {key:?}");
                Ok(node)
            }
            None => {
                log::trace!("remove rejected: key {key:?} not found");
                Err(StoreError::KeyNotFound(key.to_owned()))
            }
        }
    }

    /// Set a new capacity and rehash every node into a fresh bucket map.
    ///
    /// Nodes are moved, not reallocated. Rehashing goes through `place`,
    /// which skips the load check, so shrinking below the populated
    /// bucket count is allowed and simply grows again on the next insert.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity == 0 {
            return Err(StoreError::InvalidCapacity(new_capacity));
        }

        let populated = self.table.len();
        if new_capacity < populated {
            log::warn!(
                "resizing to capacity {new_capacity} below {populated} populated buckets"
            );
        }
        log::debug!(
            "resizing table: capacity {} -> {new_capacity}, {} entries in {populated} buckets",
            self.capacity,
            self.entries,
        );

        let old = core::mem::replace(&mut self.table, HashMap::with_capacity(populated));
        self.capacity = new_capacity;
        self.entries = 0;

        for (_, head) in old {
            let mut cur = Some(head);
            while let Some(mut node) = cur {
                cur = node.next.take();
                let digest = self.digest.digest(node.key());
                self.place(digest, node);
            }
        }
        Ok(())
    }

    /// Put a detached node at the front of the bucket named by `digest`.
    ///
    /// No duplicate or load checks; callers establish both.
    fn place(&mut self, digest: String, mut node: Box<Node<V>>) -> &mut Node<V> {
        debug_assert!(node.next.is_none());
        self.entries += 1;
        match self.table.entry(digest) {
            Entry::Occupied(slot) => {
                let head = slot.into_mut();
                core::mem::swap(head, &mut node);
                head.next = Some(node);
                &mut **head
            }
            Entry::Vacant(slot) => &mut **slot.insert(node),
        }
    }

    pub fn iter(&self) -> hashbrown::hash_map::Iter<'_, String, Box<Node<V>>> {
        self.table.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::digest::Sha256Digest;

    /// Puts every key in one bucket so chaining is exercised.
    #[derive(Copy, Clone, Debug, Default)]
    pub(crate) struct ConstDigest;

    impl KeyDigest for ConstDigest {
        fn digest(&self, _key: &str) -> String {
            "0".repeat(64)
        }
    }

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn chain_keys<V, D: KeyDigest>(b: &Buckets<V, D>, key: &str) -> Vec<String> {
        let digest = b.digest_of(key);
        b.table
            .get(&digest)
            .map(|head| head.chain().map(|n| n.key().to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn growth_step_rounds_up() {
        assert_eq!(growth_step(1), 2);
        assert_eq!(growth_step(2), 3);
        assert_eq!(growth_step(3), 5);
        assert_eq!(growth_step(10), 15);
        assert_eq!(growth_step(usize::MAX), usize::MAX);
    }

    #[test]
    fn grown_capacity_exceeds_populated() {
        assert_eq!(grown_capacity(2, 2), 3);
        assert_eq!(grown_capacity(2, 4), 5);
        assert_eq!(grown_capacity(1, 10), 12);
    }

    #[test]
    fn insert_grows_once_threshold_is_reached() {
        let mut b: Buckets<i32, _> = Buckets::new(cap(2), Sha256Digest);
        b.insert("a".into(), 1).unwrap();
        b.insert("b".into(), 2).unwrap();
        assert_eq!(b.capacity(), 2, "threshold checked before placement");
        b.insert("c".into(), 3).unwrap();
        assert_eq!(b.capacity(), 3);
        assert_eq!(b.size(), 3);
        for (k, v) in [("a", 1), ("b", 2), ("c", 3)] {
            assert_eq!(b.find(k).map(|n| *n.value()), Some(v));
        }
    }

    #[test]
    fn shrink_below_population_then_insert_regrows_once() {
        let mut b: Buckets<i32, _> = Buckets::new(cap(10), Sha256Digest);
        for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
            b.insert((*k).into(), i as i32).unwrap();
        }
        b.resize(2).unwrap();
        assert_eq!(b.capacity(), 2);
        assert_eq!(b.size(), 4);

        b.insert("e".into(), 4).unwrap();
        // 2 -> 3 -> 5 -> 8, first step above 4 populated buckets
        assert_eq!(b.capacity(), 5);
        assert_eq!(b.len(), 5);
    }

    #[test]
    fn colliding_keys_chain_most_recent_first() {
        let mut b: Buckets<i32, _> = Buckets::new(cap(10), ConstDigest);
        b.insert("a".into(), 1).unwrap();
        b.insert("b".into(), 2).unwrap();
        b.insert("c".into(), 3).unwrap();
        assert_eq!(b.size(), 1);
        assert_eq!(b.len(), 3);
        assert_eq!(chain_keys(&b, "a"), ["c", "b", "a"]);

        match b.insert("b".into(), 20) {
            Err(StoreError::DuplicateKey(k)) => assert_eq!(k, "b"),
            other => panic!("unexpected result: {:?}", other.map(|n| n.key().to_string())),
        }
        assert_eq!(b.find("b").map(|n| *n.value()), Some(2));
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn contains_is_a_bucket_test_under_collisions() {
        let mut b: Buckets<i32, _> = Buckets::new(cap(10), ConstDigest);
        assert!(!b.contains("a"));
        b.insert("a".into(), 1).unwrap();
        assert!(b.contains("a"));
        assert!(b.contains("never-inserted"));
        assert!(b.find("never-inserted").is_none());
    }

    #[test]
    fn update_walks_the_chain() {
        let mut b: Buckets<i32, _> = Buckets::new(cap(10), ConstDigest);
        b.insert("a".into(), 1).unwrap();
        b.insert("b".into(), 2).unwrap();
        assert_eq!(*b.update("a", 10).unwrap().value(), 10);
        assert_eq!(b.find("b").map(|n| *n.value()), Some(2));
        assert_eq!(
            b.update("zz", 0).map(|n| *n.value()),
            Err(StoreError::KeyNotFound("zz".into()))
        );
    }

    #[test]
    fn remove_head_middle_and_last() {
        let mut b: Buckets<i32, _> = Buckets::new(cap(10), ConstDigest);
        for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
            b.insert((*k).into(), i as i32).unwrap();
        }
        // chain: d c b a
        assert_eq!(b.remove("b").unwrap().key(), "b");
        assert_eq!(chain_keys(&b, "a"), ["d", "c", "a"]);
        assert_eq!(b.remove("d").unwrap().key(), "d");
        assert_eq!(chain_keys(&b, "a"), ["c", "a"]);
        assert_eq!(b.remove("a").unwrap().key(), "a");
        assert_eq!(chain_keys(&b, "c"), ["c"]);
        assert_eq!(b.size(), 1);
        assert_eq!(b.len(), 1);

        assert_eq!(
            b.remove("a").map(|n| n.key().to_string()),
            Err(StoreError::KeyNotFound("a".into()))
        );
        assert_eq!(chain_keys(&b, "c"), ["c"], "failed remove must not relink");

        b.remove("c").unwrap();
        assert_eq!(b.size(), 0, "empty bucket is pruned");
        assert!(!b.contains("c"));
    }

    #[test]
    fn resize_rejects_zero_and_keeps_contents() {
        let mut b: Buckets<i32, _> = Buckets::new(cap(4), Sha256Digest);
        b.insert("a".into(), 1).unwrap();
        assert_eq!(b.resize(0), Err(StoreError::InvalidCapacity(0)));
        assert_eq!(b.capacity(), 4);
        assert_eq!(b.find("a").map(|n| *n.value()), Some(1));
    }

    #[test]
    fn resize_rehashes_every_chained_node() {
        let mut b: Buckets<String, _> = Buckets::new(cap(3), ConstDigest);
        for k in ["a", "b", "c", "d", "e"] {
            b.insert(k.into(), k.to_uppercase()).unwrap();
        }
        b.resize(50).unwrap();
        assert_eq!(b.capacity(), 50);
        assert_eq!(b.len(), 5);
        assert_eq!(b.size(), 1);
        for k in ["a", "b", "c", "d", "e"] {
            assert_eq!(b.find(k).map(|n| n.value().clone()), Some(k.to_uppercase()));
        }
    }
}
