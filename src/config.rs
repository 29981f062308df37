//! Table construction options.

use crate::data_store::DataStore;
use crate::digest::{KeyDigest, Sha256Digest};
use crate::error::{Result, StoreError};
use core::num::NonZeroUsize;

/// Initial capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 10;

pub(crate) const DEFAULT_NONZERO_CAPACITY: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CAPACITY) {
    Some(capacity) => capacity,
    None => panic!("default capacity must be non-zero"),
};

/// Builder for [`DataStore`].
///
/// ```
/// use thread_safe_storage::StoreConfig;
///
/// let store = StoreConfig::new()
///     .capacity(64)
///     .locking(false)
///     .build::<u32>()
///     .unwrap();
/// assert_eq!(store.capacity(), 64);
/// assert!(!store.is_locking());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    capacity: usize,
    locking: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreConfig {
    /// Capacity 10, locking enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            locking: true,
        }
    }

    /// Initial capacity (load threshold); must be > 0.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Whether every operation takes the table lock (default `true`).
    ///
    /// A table built with `locking(false)` must not be shared across
    /// threads. It never waits for another thread: any overlap between
    /// two threads' operations panics with "contended access to a table
    /// built with locking disabled". Keep such a table on one thread, or
    /// leave locking on for anything behind an `Arc`.
    ///
    /// In both modes, using the table again from a thread that still
    /// holds a `NodeRef` or `BucketView` of it panics.
    #[must_use]
    pub fn locking(mut self, locking: bool) -> Self {
        self.locking = locking;
        self
    }

    pub(crate) fn validated_capacity(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.capacity).ok_or(StoreError::InvalidCapacity(self.capacity))
    }

    pub(crate) fn is_locking(&self) -> bool {
        self.locking
    }

    /// Build a table using SHA-256 bucket digests.
    pub fn build<V>(self) -> Result<DataStore<V>> {
        self.build_with_digest(Sha256Digest)
    }

    /// Build a table using a custom digest.
    pub fn build_with_digest<V, D: KeyDigest>(self, digest: D) -> Result<DataStore<V, D>> {
        DataStore::from_config(self, digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = StoreConfig::default();
        assert_eq!(c, StoreConfig::new());
        assert_eq!(c.validated_capacity().unwrap().get(), DEFAULT_CAPACITY);
        assert!(c.is_locking());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let c = StoreConfig::new().capacity(0);
        assert_eq!(c.validated_capacity(), Err(StoreError::InvalidCapacity(0)));
        assert!(matches!(
            c.build::<i32>(),
            Err(StoreError::InvalidCapacity(0))
        ));
    }
}
