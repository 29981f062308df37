//! thread-safe-storage: a string-keyed hash table with separate
//! chaining, automatic growth and an optional per-table lock.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the structural code free of locking concerns and keep
//!   locking free of structural concerns, so each can be reasoned about
//!   on its own.
//! - Layers:
//!   - Node<V>: one key/value pair plus an owning link to the next node
//!     in the same bucket.
//!   - Buckets<V, D>: digest -> chain head map with capacity tracking,
//!     growth and rehashing. Assumes exclusive access; never locks.
//!   - DataStore<V, D>: public API. Wraps Buckets in a per-table lock
//!     and enters it exactly once per operation.
//!
//! Placement
//! - A key's bucket is named by its full digest (SHA-256 hex by
//!   default), not by a digest reduced modulo capacity. Distinct keys
//!   therefore share a bucket only when their digests collide; chains
//!   still compare keys so a collision is never mistaken for identity.
//!   The `KeyDigest` parameter allows other digests, including
//!   deliberately colliding ones.
//! - `size` counts populated buckets and `len` counts entries. They only
//!   differ when digests collide.
//! - `contains` tests for a bucket, not for the key inside it.
//!
//! Growth
//! - Before placing a new key, if `size >= capacity`, capacity grows by
//!   `ceil(capacity * 1.5)` steps until it exceeds `size`, then the table
//!   is rehashed once.
//! - Rehashing moves nodes through an unchecked placement primitive:
//!   no duplicate check, no load check, no lock. Growth can not recurse.
//! - An explicit `resize` may shrink below the populated bucket count;
//!   the next insert then grows again.
//!
//! Locking
//! - Locking is a per-table construction option (`StoreConfig::locking`).
//! - Enabled: operations block on a `parking_lot::Mutex`.
//! - Disabled: operations never wait; contended entry panics. This is the
//!   single-user contract made checkable.
//! - Returned `NodeRef`s and `BucketView`s keep the table held until they
//!   are dropped. The lock records its holding thread; reentry from that
//!   thread panics in both modes instead of deadlocking.
//! - Removed nodes are dropped after the lock is released, so value
//!   destructors may reenter the table.
//!
//! Failure
//! - Every error is detected before mutation; a failed call leaves the
//!   table exactly as it was.
//!
//! Notes and non-goals
//! - Keys are `String`s only. No persistence. Iteration order is
//!   unspecified.

mod access;
mod buckets;
pub mod config;
mod data_store;
mod data_store_proptest;
pub mod digest;
mod error;
pub mod node;

// Public surface
pub use config::{StoreConfig, DEFAULT_CAPACITY};
pub use data_store::{BucketView, DataStore, Iter, NodeRef};
pub use digest::{KeyDigest, Sha256Digest};
pub use error::{Result, StoreError};
pub use node::{Chain, Node};
