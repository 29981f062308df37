//! Per-table access discipline.
//!
//! Every table owns one mutex. With locking enabled, entry blocks until
//! the mutex is free. With locking disabled the table promises it is
//! never used concurrently, so entry never waits: a contended entry
//! panics instead of silently serializing.
//!
//! In both modes the table remembers which thread holds it. Entering
//! again from that thread (for example while a `NodeRef` is still
//! alive) panics instead of deadlocking on the non-reentrant mutex.

use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

/// No thread holds the table.
const UNOWNED: u64 = 0;

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Process-unique, non-zero id of the calling thread.
#[inline]
fn thread_token() -> u64 {
    THREAD_TOKEN.with(|token| *token)
}

pub(crate) struct TableLock<T> {
    inner: Mutex<T>,
    // token of the thread holding `inner`, or UNOWNED
    owner: AtomicU64,
    locking: bool,
}

impl<T> TableLock<T> {
    pub fn new(value: T, locking: bool) -> Self {
        Self {
            inner: Mutex::new(value),
            owner: AtomicU64::new(UNOWNED),
            locking,
        }
    }

    pub fn locking(&self) -> bool {
        self.locking
    }

    /// Enter a critical section. Exclusive access lasts until the
    /// returned guard (or anything mapped from it) is dropped.
    ///
    /// Panics if the calling thread already holds this table, or if
    /// locking is disabled and another thread holds it.
    #[inline]
    pub fn enter(&self) -> TableGuard<'_, T> {
        let me = thread_token();
        // Only this thread ever stores `me`, so a relaxed load can not
        // report it spuriously.
        if self.owner.load(Ordering::Relaxed) == me {
            panic!("reentrant access to a table from the thread holding it; drop the NodeRef or BucketView first");
        }

        let guard = if self.locking {
            self.inner.lock()
        } else {
            match self.inner.try_lock() {
                Some(guard) => guard,
                None => panic!("contended access to a table built with locking disabled"),
            }
        };
        self.owner.store(me, Ordering::Relaxed);

        TableGuard {
            _mark: OwnerMark { owner: &self.owner },
            guard,
        }
    }
}

/// Clears the owner token. Declared before the mutex guard in every
/// guard type so the token is cleared while the mutex is still held.
struct OwnerMark<'a> {
    owner: &'a AtomicU64,
}

impl Drop for OwnerMark<'_> {
    fn drop(&mut self) {
        self.owner.store(UNOWNED, Ordering::Relaxed);
    }
}

/// RAII guard returned by `TableLock::enter`.
pub(crate) struct TableGuard<'a, T> {
    _mark: OwnerMark<'a>,
    guard: MutexGuard<'a, T>,
}

impl<'a, T> TableGuard<'a, T> {
    /// Narrow the guard to a part of the protected value, keeping the
    /// table held. On `None` the original guard is handed back.
    pub fn try_map<U: ?Sized, F>(self, f: F) -> Result<MappedTableGuard<'a, U>, Self>
    where
        F: FnOnce(&mut T) -> Option<&mut U>,
    {
        let TableGuard { _mark, guard } = self;
        match MutexGuard::try_map(guard, f) {
            Ok(guard) => Ok(MappedTableGuard { _mark, guard }),
            Err(guard) => Err(TableGuard { _mark, guard }),
        }
    }
}

impl<T> Deref for TableGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for TableGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

/// A `TableGuard` narrowed to part of the protected value.
pub(crate) struct MappedTableGuard<'a, U: ?Sized> {
    _mark: OwnerMark<'a>,
    guard: MappedMutexGuard<'a, U>,
}

impl<U: ?Sized> Deref for MappedTableGuard<'_, U> {
    type Target = U;

    fn deref(&self) -> &U {
        &self.guard
    }
}

impl<U: ?Sized> DerefMut for MappedTableGuard<'_, U> {
    fn deref_mut(&mut self) -> &mut U {
        &mut self.guard
    }
}
