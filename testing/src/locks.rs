//! In-memory lock backend.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use freightline_core::{LockBackend, StoreError, StoreResult};

#[derive(Debug, Default)]
struct LockTable {
    held: Mutex<HashSet<i64>>,
    broken: AtomicBool,
}

impl LockTable {
    fn held(&self) -> std::sync::MutexGuard<'_, HashSet<i64>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-local [`LockBackend`]. Leases free their lock when dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocks {
    table: Arc<LockTable>,
}

/// A held in-memory lock.
#[derive(Debug)]
pub struct InMemoryLease {
    lock_id: i64,
    table: Arc<LockTable>,
}

impl Drop for InMemoryLease {
    fn drop(&mut self) {
        self.table.held().remove(&self.lock_id);
    }
}

impl InMemoryLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `lock_id` is currently held.
    #[must_use]
    pub fn is_held(&self, lock_id: i64) -> bool {
        self.table.held().contains(&lock_id)
    }

    /// Number of locks currently held.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.table.held().len()
    }

    /// Make every acquisition fail as if the backend were unreachable.
    pub fn set_broken(&self, broken: bool) {
        self.table.broken.store(broken, Ordering::SeqCst);
    }
}

impl LockBackend for InMemoryLocks {
    type Lease = InMemoryLease;

    async fn try_acquire(&self, lock_id: i64) -> StoreResult<Option<InMemoryLease>> {
        if self.table.broken.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("lock backend unreachable".to_string()));
        }
        if !self.table.held().insert(lock_id) {
            return Ok(None);
        }
        Ok(Some(InMemoryLease {
            lock_id,
            table: Arc::clone(&self.table),
        }))
    }

    async fn release(&self, lease: InMemoryLease) -> StoreResult<()> {
        drop(lease);
        Ok(())
    }
}
