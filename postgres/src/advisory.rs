//! Session-level advisory locks.
//!
//! A session advisory lock belongs to the connection that took it, so each
//! lease keeps its connection checked out and unlocks on that same
//! connection. The locked transaction runs on that connection too (see
//! `BookingStore::begin_on`), so a transition occupies one pool slot. A
//! lease dropped without release detaches its connection from the pool and
//! closes it, which ends the session and frees the lock.

use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};

use freightline_core::{LockBackend, StoreResult};

use crate::error::translate;

/// [`LockBackend`] over `pg_try_advisory_lock` / `pg_advisory_unlock`.
#[derive(Debug, Clone)]
pub struct PgAdvisoryLocks {
    pool: PgPool,
}

impl PgAdvisoryLocks {
    /// Create a backend drawing lock connections from `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// A held advisory lock and the connection that owns it.
#[derive(Debug)]
pub struct PgAdvisoryLease {
    lock_id: i64,
    conn: Option<PoolConnection<Postgres>>,
}

impl PgAdvisoryLease {
    /// The advisory lock id.
    #[must_use]
    pub const fn lock_id(&self) -> i64 {
        self.lock_id
    }

    /// The session holding the lock, until the lease is released.
    pub(crate) fn connection(&mut self) -> Option<&mut PgConnection> {
        self.conn.as_deref_mut()
    }
}

impl Drop for PgAdvisoryLease {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!(
                lock_id = self.lock_id,
                "Advisory lease dropped without release; closing its connection"
            );
            drop(conn.detach());
        }
    }
}

impl LockBackend for PgAdvisoryLocks {
    type Lease = PgAdvisoryLease;

    async fn try_acquire(&self, lock_id: i64) -> StoreResult<Option<PgAdvisoryLease>> {
        let mut conn = self.pool.acquire().await.map_err(translate)?;

        let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .bind(lock_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(translate)?;

        if !acquired {
            return Ok(None);
        }

        tracing::debug!(lock_id, "Advisory lock acquired");
        Ok(Some(PgAdvisoryLease {
            lock_id,
            conn: Some(conn),
        }))
    }

    async fn release(&self, mut lease: PgAdvisoryLease) -> StoreResult<()> {
        let Some(mut conn) = lease.conn.take() else {
            return Ok(());
        };

        let result: Result<(bool,), sqlx::Error> = sqlx::query_as("SELECT pg_advisory_unlock($1)")
            .bind(lease.lock_id)
            .fetch_one(&mut *conn)
            .await;

        match result {
            Ok((true,)) => {
                tracing::debug!(lock_id = lease.lock_id, "Advisory lock released");
                Ok(())
            }
            Ok((false,)) => {
                // Not held by this session; close it rather than reuse it.
                tracing::warn!(lock_id = lease.lock_id, "Advisory lock was not held at release");
                drop(conn.detach());
                Ok(())
            }
            Err(e) => {
                drop(conn.detach());
                Err(translate(e))
            }
        }
    }
}
