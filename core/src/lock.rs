//! Distributed mutual exclusion keyed by resource name.
//!
//! Resource keys are hashed into a 64-bit lock id and handed to a
//! [`LockBackend`] (PostgreSQL advisory locks in production). Acquisition is
//! non-blocking: a busy lock fails fast with a `Conflict` that callers may
//! retry.
//!
//! Unrelated keys can hash to the same id. That only causes false
//! contention; the locked operation re-validates state after acquiring.

use std::future::Future;

use crate::error::{BookingError, Result, StoreResult};
use crate::metrics::LOCK_CONTENDED;
use crate::types::RefId;

/// Hash a resource key into a non-negative lock id.
///
/// 32-bit rolling hash (`h = h * 31 + c`, wrapping) over the UTF-16 code
/// units of `key`, widened to 64 bits and made non-negative. Stable across
/// processes so every instance derives the same id for the same key.
///
/// # Examples
///
/// ```
/// use freightline_core::lock::key_to_lock_id;
///
/// assert_eq!(key_to_lock_id("a"), 97);
/// assert_eq!(key_to_lock_id("booking:DEL_DXB_ABC123"), 1_244_131_318);
/// ```
#[must_use]
pub fn key_to_lock_id(key: &str) -> i64 {
    let hash = key.encode_utf16().fold(0i32, |h, unit| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(unit))
    });
    i64::from(hash).abs()
}

/// Lock key guarding mutations of one booking.
#[must_use]
pub fn booking_lock_key(ref_id: &RefId) -> String {
    format!("booking:{ref_id}")
}

/// Store primitive providing exclusive, non-blocking locks by id.
///
/// A lease represents a held lock. Dropping a lease without passing it to
/// [`LockBackend::release`] must still free the lock eventually.
pub trait LockBackend: Send + Sync {
    /// Proof of a held lock.
    type Lease: Send;

    /// Try to take the lock without waiting.
    ///
    /// Returns `Ok(None)` when another holder has it.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the backend cannot be reached.
    fn try_acquire(
        &self,
        lock_id: i64,
    ) -> impl Future<Output = StoreResult<Option<Self::Lease>>> + Send;

    /// Release a held lock.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the backend rejects the release.
    fn release(&self, lease: Self::Lease) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Key-based lock manager over a [`LockBackend`].
#[derive(Debug, Clone)]
pub struct DistributedLockManager<B> {
    backend: B,
}

impl<B: LockBackend> DistributedLockManager<B> {
    /// Create a lock manager.
    #[must_use]
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Try to take the lock for `key`.
    ///
    /// Backend failures are logged and reported as not acquired.
    pub async fn try_acquire(&self, key: &str) -> Option<B::Lease> {
        let lock_id = key_to_lock_id(key);
        match self.backend.try_acquire(lock_id).await {
            Ok(Some(lease)) => {
                tracing::debug!(key, lock_id, "Lock acquired");
                Some(lease)
            }
            Ok(None) => {
                tracing::debug!(key, lock_id, "Lock busy");
                None
            }
            Err(error) => {
                tracing::error!(key, lock_id, error = %error, "Failed to acquire lock");
                None
            }
        }
    }

    /// Release a lease. Failures are logged and swallowed.
    pub async fn release(&self, key: &str, lease: B::Lease) {
        match self.backend.release(lease).await {
            Ok(()) => tracing::debug!(key, "Lock released"),
            Err(error) => tracing::error!(key, error = %error, "Failed to release lock"),
        }
    }

    /// Run `f` while holding the lock for `key`.
    ///
    /// The lock is released on every exit path of `f`, including errors.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Conflict`] naming `key` if the lock is held
    /// elsewhere, otherwise whatever `f` returns.
    pub async fn with_lock<T, F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.with_lease(key, |lease| async move { (lease, f().await) }).await
    }

    /// Run `f` with the lease for `key` in hand.
    ///
    /// `f` may work through the lease (for example on the connection that
    /// holds the lock) and hands it back for release.
    ///
    /// # Errors
    ///
    /// Same as [`DistributedLockManager::with_lock`].
    pub async fn with_lease<T, F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(B::Lease) -> Fut,
        Fut: Future<Output = (B::Lease, Result<T>)>,
    {
        let Some(lease) = self.try_acquire(key).await else {
            metrics::counter!(LOCK_CONTENDED).increment(1);
            tracing::warn!(key, "Resource busy");
            return Err(BookingError::resource_busy(key));
        };

        let (lease, result) = f(lease).await;
        self.release(key, lease).await;
        result
    }
}
