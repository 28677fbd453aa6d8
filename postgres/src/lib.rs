//! `PostgreSQL` backends for Freightline.
//!
//! This crate provides the production implementations of the persistence
//! seams defined in `freightline-core`:
//!
//! - [`PostgresStore`]: flight catalog and booking store over a `PgPool`
//! - [`PgAdvisoryLocks`]: lock backend over session-level advisory locks
//! - [`MIGRATOR`]: the embedded schema migrations
//!
//! Driver failures are translated from SQLSTATE codes into
//! [`StoreError`] variants before they leave this crate.
//!
//! # Example
//!
//! ```no_run
//! use freightline_postgres::{PoolSettings, PostgresStore};
//!
//! # async fn example() -> Result<(), freightline_core::StoreError> {
//! let store = PostgresStore::connect(
//!     "postgres://localhost/freightline",
//!     &PoolSettings::default(),
//! )
//! .await?;
//! store.migrate().await?;
//! let locks = store.advisory_locks();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod advisory;
mod bookings;
mod error;
mod flights;

use std::str::FromStr;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use freightline_core::{StoreError, StoreResult};

pub use advisory::{PgAdvisoryLease, PgAdvisoryLocks};
pub use bookings::PgBookingTx;

/// Schema migrations embedded from `postgres/migrations`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connection pool sizing and timeouts.
///
/// A transition holds one connection: its transaction runs on the connection
/// that took the advisory lock. `max_connections` therefore bounds concurrent
/// transitions and other queries together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long to wait for a connection from the pool.
    pub connect_timeout: Duration,
    /// Server-side limit on every statement.
    pub statement_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            statement_timeout: Duration::from_secs(30),
        }
    }
}

/// `PostgreSQL` implementation of `FlightCatalog` and `BookingStore`.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Open a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the server cannot be reached, or
    /// [`StoreError::Database`] if the URL is malformed.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> StoreResult<Self> {
        let statement_timeout = format!("{}ms", settings.statement_timeout.as_millis());
        let options = PgConnectOptions::from_str(database_url)
            .map_err(error::translate)?
            .options([("statement_timeout", statement_timeout.as_str())]);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect_with(options)
            .await
            .map_err(error::translate)?;

        tracing::info!(
            max_connections = settings.max_connections,
            statement_timeout_ms = settings.statement_timeout.as_millis(),
            "Connected to PostgreSQL"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Advisory lock backend sharing this store's pool.
    #[must_use]
    pub fn advisory_locks(&self) -> PgAdvisoryLocks {
        PgAdvisoryLocks::new(self.pool.clone())
    }

    /// Apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Close every pooled connection and wait for them to finish.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }
}
