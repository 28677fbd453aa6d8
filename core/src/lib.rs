//! # Freightline Core
//!
//! Domain model and pure logic for the air-cargo booking lifecycle.
//!
//! This crate owns everything that does not need a database or a network
//! connection. Storage, locking and caching are reached through traits so the
//! same logic runs against PostgreSQL/Redis in production and in-memory fakes
//! in tests.
//!
//! ## Modules
//!
//! - [`types`]: bookings, flights, routes, events and their identifiers
//! - [`state_machine`]: status transitions and their guards
//! - [`lock`]: resource-keyed distributed locks
//! - [`metrics`]: metric names
//! - [`routes`]: route search and flight-route validation
//! - [`cache`]: read-through cache for route search results
//! - [`store`]: persistence traits
//! - [`error`]: error taxonomy
//!
//! ## Booking lifecycle
//!
//! ```text
//! BOOKED -> DEPARTED -> ARRIVED -> DELIVERED
//!    \________\______________________-> CANCELLED
//! ```
//!
//! Every accepted transition appends exactly one audit [`Event`].

pub mod cache;
pub mod error;
pub mod lock;
pub mod metrics;
pub mod routes;
pub mod state_machine;
pub mod store;
pub mod types;

pub use error::{BookingError, CacheError, ErrorKind, Result, StoreError, StoreResult};
pub use lock::{DistributedLockManager, LockBackend};
pub use routes::{RouteQuery, RouteResolver, RouteSearchResult, TransitRoute};
pub use state_machine::{BookingTransition, TransitionPlan};
pub use store::{BookingStore, BookingTx, FlightCatalog};
pub use types::*;

/// Environment traits - dependencies injected into the engine.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability.
    ///
    /// # Examples
    ///
    /// ```
    /// use freightline_core::environment::{Clock, SystemClock};
    ///
    /// let before = chrono::Utc::now();
    /// assert!(SystemClock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time.
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
