//! # Freightline Testing
//!
//! Test doubles for the Freightline store, lock and cache seams.
//!
//! This crate provides:
//! - [`InMemoryStore`]: booking store and flight catalog with real transaction
//!   semantics (writes vanish unless committed) and fault injection
//! - [`InMemoryLocks`]: lock backend whose leases free on drop
//! - [`InMemoryCache`]: cache backend with an outage switch
//! - [`CountingCatalog`]: catalog wrapper that counts queries
//! - [`FixedClock`] and [`fixtures`] for deterministic data
//!
//! ## Example
//!
//! ```
//! use freightline_testing::{InMemoryStore, fixtures};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryStore::new();
//! let network = fixtures::seed_network(&store).await;
//! assert_eq!(network.first_leg.destination, network.second_leg.origin);
//! # });
//! ```

pub mod cache;
pub mod catalog;
pub mod fixtures;
pub mod locks;
pub mod store;

use chrono::{DateTime, Utc};
use freightline_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use freightline_testing::mocks::FixedClock;
    /// use freightline_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Default fixed clock for tests: 2026-05-30 06:00:00 UTC, two days
    /// before the seeded network operates.
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2026-05-30T06:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

pub use cache::InMemoryCache;
pub use catalog::CountingCatalog;
pub use locks::{InMemoryLease, InMemoryLocks};
pub use mocks::{FixedClock, test_clock};
pub use store::{InMemoryStore, InMemoryTx};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().date_naive().to_string(), "2026-05-30");
    }
}
