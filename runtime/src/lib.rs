//! # Freightline Runtime
//!
//! Services that compose the core logic with a store, a lock backend and a
//! cache backend.
//!
//! ## Core Components
//!
//! - **[`BookingEngine`]**: create, transition, cancel, history and listing
//! - **[`RouteSearchService`]**: cached route search
//! - **[`retry`]**: opt-in backoff for callers that prefer to wait on a busy lock
//! - **[`metrics`]**: metric names and the Prometheus exporter
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use freightline_core::{BookingTransition, NewBooking};
//! use freightline_runtime::BookingEngine;
//! use freightline_testing::{InMemoryLocks, InMemoryStore, fixtures, test_clock};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryStore::new();
//! let network = fixtures::seed_network(&store).await;
//! let engine = BookingEngine::new(store, InMemoryLocks::new(), Arc::new(test_clock()));
//!
//! let created = engine
//!     .create(
//!         NewBooking {
//!             origin: fixtures::airport("DEL"),
//!             destination: fixtures::airport("DXB"),
//!             flight_instance_ids: vec![network.direct.id],
//!             pieces: 2,
//!             weight_kg: 80,
//!         },
//!         None,
//!     )
//!     .await
//!     .unwrap();
//!
//! let departed = engine
//!     .transition(&created.booking.ref_id, BookingTransition::Depart, None, None)
//!     .await
//!     .unwrap();
//! assert_eq!(departed.booking.status.as_str(), "DEPARTED");
//! # });
//! ```

pub mod booking;
pub mod metrics;
pub mod retry;
pub mod search;

pub use booking::BookingEngine;
pub use search::{ResultSource, RouteSearch, RouteSearchService};
