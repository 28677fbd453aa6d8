//! Call-counting [`FlightCatalog`] wrapper.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use freightline_core::{
    AirportCode, FlightCatalog, FlightInstance, FlightInstanceId, StoreResult,
};

/// Wraps a catalog and counts every query made against it.
#[derive(Debug, Clone)]
pub struct CountingCatalog<C> {
    inner: C,
    calls: Arc<AtomicUsize>,
}

impl<C> CountingCatalog<C> {
    /// Wrap `inner`.
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Total queries so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl<C: FlightCatalog> FlightCatalog for CountingCatalog<C> {
    async fn scheduled_flights(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> StoreResult<Vec<FlightInstance>> {
        self.hit();
        self.inner.scheduled_flights(origin, destination, date).await
    }

    async fn earliest_connection(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        first_date: NaiveDate,
        last_date: NaiveDate,
        not_before: DateTime<Utc>,
    ) -> StoreResult<Option<FlightInstance>> {
        self.hit();
        self.inner
            .earliest_connection(origin, destination, first_date, last_date, not_before)
            .await
    }

    async fn permitted_transits(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
    ) -> StoreResult<Vec<AirportCode>> {
        self.hit();
        self.inner.permitted_transits(origin, destination).await
    }

    async fn flights_by_ids(&self, ids: &[FlightInstanceId]) -> StoreResult<Vec<FlightInstance>> {
        self.hit();
        self.inner.flights_by_ids(ids).await
    }
}
