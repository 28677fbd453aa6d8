//! Persistence seams.
//!
//! The engine talks to storage only through these traits. Implementations
//! translate driver failures into [`StoreError`](crate::StoreError) before
//! returning.

use chrono::{DateTime, NaiveDate, Utc};
use std::future::Future;

use crate::error::StoreResult;
use crate::types::{
    AirportCode, Booking, BookingHistory, BookingId, BookingStatus, Event, FlightInstance,
    FlightInstanceId, FlightLink, NewEvent, RefId, UserId,
};

/// Read-only view of the flight timetable and route network.
pub trait FlightCatalog: Send + Sync {
    /// SCHEDULED flights `origin -> destination` operating on `date`,
    /// ordered by departure ascending.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the query fails.
    fn scheduled_flights(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> impl Future<Output = StoreResult<Vec<FlightInstance>>> + Send;

    /// Earliest SCHEDULED flight `origin -> destination` with operate date in
    /// `[first_date, last_date]` departing at or after `not_before`.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the query fails.
    fn earliest_connection(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        first_date: NaiveDate,
        last_date: NaiveDate,
        not_before: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Option<FlightInstance>>> + Send;

    /// Transit airports of active routes `origin -> destination`, in store
    /// order.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the query fails.
    fn permitted_transits(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
    ) -> impl Future<Output = StoreResult<Vec<AirportCode>>> + Send;

    /// Flights with the given ids, in any order. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the query fails.
    fn flights_by_ids(
        &self,
        ids: &[FlightInstanceId],
    ) -> impl Future<Output = StoreResult<Vec<FlightInstance>>> + Send;
}

/// Booking persistence.
pub trait BookingStore: Send + Sync {
    /// Transaction handle, possibly borrowing a lock lease.
    type Tx<'a>: BookingTx
    where
        Self: 'a;

    /// Lock lease whose connection [`BookingStore::begin_on`] reuses.
    type Lease: Send;

    /// Open a transaction on a fresh connection.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if no connection is available.
    fn begin(&self) -> impl Future<Output = StoreResult<Self::Tx<'_>>> + Send;

    /// Open a transaction on the connection that holds `lease`.
    ///
    /// The locked operation then holds a single connection.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the lease has no usable connection
    /// or the transaction cannot start.
    fn begin_on<'a>(
        &'a self,
        lease: &'a mut Self::Lease,
    ) -> impl Future<Output = StoreResult<Self::Tx<'a>>> + Send;

    /// Returns `true` if a booking already uses `ref_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the query fails.
    fn ref_id_exists(&self, ref_id: &RefId) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Booking, flights in hop order and events newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the query fails.
    fn booking_history(
        &self,
        ref_id: &RefId,
    ) -> impl Future<Output = StoreResult<Option<BookingHistory>>> + Send;

    /// Up to `limit` bookings newest first, restricted to `owner` if given.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the query fails.
    fn list_bookings(
        &self,
        owner: Option<UserId>,
        limit: u32,
    ) -> impl Future<Output = StoreResult<Vec<Booking>>> + Send;
}

/// Writes performed inside one transaction.
///
/// Dropping a transaction without calling [`BookingTx::commit`] discards
/// every write.
pub trait BookingTx: Send {
    /// Insert a new booking row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::UniqueViolation`] if the reference id is
    /// taken, or another [`crate::StoreError`] on failure.
    fn insert_booking(
        &mut self,
        booking: &Booking,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Link flights to a booking.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the insert fails.
    fn link_flights(
        &mut self,
        booking_id: BookingId,
        links: &[FlightLink],
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Read a booking and lock its row until the transaction ends.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the query fails.
    fn lock_booking(
        &mut self,
        ref_id: &RefId,
    ) -> impl Future<Output = StoreResult<Option<Booking>>> + Send;

    /// Set a booking's status and `updated_at`, returning the new row.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the update fails.
    fn update_status(
        &mut self,
        booking_id: BookingId,
        status: BookingStatus,
        updated_at: DateTime<Utc>,
    ) -> impl Future<Output = StoreResult<Booking>> + Send;

    /// Append an audit event.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the insert fails.
    fn append_event(
        &mut self,
        event: NewEvent,
    ) -> impl Future<Output = StoreResult<Event>> + Send;

    /// Make every write visible.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the commit fails.
    fn commit(self) -> impl Future<Output = StoreResult<()>> + Send;

    /// Discard every write.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::StoreError`] if the rollback fails.
    fn rollback(self) -> impl Future<Output = StoreResult<()>> + Send;
}
