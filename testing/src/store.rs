//! In-memory booking store and flight catalog.
//!
//! One `tokio::sync::Mutex` guards all state. A transaction holds the guard
//! for its whole lifetime and writes into a working copy that replaces the
//! shared state on commit, so dropped or rolled-back transactions leave no
//! trace.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

use freightline_core::error::REF_ID_CONSTRAINT;
use freightline_core::{
    AirportCode, BookedFlight, Booking, BookingHistory, BookingId, BookingStatus, BookingStore,
    BookingTx, Event, EventId, FlightCatalog, FlightInstance, FlightInstanceId, FlightLink,
    NewEvent, RefId, Route, StoreError, StoreResult, UserId,
};

use crate::locks::InMemoryLease;

#[derive(Debug, Clone, Default)]
struct State {
    flights: Vec<FlightInstance>,
    routes: Vec<Route>,
    bookings: Vec<Booking>,
    links: Vec<(BookingId, FlightLink)>,
    events: Vec<Event>,
}

impl State {
    fn booking_by_ref(&self, ref_id: &RefId) -> Option<&Booking> {
        self.bookings.iter().find(|b| &b.ref_id == ref_id)
    }

    fn flights_of(&self, booking_id: BookingId) -> Vec<BookedFlight> {
        let mut flights: Vec<BookedFlight> = self
            .links
            .iter()
            .filter(|(id, _)| *id == booking_id)
            .filter_map(|(_, link)| {
                self.flights
                    .iter()
                    .find(|f| f.id == link.flight_instance_id)
                    .map(|f| BookedFlight {
                        hop_order: link.hop_order,
                        flight: f.clone(),
                    })
            })
            .collect();
        flights.sort_by_key(|f| f.hop_order);
        flights
    }

    fn timeline_of(&self, booking_id: BookingId) -> Vec<Event> {
        let mut timeline: Vec<(usize, &Event)> = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.entity_id == booking_id.as_uuid())
            .collect();
        timeline.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        timeline.into_iter().map(|(_, e)| e.clone()).collect()
    }
}

#[derive(Debug, Default)]
struct Faults {
    ref_id_races: AtomicUsize,
    fail_event_appends: AtomicBool,
}

#[derive(Debug, Default)]
struct Usage {
    transactions: AtomicUsize,
    leased_transactions: AtomicUsize,
}

/// In-memory [`BookingStore`] and [`FlightCatalog`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    faults: Arc<Faults>,
    usage: Arc<Usage>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flight instance to the timetable.
    pub async fn insert_flight(&self, flight: FlightInstance) {
        self.state.lock().await.flights.push(flight);
    }

    /// Add a route network entry.
    pub async fn insert_route(&self, route: Route) {
        self.state.lock().await.routes.push(route);
    }

    /// Permit `transit` as a stop between `origin` and `destination`.
    pub async fn permit_transit(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        transit: &AirportCode,
    ) {
        self.insert_route(Route {
            origin: origin.clone(),
            destination: destination.clone(),
            transit_airport: Some(transit.clone()),
            is_active: true,
        })
        .await;
    }

    /// Make the next `count` booking inserts fail with a reference-id
    /// collision, as if another writer took the id after the pre-check.
    pub fn simulate_ref_id_races(&self, count: usize) {
        self.faults.ref_id_races.store(count, Ordering::SeqCst);
    }

    /// Transactions opened so far, leased or not.
    #[must_use]
    pub fn transactions(&self) -> usize {
        self.usage.transactions.load(Ordering::SeqCst)
    }

    /// Transactions opened on a lock lease's connection.
    #[must_use]
    pub fn leased_transactions(&self) -> usize {
        self.usage.leased_transactions.load(Ordering::SeqCst)
    }

    /// Make every event append fail until switched off.
    pub fn fail_event_appends(&self, fail: bool) {
        self.faults.fail_event_appends.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all bookings in insertion order.
    pub async fn bookings(&self) -> Vec<Booking> {
        self.state.lock().await.bookings.clone()
    }

    /// Snapshot of all events in insertion order.
    pub async fn events(&self) -> Vec<Event> {
        self.state.lock().await.events.clone()
    }

    /// Events recorded for one booking, oldest first.
    pub async fn events_for(&self, booking_id: BookingId) -> Vec<Event> {
        self.state
            .lock()
            .await
            .events
            .iter()
            .filter(|e| e.entity_id == booking_id.as_uuid())
            .cloned()
            .collect()
    }

    /// Current row for `ref_id`.
    pub async fn booking(&self, ref_id: &RefId) -> Option<Booking> {
        self.state.lock().await.booking_by_ref(ref_id).cloned()
    }
}

impl FlightCatalog for InMemoryStore {
    async fn scheduled_flights(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> StoreResult<Vec<FlightInstance>> {
        let state = self.state.lock().await;
        let mut flights: Vec<FlightInstance> = state
            .flights
            .iter()
            .filter(|f| {
                f.is_bookable()
                    && &f.origin == origin
                    && &f.destination == destination
                    && f.operate_date == date
            })
            .cloned()
            .collect();
        flights.sort_by_key(|f| f.departure_at);
        Ok(flights)
    }

    async fn earliest_connection(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        first_date: NaiveDate,
        last_date: NaiveDate,
        not_before: DateTime<Utc>,
    ) -> StoreResult<Option<FlightInstance>> {
        let state = self.state.lock().await;
        let mut candidates: Vec<&FlightInstance> = state
            .flights
            .iter()
            .filter(|f| {
                f.is_bookable()
                    && &f.origin == origin
                    && &f.destination == destination
                    && (first_date..=last_date).contains(&f.operate_date)
                    && f.departure_at >= not_before
            })
            .collect();
        candidates.sort_by_key(|f| f.departure_at);
        Ok(candidates.first().map(|f| (*f).clone()))
    }

    async fn permitted_transits(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
    ) -> StoreResult<Vec<AirportCode>> {
        let state = self.state.lock().await;
        Ok(state
            .routes
            .iter()
            .filter(|r| r.is_active && &r.origin == origin && &r.destination == destination)
            .filter_map(|r| r.transit_airport.clone())
            .collect())
    }

    async fn flights_by_ids(&self, ids: &[FlightInstanceId]) -> StoreResult<Vec<FlightInstance>> {
        let state = self.state.lock().await;
        Ok(state
            .flights
            .iter()
            .filter(|f| ids.contains(&f.id))
            .cloned()
            .collect())
    }
}

impl BookingStore for InMemoryStore {
    type Tx<'a> = InMemoryTx;
    type Lease = InMemoryLease;

    async fn begin(&self) -> StoreResult<InMemoryTx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        self.usage.transactions.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryTx {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }

    async fn begin_on<'a>(&'a self, _lease: &'a mut InMemoryLease) -> StoreResult<InMemoryTx> {
        self.usage.leased_transactions.fetch_add(1, Ordering::SeqCst);
        self.begin().await
    }

    async fn ref_id_exists(&self, ref_id: &RefId) -> StoreResult<bool> {
        Ok(self.state.lock().await.booking_by_ref(ref_id).is_some())
    }

    async fn booking_history(&self, ref_id: &RefId) -> StoreResult<Option<BookingHistory>> {
        let state = self.state.lock().await;
        Ok(state.booking_by_ref(ref_id).map(|booking| BookingHistory {
            booking: booking.clone(),
            flights: state.flights_of(booking.id),
            timeline: state.timeline_of(booking.id),
        }))
    }

    async fn list_bookings(&self, owner: Option<UserId>, limit: u32) -> StoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<(usize, &Booking)> = state
            .bookings
            .iter()
            .enumerate()
            .filter(|(_, b)| owner.is_none() || b.created_by == owner)
            .collect();
        bookings.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
        Ok(bookings
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|(_, b)| b.clone())
            .collect())
    }
}

/// Transaction over [`InMemoryStore`]. Holds the store lock until dropped.
#[derive(Debug)]
pub struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    working: State,
    faults: Arc<Faults>,
}

impl BookingTx for InMemoryTx {
    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        let raced = self
            .faults
            .ref_id_races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if raced || self.working.booking_by_ref(&booking.ref_id).is_some() {
            return Err(StoreError::UniqueViolation {
                constraint: Some(REF_ID_CONSTRAINT.to_string()),
            });
        }
        self.working.bookings.push(booking.clone());
        Ok(())
    }

    async fn link_flights(
        &mut self,
        booking_id: BookingId,
        links: &[FlightLink],
    ) -> StoreResult<()> {
        for link in links {
            if !self.working.flights.iter().any(|f| f.id == link.flight_instance_id) {
                return Err(StoreError::ForeignKeyViolation {
                    constraint: Some("booking_flights_flight_instance_id_fkey".to_string()),
                    column: Some("flight_instance_id".to_string()),
                });
            }
            self.working.links.push((booking_id, *link));
        }
        Ok(())
    }

    async fn lock_booking(&mut self, ref_id: &RefId) -> StoreResult<Option<Booking>> {
        Ok(self.working.booking_by_ref(ref_id).cloned())
    }

    async fn update_status(
        &mut self,
        booking_id: BookingId,
        status: BookingStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Booking> {
        let booking = self
            .working
            .bookings
            .iter_mut()
            .find(|b| b.id == booking_id)
            .ok_or_else(|| StoreError::Database(format!("booking {booking_id} vanished")))?;
        booking.status = status;
        booking.updated_at = updated_at;
        Ok(booking.clone())
    }

    async fn append_event(&mut self, event: NewEvent) -> StoreResult<Event> {
        if self.faults.fail_event_appends.load(Ordering::SeqCst) {
            return Err(StoreError::TransactionAborted(
                "deadlock detected".to_string(),
            ));
        }
        let event = event.into_event(EventId::new());
        self.working.events.push(event.clone());
        Ok(event)
    }

    async fn commit(mut self) -> StoreResult<()> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = InMemoryStore::new();
        let booking = fixtures::booking("DEL", "DXB", BookingStatus::Booked);
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_booking(&booking).await.unwrap();
        }
        assert!(store.bookings().await.is_empty());

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&booking).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.bookings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ref_id_is_a_unique_violation() {
        let store = InMemoryStore::new();
        let booking = fixtures::booking("DEL", "DXB", BookingStatus::Booked);
        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&booking).await.unwrap();
        let again = Booking {
            id: BookingId::new(),
            ..booking
        };
        let err = tx.insert_booking(&again).await.unwrap_err();
        assert!(err.is_ref_id_collision());
    }

    #[tokio::test]
    async fn test_simulated_races_are_consumed() {
        let store = InMemoryStore::new();
        store.simulate_ref_id_races(1);
        let mut tx = store.begin().await.unwrap();
        let booking = fixtures::booking("DEL", "DXB", BookingStatus::Booked);
        assert!(tx.insert_booking(&booking).await.is_err());
        assert!(tx.insert_booking(&booking).await.is_ok());
    }
}
