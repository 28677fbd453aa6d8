//! Booking lifecycle engine.
//!
//! Creation validates the requested flights and inserts the booking, its
//! flight links and the BOOKED event in one transaction. Status changes run
//! under the `booking:<refId>` lock: the row is re-read `FOR UPDATE`, the
//! guard is evaluated, and the status update plus one event are committed
//! together. Any error rolls the transaction back before the lock is
//! released.
//!
//! The transaction runs on the connection holding the lock, so a transition
//! never waits on the pool while holding a lease.

use std::sync::Arc;
use std::time::Instant;

use freightline_core::environment::Clock;
use freightline_core::lock::booking_lock_key;
use freightline_core::routes::{check_flight_ids, validate_flight_route};
use freightline_core::state_machine::{cancel_reason, plan_transition};
use freightline_core::{
    Actor, BookedFlight, Booking, BookingDetails, BookingError, BookingHistory, BookingId,
    BookingPage, BookingStatus, BookingStore, BookingTransition, BookingTx,
    CancellationOutcome, DistributedLockManager, FlightCatalog, FlightLink, LockBackend,
    NewBooking, NewEvent, RefId, Result, StoreResult, TransitionOutcome,
};

use crate::metrics::{
    BOOKING_CREATED, BOOKING_REF_ID_COLLISIONS, BOOKING_TRANSITION_DURATION, BOOKING_TRANSITIONS,
};

/// Page size used when the caller gives none.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;
/// Reference-id generation attempts before giving up.
pub const DEFAULT_REF_ID_ATTEMPTS: u32 = 5;

/// Creates bookings and moves them through their lifecycle.
pub struct BookingEngine<S, L> {
    store: S,
    locks: DistributedLockManager<L>,
    clock: Arc<dyn Clock>,
    ref_id_attempts: u32,
}

impl<S, L> BookingEngine<S, L>
where
    S: BookingStore<Lease = L::Lease> + FlightCatalog,
    L: LockBackend,
{
    /// Create an engine over `store` and `locks`.
    #[must_use]
    pub fn new(store: S, locks: L, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            locks: DistributedLockManager::new(locks),
            clock,
            ref_id_attempts: DEFAULT_REF_ID_ATTEMPTS,
        }
    }

    /// Set how many reference ids to try before failing with `Conflict`.
    #[must_use]
    pub fn with_ref_id_attempts(mut self, attempts: u32) -> Self {
        self.ref_id_attempts = attempts.max(1);
        self
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Create a booking on one (direct) or two (transit) flights.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BadRequest`] if the request or flight route is invalid
    /// - [`BookingError::Conflict`] if no unique reference could be allocated
    /// - [`BookingError::Internal`] on store failure
    #[tracing::instrument(
        skip_all,
        fields(origin = %request.origin, destination = %request.destination)
    )]
    pub async fn create(
        &self,
        request: NewBooking,
        actor: Option<&Actor>,
    ) -> Result<BookingDetails> {
        request.validate()?;
        check_flight_ids(&request.flight_instance_ids)?;

        let fetched = self.store.flights_by_ids(&request.flight_instance_ids).await?;
        let flights = validate_flight_route(
            &request.flight_instance_ids,
            fetched,
            &request.origin,
            &request.destination,
        )?;
        let links: Vec<FlightLink> = flights
            .iter()
            .zip(1..)
            .map(|(flight, hop_order)| FlightLink {
                flight_instance_id: flight.id,
                hop_order,
            })
            .collect();

        for attempt in 1..=self.ref_id_attempts {
            let ref_id = RefId::generate(
                &request.origin,
                &request.destination,
                &mut rand::thread_rng(),
            );
            if self.store.ref_id_exists(&ref_id).await? {
                metrics::counter!(BOOKING_REF_ID_COLLISIONS).increment(1);
                tracing::debug!(ref_id = %ref_id, attempt, "Reference id taken, regenerating");
                continue;
            }

            let now = self.clock.now();
            let booking = Booking {
                id: BookingId::new(),
                ref_id,
                origin: request.origin.clone(),
                destination: request.destination.clone(),
                pieces: request.pieces,
                weight_kg: request.weight_kg,
                status: BookingStatus::Booked,
                created_by: actor.map(|a| a.user_id),
                created_at: now,
                updated_at: now,
            };

            match self.insert_booking(&booking, &links).await {
                Ok(()) => {
                    metrics::counter!(BOOKING_CREATED).increment(1);
                    tracing::info!(
                        ref_id = %booking.ref_id,
                        hops = links.len(),
                        "Booking created"
                    );
                    let flights = flights
                        .into_iter()
                        .zip(1..)
                        .map(|(flight, hop_order)| BookedFlight { hop_order, flight })
                        .collect();
                    return Ok(BookingDetails { booking, flights });
                }
                Err(err) if err.is_ref_id_collision() => {
                    metrics::counter!(BOOKING_REF_ID_COLLISIONS).increment(1);
                    tracing::warn!(
                        ref_id = %booking.ref_id,
                        attempt,
                        "Reference id collided on insert"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(BookingError::conflict(
            "Could not allocate a unique booking reference. Please try again.",
        ))
    }

    /// Apply `transition` to the booking `ref_id` under its lock.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Conflict`] if another request holds the booking lock
    /// - [`BookingError::NotFound`] if no booking has this reference
    /// - [`BookingError::BadRequest`] if the current status forbids the transition
    /// - [`BookingError::Internal`] on store failure
    #[tracing::instrument(skip_all, fields(ref_id = %ref_id, event = %transition))]
    pub async fn transition(
        &self,
        ref_id: &RefId,
        transition: BookingTransition,
        reason: Option<&str>,
        actor: Option<&Actor>,
    ) -> Result<TransitionOutcome> {
        let key = booking_lock_key(ref_id);
        let started = Instant::now();

        let outcome = self
            .locks
            .with_lease(&key, |mut lease| async move {
                let result = self
                    .apply_locked(&mut lease, ref_id, transition, reason, actor)
                    .await;
                (lease, result)
            })
            .await?;

        metrics::counter!(BOOKING_TRANSITIONS, "event" => transition.as_str()).increment(1);
        metrics::histogram!(BOOKING_TRANSITION_DURATION).record(started.elapsed().as_secs_f64());
        tracing::info!(status = %outcome.booking.status, "Booking transitioned");
        Ok(outcome)
    }

    /// Cancel a BOOKED or DEPARTED booking.
    ///
    /// # Errors
    ///
    /// Same as [`BookingEngine::transition`].
    pub async fn cancel(
        &self,
        ref_id: &RefId,
        reason: Option<&str>,
        actor: Option<&Actor>,
    ) -> Result<CancellationOutcome> {
        let outcome = self
            .transition(ref_id, BookingTransition::Cancel, reason, actor)
            .await?;
        Ok(CancellationOutcome {
            booking: outcome.booking,
            cancellation_reason: cancel_reason(reason).to_string(),
            cancelled_at: outcome.transitioned_at,
        })
    }

    /// Booking, flights in hop order and timeline newest first.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] if no booking has this reference
    /// - [`BookingError::Internal`] on store failure
    #[tracing::instrument(skip_all, fields(ref_id = %ref_id))]
    pub async fn history(&self, ref_id: &RefId) -> Result<BookingHistory> {
        self.store
            .booking_history(ref_id)
            .await?
            .ok_or_else(|| not_found(ref_id))
    }

    /// Bookings visible to `actor`, newest first.
    ///
    /// Admins see every booking, everyone else only their own. `limit`
    /// defaults to 50 and is clamped to `1..=100`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Internal`] on store failure.
    #[tracing::instrument(skip_all, fields(user_id = %actor.user_id))]
    pub async fn list(&self, actor: &Actor, limit: Option<u32>) -> Result<BookingPage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let owner = (!actor.is_admin()).then_some(actor.user_id);
        let bookings = self.store.list_bookings(owner, limit).await?;
        let has_more = bookings.len() == usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(BookingPage {
            bookings,
            limit,
            has_more,
        })
    }

    async fn insert_booking(&self, booking: &Booking, links: &[FlightLink]) -> StoreResult<()> {
        let mut tx = self.store.begin().await?;
        if let Err(err) = write_booking(&mut tx, booking, links).await {
            rollback(tx).await;
            return Err(err);
        }
        tx.commit().await
    }

    async fn apply_locked(
        &self,
        lease: &mut L::Lease,
        ref_id: &RefId,
        transition: BookingTransition,
        reason: Option<&str>,
        actor: Option<&Actor>,
    ) -> Result<TransitionOutcome> {
        let mut tx = self.store.begin_on(lease).await?;
        let now = self.clock.now();
        match apply_in_tx(&mut tx, ref_id, transition, reason, actor, now).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(err) => {
                rollback(tx).await;
                Err(err)
            }
        }
    }
}

async fn write_booking<T: BookingTx>(
    tx: &mut T,
    booking: &Booking,
    links: &[FlightLink],
) -> StoreResult<()> {
    tx.insert_booking(booking).await?;
    tx.link_flights(booking.id, links).await?;
    tx.append_event(NewEvent::booking_created(booking)).await?;
    Ok(())
}

async fn apply_in_tx<T: BookingTx>(
    tx: &mut T,
    ref_id: &RefId,
    transition: BookingTransition,
    reason: Option<&str>,
    actor: Option<&Actor>,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<TransitionOutcome> {
    let booking = tx
        .lock_booking(ref_id)
        .await?
        .ok_or_else(|| not_found(ref_id))?;
    let plan = plan_transition(&booking, transition, reason, actor, now)?;
    let booking = tx
        .update_status(booking.id, plan.new_status, plan.transitioned_at)
        .await?;
    let event = tx.append_event(plan.event).await?;
    Ok(TransitionOutcome {
        booking,
        event,
        transitioned_at: plan.transitioned_at,
    })
}

async fn rollback<T: BookingTx>(tx: T) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "Rollback failed; connection discarded");
    }
}

fn not_found(ref_id: &RefId) -> BookingError {
    BookingError::not_found(format!("Booking with reference ID '{ref_id}' not found"))
}
