//! Booking rows, flight links and audit events.

use chrono::{DateTime, Utc};
use sqlx::{Connection, Postgres, Transaction};
use uuid::Uuid;

use freightline_core::{
    Booking, BookingHistory, BookingId, BookingStatus, BookingStore, BookingTx, BookedFlight,
    EntityType, Event, EventId, FlightInstance, FlightLink, NewEvent, RefId, StoreError,
    StoreResult, UserId,
};

use crate::PostgresStore;
use crate::advisory::PgAdvisoryLease;
use crate::error::translate;
use crate::flights::{FLIGHT_COLUMNS, FlightRow, airport};

const BOOKING_COLUMNS: &str = "id, ref_id, origin, destination, pieces, weight_kg, status, \
     created_by, created_at, updated_at";

const EVENT_COLUMNS: &str =
    "id, entity_type, entity_id, event_type, location, description, created_by, created_at";

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    ref_id: String,
    origin: String,
    destination: String,
    pieces: i32,
    weight_kg: i32,
    status: String,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> StoreResult<Self> {
        Ok(Self {
            id: BookingId::from_uuid(row.id),
            ref_id: RefId::new(row.ref_id),
            origin: airport(&row.origin)?,
            destination: airport(&row.destination)?,
            pieces: row.pieces,
            weight_kg: row.weight_kg,
            status: booking_status(&row.status)?,
            created_by: row.created_by.map(UserId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookedFlightRow {
    hop_order: i16,
    #[sqlx(flatten)]
    flight: FlightRow,
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    entity_type: String,
    entity_id: Uuid,
    event_type: String,
    location: Option<String>,
    description: Option<String>,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> StoreResult<Self> {
        Ok(Self {
            id: EventId::from_uuid(row.id),
            entity_type: EntityType::parse(&row.entity_type).ok_or_else(|| {
                StoreError::Decode(format!("unknown entity type '{}'", row.entity_type))
            })?,
            entity_id: row.entity_id,
            event_type: booking_status(&row.event_type)?,
            location: row.location.as_deref().map(airport).transpose()?,
            description: row.description.unwrap_or_default(),
            created_by: row.created_by.map(UserId::from_uuid),
            created_at: row.created_at,
        })
    }
}

fn booking_status(s: &str) -> StoreResult<BookingStatus> {
    BookingStatus::parse(s)
        .ok_or_else(|| StoreError::Decode(format!("unknown booking status '{s}'")))
}

impl BookingStore for PostgresStore {
    type Tx<'a> = PgBookingTx<'a>;
    type Lease = PgAdvisoryLease;

    async fn begin(&self) -> StoreResult<PgBookingTx<'_>> {
        let tx = self.pool().begin().await.map_err(translate)?;
        Ok(PgBookingTx { tx })
    }

    async fn begin_on<'a>(
        &'a self,
        lease: &'a mut PgAdvisoryLease,
    ) -> StoreResult<PgBookingTx<'a>> {
        let lock_id = lease.lock_id();
        let conn = lease.connection().ok_or_else(|| {
            StoreError::Unavailable(format!("advisory lease {lock_id} has no connection"))
        })?;
        let tx = conn.begin().await.map_err(translate)?;
        Ok(PgBookingTx { tx })
    }

    async fn ref_id_exists(&self, ref_id: &RefId) -> StoreResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM bookings WHERE ref_id = $1)")
                .bind(ref_id.as_str())
                .fetch_one(self.pool())
                .await
                .map_err(translate)?;
        Ok(exists)
    }

    #[tracing::instrument(skip_all, fields(ref_id = %ref_id))]
    async fn booking_history(&self, ref_id: &RefId) -> StoreResult<Option<BookingHistory>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE ref_id = $1"))
                .bind(ref_id.as_str())
                .fetch_optional(self.pool())
                .await
                .map_err(translate)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let booking = Booking::try_from(row)?;

        let flight_rows: Vec<BookedFlightRow> = sqlx::query_as(&format!(
            "SELECT bf.hop_order, {FLIGHT_COLUMNS} FROM booking_flights bf \
             JOIN flight_instances fi ON fi.id = bf.flight_instance_id \
             WHERE bf.booking_id = $1 \
             ORDER BY bf.hop_order ASC"
        ))
        .bind(booking.id.as_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(translate)?;

        let flights = flight_rows
            .into_iter()
            .map(|row| {
                Ok(BookedFlight {
                    hop_order: row.hop_order,
                    flight: FlightInstance::try_from(row.flight)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        // seq breaks ties between events recorded in the same instant.
        let event_rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM events \
             WHERE entity_type = 'BOOKING' AND entity_id = $1 \
             ORDER BY created_at DESC, seq DESC"
        ))
        .bind(booking.id.as_uuid())
        .fetch_all(self.pool())
        .await
        .map_err(translate)?;

        let timeline = event_rows
            .into_iter()
            .map(Event::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(BookingHistory {
            booking,
            flights,
            timeline,
        }))
    }

    async fn list_bookings(&self, owner: Option<UserId>, limit: u32) -> StoreResult<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE ($1::uuid IS NULL OR created_by = $1) \
             ORDER BY created_at DESC \
             LIMIT $2"
        ))
        .bind(owner.map(|u| u.as_uuid()))
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(translate)?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}

/// Transaction over a pooled connection or a lease's connection.
///
/// Dropping it without commit rolls back.
#[derive(Debug)]
pub struct PgBookingTx<'c> {
    tx: Transaction<'c, Postgres>,
}

impl BookingTx for PgBookingTx<'_> {
    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(booking.id.as_uuid())
        .bind(booking.ref_id.as_str())
        .bind(booking.origin.as_str())
        .bind(booking.destination.as_str())
        .bind(booking.pieces)
        .bind(booking.weight_kg)
        .bind(booking.status.as_str())
        .bind(booking.created_by.map(|u| u.as_uuid()))
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(translate)?;
        Ok(())
    }

    async fn link_flights(
        &mut self,
        booking_id: BookingId,
        links: &[FlightLink],
    ) -> StoreResult<()> {
        for link in links {
            sqlx::query(
                "INSERT INTO booking_flights (booking_id, flight_instance_id, hop_order) \
                 VALUES ($1, $2, $3)",
            )
            .bind(booking_id.as_uuid())
            .bind(link.flight_instance_id.as_uuid())
            .bind(link.hop_order)
            .execute(&mut *self.tx)
            .await
            .map_err(translate)?;
        }
        Ok(())
    }

    async fn lock_booking(&mut self, ref_id: &RefId) -> StoreResult<Option<Booking>> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE ref_id = $1 FOR UPDATE"
        ))
        .bind(ref_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(translate)?;

        row.map(Booking::try_from).transpose()
    }

    async fn update_status(
        &mut self,
        booking_id: BookingId,
        status: BookingStatus,
        updated_at: DateTime<Utc>,
    ) -> StoreResult<Booking> {
        let row: BookingRow = sqlx::query_as(&format!(
            "UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1 \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id.as_uuid())
        .bind(status.as_str())
        .bind(updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(translate)?;

        Booking::try_from(row)
    }

    async fn append_event(&mut self, event: NewEvent) -> StoreResult<Event> {
        let id = EventId::new();
        sqlx::query(&format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(id.as_uuid())
        .bind(event.entity_type.as_str())
        .bind(event.entity_id)
        .bind(event.event_type.as_str())
        .bind(event.location.as_ref().map(|code| code.as_str().to_string()))
        .bind(&event.description)
        .bind(event.created_by.map(|u| u.as_uuid()))
        .bind(event.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(translate)?;

        Ok(event.into_event(id))
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await.map_err(translate)
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await.map_err(translate)
    }
}
