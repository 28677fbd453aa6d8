//! Flight timetable and route network queries.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use freightline_core::{
    AirportCode, FlightCatalog, FlightInstance, FlightInstanceId, FlightStatus, StoreError,
    StoreResult,
};

use crate::PostgresStore;
use crate::error::translate;

pub(crate) const FLIGHT_COLUMNS: &str = "fi.id, fi.flight_number, fi.airline_name, fi.origin, \
     fi.destination, fi.departure_at, fi.arrival_at, fi.operate_date, fi.status";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FlightRow {
    id: Uuid,
    flight_number: String,
    airline_name: String,
    origin: String,
    destination: String,
    departure_at: DateTime<Utc>,
    arrival_at: DateTime<Utc>,
    operate_date: NaiveDate,
    status: String,
}

impl TryFrom<FlightRow> for FlightInstance {
    type Error = StoreError;

    fn try_from(row: FlightRow) -> StoreResult<Self> {
        Ok(Self {
            id: FlightInstanceId::from_uuid(row.id),
            flight_number: row.flight_number,
            airline_name: row.airline_name,
            origin: airport(&row.origin)?,
            destination: airport(&row.destination)?,
            departure_at: row.departure_at,
            arrival_at: row.arrival_at,
            operate_date: row.operate_date,
            status: FlightStatus::parse(&row.status).ok_or_else(|| {
                StoreError::Decode(format!("unknown flight status '{}'", row.status))
            })?,
        })
    }
}

/// Decode a stored airport code.
pub(crate) fn airport(code: &str) -> StoreResult<AirportCode> {
    AirportCode::parse(code)
        .map_err(|_| StoreError::Decode(format!("invalid airport code '{code}'")))
}

pub(crate) fn into_flights(rows: Vec<FlightRow>) -> StoreResult<Vec<FlightInstance>> {
    rows.into_iter().map(FlightInstance::try_from).collect()
}

impl FlightCatalog for PostgresStore {
    async fn scheduled_flights(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        date: NaiveDate,
    ) -> StoreResult<Vec<FlightInstance>> {
        let rows: Vec<FlightRow> = sqlx::query_as(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM flight_instances fi \
             WHERE fi.origin = $1 AND fi.destination = $2 AND fi.operate_date = $3 \
               AND fi.status = 'SCHEDULED' \
             ORDER BY fi.departure_at ASC"
        ))
        .bind(origin.as_str())
        .bind(destination.as_str())
        .bind(date)
        .fetch_all(self.pool())
        .await
        .map_err(translate)?;

        into_flights(rows)
    }

    async fn earliest_connection(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
        first_date: NaiveDate,
        last_date: NaiveDate,
        not_before: DateTime<Utc>,
    ) -> StoreResult<Option<FlightInstance>> {
        let row: Option<FlightRow> = sqlx::query_as(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM flight_instances fi \
             WHERE fi.origin = $1 AND fi.destination = $2 \
               AND fi.operate_date BETWEEN $3 AND $4 \
               AND fi.departure_at >= $5 \
               AND fi.status = 'SCHEDULED' \
             ORDER BY fi.departure_at ASC \
             LIMIT 1"
        ))
        .bind(origin.as_str())
        .bind(destination.as_str())
        .bind(first_date)
        .bind(last_date)
        .bind(not_before)
        .fetch_optional(self.pool())
        .await
        .map_err(translate)?;

        row.map(FlightInstance::try_from).transpose()
    }

    async fn permitted_transits(
        &self,
        origin: &AirportCode,
        destination: &AirportCode,
    ) -> StoreResult<Vec<AirportCode>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT transit_airport FROM routes \
             WHERE origin = $1 AND destination = $2 \
               AND transit_airport IS NOT NULL AND is_active \
             ORDER BY id ASC",
        )
        .bind(origin.as_str())
        .bind(destination.as_str())
        .fetch_all(self.pool())
        .await
        .map_err(translate)?;

        rows.iter().map(|(code,)| airport(code)).collect()
    }

    async fn flights_by_ids(&self, ids: &[FlightInstanceId]) -> StoreResult<Vec<FlightInstance>> {
        let ids: Vec<Uuid> = ids.iter().map(FlightInstanceId::as_uuid).collect();
        let rows: Vec<FlightRow> = sqlx::query_as(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM flight_instances fi WHERE fi.id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool())
        .await
        .map_err(translate)?;

        into_flights(rows)
    }
}
