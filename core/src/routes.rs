//! Route search and flight-route validation.
//!
//! [`RouteResolver`] finds direct flights and at most one one-stop itinerary
//! for a route and date. Transit search is greedy: permitted transit
//! airports are tried in store order, first legs by departure, and the first
//! leg that has any connection wins.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{BookingError, Result};
use crate::store::FlightCatalog;
use crate::types::{AirportCode, FlightInstance, FlightInstanceId};

const MS_PER_MINUTE: i64 = 60 * 1000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;

/// Longest layover accepted when booking a transit itinerary.
pub const MAX_LAYOVER_HOURS: i64 = 24;

/// A validated route search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuery {
    /// Departure airport.
    pub origin: AirportCode,
    /// Arrival airport.
    pub destination: AirportCode,
    /// Calendar date of the first departure.
    pub departure_date: NaiveDate,
}

impl RouteQuery {
    /// Parse raw request fields.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BadRequest`] for malformed airport codes,
    /// identical endpoints or a date that is not `YYYY-MM-DD`.
    pub fn parse(origin: &str, destination: &str, departure_date: &str) -> Result<Self> {
        let departure_date = NaiveDate::parse_from_str(departure_date.trim(), "%Y-%m-%d")
            .map_err(|_| {
                BookingError::bad_request("departure_date must be a valid ISO date (YYYY-MM-DD)")
            })?;
        Self::new(
            AirportCode::parse(origin)?,
            AirportCode::parse(destination)?,
            departure_date,
        )
    }

    /// Build a query from typed fields.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BadRequest`] if origin equals destination.
    pub fn new(
        origin: AirportCode,
        destination: AirportCode,
        departure_date: NaiveDate,
    ) -> Result<Self> {
        if origin == destination {
            return Err(BookingError::bad_request(
                "Origin and destination cannot be the same",
            ));
        }
        Ok(Self {
            origin,
            destination,
            departure_date,
        })
    }

    /// Reject dates before `today`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BadRequest`] if the departure date is in the
    /// past.
    pub fn ensure_not_past(&self, today: NaiveDate) -> Result<()> {
        if self.departure_date < today {
            return Err(BookingError::bad_request(
                "Departure date cannot be in the past",
            ));
        }
        Ok(())
    }

    /// Whole days between `today` and the departure date.
    #[must_use]
    pub fn days_until_departure(&self, today: NaiveDate) -> i64 {
        (self.departure_date - today).num_days()
    }
}

/// A one-stop itinerary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitRoute {
    /// Leg from origin to the transit airport.
    pub first_flight: FlightInstance,
    /// Leg from the transit airport to destination.
    pub second_flight: FlightInstance,
    /// Connection airport.
    pub transit_airport: AirportCode,
    /// First departure to final arrival, `"<H>h <M>m"`.
    pub total_duration: String,
    /// First arrival to second departure, `"<H>h <M>m"`.
    pub layover_duration: String,
}

impl TransitRoute {
    /// Pair two legs and compute their durations.
    #[must_use]
    pub fn connect(first_flight: FlightInstance, second_flight: FlightInstance) -> Self {
        let total_duration = format_duration(first_flight.departure_at, second_flight.arrival_at);
        let layover_duration = format_duration(first_flight.arrival_at, second_flight.departure_at);
        Self {
            transit_airport: first_flight.destination.clone(),
            first_flight,
            second_flight,
            total_duration,
            layover_duration,
        }
    }
}

/// Result of a route search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSearchResult {
    /// Direct flights by departure ascending.
    pub direct_flights: Vec<FlightInstance>,
    /// Best one-stop itinerary, if any.
    pub transit_route: Option<TransitRoute>,
}

/// Format the span between two instants as `"<H>h <M>m"`, flooring both
/// components.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use freightline_core::routes::format_duration;
///
/// let start = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2026, 5, 1, 13, 45, 59).unwrap();
/// assert_eq!(format_duration(start, end), "3h 45m");
/// ```
#[must_use]
pub fn format_duration(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let ms = (end - start).num_milliseconds();
    let hours = ms.div_euclid(MS_PER_HOUR);
    let minutes = (ms % MS_PER_HOUR).div_euclid(MS_PER_MINUTE);
    format!("{hours}h {minutes}m")
}

/// Computes direct and one-stop itineraries from a [`FlightCatalog`].
#[derive(Debug, Clone)]
pub struct RouteResolver<C> {
    catalog: C,
}

impl<C: FlightCatalog> RouteResolver<C> {
    /// Create a resolver.
    #[must_use]
    pub const fn new(catalog: C) -> Self {
        Self { catalog }
    }

    /// The underlying catalog.
    #[must_use]
    pub const fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Direct flights plus the first valid transit itinerary.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Internal`] if the catalog fails.
    pub async fn resolve(&self, query: &RouteQuery) -> Result<RouteSearchResult> {
        let direct_flights = self
            .catalog
            .scheduled_flights(&query.origin, &query.destination, query.departure_date)
            .await?;
        let transit_route = self.find_transit(query).await?;
        Ok(RouteSearchResult {
            direct_flights,
            transit_route,
        })
    }

    /// First connection found over permitted transit airports, or `None`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Internal`] if the catalog fails.
    pub async fn find_transit(&self, query: &RouteQuery) -> Result<Option<TransitRoute>> {
        let transits = self
            .catalog
            .permitted_transits(&query.origin, &query.destination)
            .await?;
        if transits.is_empty() {
            return Ok(None);
        }

        let date = query.departure_date;
        let next_day = date.checked_add_days(Days::new(1)).unwrap_or(date);

        for transit in &transits {
            let first_legs = self
                .catalog
                .scheduled_flights(&query.origin, transit, date)
                .await?;

            for first in first_legs {
                let second = self
                    .catalog
                    .earliest_connection(
                        transit,
                        &query.destination,
                        date,
                        next_day,
                        first.arrival_at,
                    )
                    .await?;
                if let Some(second) = second {
                    tracing::debug!(
                        transit = %transit,
                        first = %first.flight_number,
                        second = %second.flight_number,
                        "Transit route found"
                    );
                    return Ok(Some(TransitRoute::connect(first, second)));
                }
            }
        }

        Ok(None)
    }
}

/// Check that `flights` (fetched for `ids`) form a bookable route from
/// `origin` to `destination`. Returns the flights in hop order.
///
/// # Errors
///
/// Returns [`BookingError::BadRequest`] naming the first defect found.
pub fn validate_flight_route(
    ids: &[FlightInstanceId],
    mut flights: Vec<FlightInstance>,
    origin: &AirportCode,
    destination: &AirportCode,
) -> Result<Vec<FlightInstance>> {
    check_flight_ids(ids)?;

    if flights.len() != ids.len() {
        return Err(BookingError::bad_request(
            "One or more flight instances not found",
        ));
    }

    let unavailable: Vec<&str> = flights
        .iter()
        .filter(|f| !f.is_bookable())
        .map(|f| f.flight_number.as_str())
        .collect();
    if !unavailable.is_empty() {
        return Err(BookingError::bad_request(format!(
            "Flights are not available for booking: {}",
            unavailable.join(", ")
        )));
    }

    match flights.len() {
        1 => {
            let flight = &flights[0];
            if &flight.origin != origin || &flight.destination != destination {
                return Err(BookingError::bad_request(
                    "Flight route does not match booking origin and destination",
                ));
            }
        }
        2 => {
            flights.sort_by_key(|f| f.departure_at);
            let (first, second) = (&flights[0], &flights[1]);
            if &first.origin != origin {
                return Err(BookingError::bad_request(
                    "First flight must depart from booking origin",
                ));
            }
            if &second.destination != destination {
                return Err(BookingError::bad_request(
                    "Second flight must arrive at booking destination",
                ));
            }
            if first.destination != second.origin {
                return Err(BookingError::bad_request(
                    "Transit flights must be connected (first arrival = second departure airport)",
                ));
            }
            if second.departure_at <= first.arrival_at {
                return Err(BookingError::bad_request(
                    "Invalid transit timing - insufficient layover time",
                ));
            }
            if second.departure_at - first.arrival_at > chrono::Duration::hours(MAX_LAYOVER_HOURS) {
                return Err(BookingError::bad_request(
                    "Layover time exceeds maximum allowed duration (24 hours)",
                ));
            }
        }
        _ => return Err(invalid_flight_count()),
    }

    Ok(flights)
}

/// Reject empty, oversized or duplicated flight id lists.
///
/// # Errors
///
/// Returns [`BookingError::BadRequest`] on any of those.
pub fn check_flight_ids(ids: &[FlightInstanceId]) -> Result<()> {
    if !(1..=2).contains(&ids.len()) {
        return Err(invalid_flight_count());
    }
    let unique: HashSet<_> = ids.iter().collect();
    if unique.len() != ids.len() {
        return Err(BookingError::bad_request(
            "Duplicate flight instances in request",
        ));
    }
    Ok(())
}

fn invalid_flight_count() -> BookingError {
    BookingError::bad_request(
        "Invalid number of flights. Only direct (1) or transit (2) flights allowed",
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::FlightStatus;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn code(s: &str) -> AirportCode {
        AirportCode::parse(s).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, hour, 0, 0).unwrap()
    }

    fn flight(
        number: &str,
        from: &str,
        to: &str,
        dep: DateTime<Utc>,
        arr: DateTime<Utc>,
    ) -> FlightInstance {
        FlightInstance {
            id: FlightInstanceId::new(),
            flight_number: number.to_string(),
            airline_name: "Test Air".to_string(),
            origin: code(from),
            destination: code(to),
            departure_at: dep,
            arrival_at: arr,
            operate_date: dep.date_naive(),
            status: FlightStatus::Scheduled,
        }
    }

    fn ids(flights: &[FlightInstance]) -> Vec<FlightInstanceId> {
        flights.iter().map(|f| f.id).collect()
    }

    #[test]
    fn test_format_duration_floors() {
        assert_eq!(format_duration(at(1, 10), at(1, 20)), "10h 0m");
        let end = at(1, 10) + chrono::Duration::seconds(59);
        assert_eq!(format_duration(at(1, 10), end), "0h 0m");
        assert_eq!(format_duration(at(1, 10), at(2, 12)), "26h 0m");
    }

    #[test]
    fn test_transit_route_durations() {
        let first = flight("QR1", "DEL", "DOH", at(1, 10), at(1, 13));
        let second = flight("QR2", "DOH", "DXB", at(1, 16), at(1, 20));
        let route = TransitRoute::connect(first, second);
        assert_eq!(route.transit_airport.as_str(), "DOH");
        assert_eq!(route.layover_duration, "3h 0m");
        assert_eq!(route.total_duration, "10h 0m");
    }

    #[test]
    fn test_query_rejects_same_endpoints_and_bad_dates() {
        assert!(RouteQuery::parse("DEL", "del", "2026-06-01").is_err());
        assert!(RouteQuery::parse("DEL", "DXB", "01/06/2026").is_err());
        let q = RouteQuery::parse("del", "dxb", "2026-06-01").unwrap();
        assert_eq!(q.origin.as_str(), "DEL");
        assert!(q.ensure_not_past(NaiveDate::from_ymd_opt(2026, 6, 2).unwrap()).is_err());
        assert!(q.ensure_not_past(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()).is_ok());
        assert_eq!(q.days_until_departure(NaiveDate::from_ymd_opt(2026, 5, 25).unwrap()), 7);
    }

    #[test]
    fn test_direct_route_validation() {
        let f = flight("AI1", "DEL", "DXB", at(1, 8), at(1, 11));
        let ok = validate_flight_route(
            &ids(&[f.clone()]),
            vec![f.clone()],
            &code("DEL"),
            &code("DXB"),
        );
        assert_eq!(ok.unwrap().len(), 1);

        let err = validate_flight_route(&ids(&[f.clone()]), vec![f], &code("DEL"), &code("BOM"))
            .unwrap_err();
        assert_eq!(err.message(), "Flight route does not match booking origin and destination");
    }

    #[test]
    fn test_transit_validation_sorts_by_departure() {
        let first = flight("QR1", "DEL", "DOH", at(1, 10), at(1, 13));
        let second = flight("QR2", "DOH", "DXB", at(1, 16), at(1, 20));
        let requested = ids(&[second.clone(), first.clone()]);
        let ordered =
            validate_flight_route(&requested, vec![second, first], &code("DEL"), &code("DXB"))
                .unwrap();
        assert_eq!(ordered[0].flight_number, "QR1");
        assert_eq!(ordered[1].flight_number, "QR2");
    }

    #[test]
    fn test_transit_validation_defects() {
        let first = flight("QR1", "DEL", "DOH", at(1, 10), at(1, 13));

        let tight = flight("QR2", "DOH", "DXB", at(1, 13), at(1, 16));
        let err = validate_flight_route(
            &ids(&[first.clone(), tight.clone()]),
            vec![first.clone(), tight],
            &code("DEL"),
            &code("DXB"),
        )
        .unwrap_err();
        assert_eq!(err.message(), "Invalid transit timing - insufficient layover time");

        let late = flight("QR3", "DOH", "DXB", at(2, 14), at(2, 18));
        let err = validate_flight_route(
            &ids(&[first.clone(), late.clone()]),
            vec![first.clone(), late],
            &code("DEL"),
            &code("DXB"),
        )
        .unwrap_err();
        assert!(err.message().contains("24 hours"));

        let disconnected = flight("EK4", "BAH", "DXB", at(1, 15), at(1, 17));
        let err = validate_flight_route(
            &ids(&[first.clone(), disconnected.clone()]),
            vec![first, disconnected],
            &code("DEL"),
            &code("DXB"),
        )
        .unwrap_err();
        assert!(err.message().starts_with("Transit flights must be connected"));
    }

    #[test]
    fn test_unavailable_flights_are_named() {
        let mut cancelled = flight("AI9", "DEL", "DXB", at(1, 8), at(1, 11));
        cancelled.status = FlightStatus::Cancelled;
        let err = validate_flight_route(
            &ids(&[cancelled.clone()]),
            vec![cancelled],
            &code("DEL"),
            &code("DXB"),
        )
        .unwrap_err();
        assert_eq!(err.message(), "Flights are not available for booking: AI9");
    }

    #[test]
    fn test_flight_id_list_shape() {
        assert!(check_flight_ids(&[]).is_err());
        let id = FlightInstanceId::new();
        assert!(check_flight_ids(&[id, id]).is_err());
        assert!(check_flight_ids(&[id, FlightInstanceId::new(), FlightInstanceId::new()]).is_err());
        let missing = validate_flight_route(&[id], vec![], &code("DEL"), &code("DXB")).unwrap_err();
        assert_eq!(missing.message(), "One or more flight instances not found");
    }

    proptest! {
        #[test]
        fn prop_format_duration_matches_total_minutes(minutes in 0i64..100_000) {
            let start = at(1, 0);
            let end = start + chrono::Duration::minutes(minutes);
            prop_assert_eq!(
                format_duration(start, end),
                format!("{}h {}m", minutes / 60, minutes % 60)
            );
        }
    }
}
