//! Builders for flights, bookings and a small seeded network.
//!
//! The seeded network (all times UTC, operating 2026-06-01):
//!
//! | Flight | Route | Departs | Arrives |
//! |---|---|---|---|
//! | AI995 | DEL-DXB | 08:00 | 11:30 |
//! | QR571 | DEL-DOH | 10:00 | 13:00 |
//! | QR1014 | DOH-DXB | 16:00 | 20:00 |
//!
//! DOH is the only permitted transit airport for DEL-DXB.

#![allow(clippy::expect_used)]

use chrono::{DateTime, Utc};

use freightline_core::{
    Actor, AirportCode, Booking, BookingId, BookingStatus, FlightInstance, FlightInstanceId,
    FlightStatus, RefId, UserId, UserRole,
};

use crate::store::InMemoryStore;

/// Date every seeded flight operates on.
pub const NETWORK_DATE: &str = "2026-06-01";

/// Parse an airport code literal.
///
/// # Panics
///
/// Panics if `code` is not three letters.
#[must_use]
pub fn airport(code: &str) -> AirportCode {
    AirportCode::parse(code).expect("fixture airport code should be valid")
}

/// Parse an RFC 3339 timestamp literal.
///
/// # Panics
///
/// Panics if `s` is not RFC 3339.
#[must_use]
pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("fixture timestamp should be RFC 3339")
        .with_timezone(&Utc)
}

/// A SCHEDULED flight operating on its departure date.
///
/// # Panics
///
/// Panics if a code or timestamp literal is malformed.
#[must_use]
pub fn flight(
    number: &str,
    origin: &str,
    destination: &str,
    departs: &str,
    arrives: &str,
) -> FlightInstance {
    let departure_at = utc(departs);
    FlightInstance {
        id: FlightInstanceId::new(),
        flight_number: number.to_string(),
        airline_name: airline_for(number).to_string(),
        origin: airport(origin),
        destination: airport(destination),
        departure_at,
        arrival_at: utc(arrives),
        operate_date: departure_at.date_naive(),
        status: FlightStatus::Scheduled,
    }
}

fn airline_for(number: &str) -> &'static str {
    match number.get(..2) {
        Some("AI") => "Air India",
        Some("QR") => "Qatar Airways",
        Some("EK") => "Emirates",
        _ => "Freightline Test Carrier",
    }
}

/// A booking row with a fixed reference derived from the route.
///
/// # Panics
///
/// Panics if a code literal is malformed.
#[must_use]
pub fn booking(origin: &str, destination: &str, status: BookingStatus) -> Booking {
    let created_at = utc("2026-05-30T06:00:00Z");
    Booking {
        id: BookingId::new(),
        ref_id: RefId::new(format!("{origin}_{destination}_TST001")),
        origin: airport(origin),
        destination: airport(destination),
        pieces: 4,
        weight_kg: 250,
        status,
        created_by: None,
        created_at,
        updated_at: created_at,
    }
}

/// An operator with a fresh user id.
#[must_use]
pub fn operator() -> Actor {
    Actor::new(UserId::new(), UserRole::Operator)
}

/// An admin with a fresh user id.
#[must_use]
pub fn admin() -> Actor {
    Actor::new(UserId::new(), UserRole::Admin)
}

/// Flights of the seeded network.
#[derive(Debug, Clone)]
pub struct Network {
    /// AI995 DEL-DXB.
    pub direct: FlightInstance,
    /// QR571 DEL-DOH.
    pub first_leg: FlightInstance,
    /// QR1014 DOH-DXB.
    pub second_leg: FlightInstance,
}

/// Seed `store` with the DEL-DXB network described in the module docs.
///
/// # Panics
///
/// Panics if a fixture literal is malformed.
pub async fn seed_network(store: &InMemoryStore) -> Network {
    let network = Network {
        direct: flight("AI995", "DEL", "DXB", "2026-06-01T08:00:00Z", "2026-06-01T11:30:00Z"),
        first_leg: flight("QR571", "DEL", "DOH", "2026-06-01T10:00:00Z", "2026-06-01T13:00:00Z"),
        second_leg: flight("QR1014", "DOH", "DXB", "2026-06-01T16:00:00Z", "2026-06-01T20:00:00Z"),
    };
    store.insert_flight(network.direct.clone()).await;
    store.insert_flight(network.first_leg.clone()).await;
    store.insert_flight(network.second_leg.clone()).await;
    store
        .permit_transit(&airport("DEL"), &airport("DXB"), &airport("DOH"))
        .await;
    network
}
