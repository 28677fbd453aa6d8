//! Domain types for bookings, flights, routes and audit events.
//!
//! All records are plain data and `Clone`. Persistence backends map their
//! rows into these types; nothing here performs I/O.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::BookingError;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// The underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a booking.
    BookingId
);
uuid_id!(
    /// Unique identifier for a scheduled flight instance.
    FlightInstanceId
);
uuid_id!(
    /// Unique identifier for an audit event.
    EventId
);
uuid_id!(
    /// Unique identifier for a user.
    UserId
);

/// IATA-style airport code: exactly three ASCII letters, stored upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AirportCode(String);

impl AirportCode {
    /// Parse and normalise an airport code.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BadRequest`] unless the trimmed input is exactly
    /// three ASCII letters.
    ///
    /// # Examples
    ///
    /// ```
    /// use freightline_core::AirportCode;
    ///
    /// assert_eq!(AirportCode::parse("del").unwrap().as_str(), "DEL");
    /// assert!(AirportCode::parse("DE1").is_err());
    /// ```
    pub fn parse(code: &str) -> Result<Self, BookingError> {
        let code = code.trim();
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(BookingError::bad_request(format!(
                "Invalid airport code '{code}': expected three letters"
            )))
        }
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AirportCode {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AirportCode> for String {
    fn from(code: AirportCode) -> Self {
        code.0
    }
}

impl fmt::Display for AirportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable booking reference, `<ORIGIN>_<DEST>_<AAA999>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefId(String);

impl RefId {
    /// Wrap an existing reference string without checking it.
    ///
    /// Use [`RefId::parse`] for caller input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a caller-supplied reference, normalising it to upper case.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BadRequest`] unless the input has the shape
    /// `AAA_BBB_XXX999`.
    ///
    /// # Examples
    ///
    /// ```
    /// use freightline_core::RefId;
    ///
    /// assert_eq!(RefId::parse(" del_dxb_abc123 ").unwrap().as_str(), "DEL_DXB_ABC123");
    /// assert!(RefId::parse("DEL_DXB_123ABC").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, BookingError> {
        let candidate = raw.trim().to_ascii_uppercase();
        let bytes = candidate.as_bytes();
        let well_formed = bytes.len() == 14
            && bytes[3] == b'_'
            && bytes[7] == b'_'
            && bytes[..3]
                .iter()
                .chain(&bytes[4..7])
                .chain(&bytes[8..11])
                .all(u8::is_ascii_uppercase)
            && bytes[11..].iter().all(u8::is_ascii_digit);
        if well_formed {
            Ok(Self(candidate))
        } else {
            Err(BookingError::bad_request(format!(
                "Invalid booking reference '{}': expected ORIGIN_DEST_ABC123",
                raw.trim()
            )))
        }
    }

    /// Generate a fresh reference for a route: three random upper-case letters
    /// followed by three random digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use freightline_core::{AirportCode, RefId};
    ///
    /// let origin = AirportCode::parse("DEL").unwrap();
    /// let destination = AirportCode::parse("DXB").unwrap();
    /// let ref_id = RefId::generate(&origin, &destination, &mut rand::thread_rng());
    /// assert!(ref_id.as_str().starts_with("DEL_DXB_"));
    /// assert_eq!(ref_id.as_str().len(), 14);
    /// ```
    pub fn generate<R: Rng + ?Sized>(
        origin: &AirportCode,
        destination: &AirportCode,
        rng: &mut R,
    ) -> Self {
        let mut code = String::with_capacity(6);
        for _ in 0..3 {
            code.push(char::from(b'A' + rng.gen_range(0..26u8)));
        }
        for _ in 0..3 {
            code.push(char::from(b'0' + rng.gen_range(0..10u8)));
        }
        Self(format!("{origin}_{destination}_{code}"))
    }

    /// The reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Status Enums
// ═══════════════════════════════════════════════════════════════════════

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Created, awaiting departure.
    Booked,
    /// Cargo has left the origin.
    Departed,
    /// Cargo has reached the destination.
    Arrived,
    /// Cargo handed over. Terminal.
    Delivered,
    /// Booking cancelled. Terminal.
    Cancelled,
}

impl BookingStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Booked => "BOOKED",
            Self::Departed => "DEPARTED",
            Self::Arrived => "ARRIVED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse the database / wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BOOKED" => Some(Self::Booked),
            "DEPARTED" => Some(Self::Departed),
            "ARRIVED" => Some(Self::Arrived),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns `true` if no transition leaves this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational status of a flight instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    /// Open for booking.
    Scheduled,
    /// In the air.
    Departed,
    /// Landed.
    Arrived,
    /// Will not operate.
    Cancelled,
}

impl FlightStatus {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Departed => "DEPARTED",
            Self::Arrived => "ARRIVED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse the database / wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(Self::Scheduled),
            "DEPARTED" => Some(Self::Departed),
            "ARRIVED" => Some(Self::Arrived),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Role of a calling user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Sees every booking.
    Admin,
    /// Books and moves cargo.
    Operator,
    /// Read-only.
    Viewer,
}

impl UserRole {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Operator => "OPERATOR",
            Self::Viewer => "VIEWER",
        }
    }

    /// Parse the database / wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Self::Admin),
            "OPERATOR" => Some(Self::Operator),
            "VIEWER" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// Kind of entity an audit event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// A cargo booking.
    Booking,
}

impl EntityType {
    /// Database / wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Booking => "BOOKING",
        }
    }

    /// Parse the database / wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BOOKING" => Some(Self::Booking),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════

/// Identity of the caller, recorded on bookings and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Calling user.
    pub user_id: UserId,
    /// Role of the calling user.
    pub role: UserRole,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub const fn new(user_id: UserId, role: UserRole) -> Self {
        Self { user_id, role }
    }

    /// Returns `true` if this actor may see every booking.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}

/// A persisted cargo booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Surrogate key.
    pub id: BookingId,
    /// Human-readable, immutable reference.
    pub ref_id: RefId,
    /// Departure airport.
    pub origin: AirportCode,
    /// Arrival airport.
    pub destination: AirportCode,
    /// Number of pieces, at least 1.
    pub pieces: i32,
    /// Weight in kilograms, at least 1.
    pub weight_kg: i32,
    /// Current lifecycle status.
    pub status: BookingStatus,
    /// Owning user, if any.
    pub created_by: Option<UserId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

/// Request to create a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    /// Departure airport.
    pub origin: AirportCode,
    /// Arrival airport.
    pub destination: AirportCode,
    /// One (direct) or two (transit) flight instances.
    pub flight_instance_ids: Vec<FlightInstanceId>,
    /// Number of pieces.
    pub pieces: i32,
    /// Weight in kilograms.
    pub weight_kg: i32,
}

impl NewBooking {
    /// Check the request shape before touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BadRequest`] when origin equals destination,
    /// pieces or weight are below one, or the flight list is empty.
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.origin == self.destination {
            return Err(BookingError::bad_request(
                "Origin and destination must be different",
            ));
        }
        if self.pieces < 1 {
            return Err(BookingError::bad_request("Pieces must be at least 1"));
        }
        if self.weight_kg < 1 {
            return Err(BookingError::bad_request("Weight must be at least 1 kg"));
        }
        if self.flight_instance_ids.is_empty() {
            return Err(BookingError::bad_request(
                "At least one flight instance is required",
            ));
        }
        Ok(())
    }
}

/// A concrete, dated flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightInstance {
    /// Surrogate key.
    pub id: FlightInstanceId,
    /// Carrier flight number, e.g. `AI101`.
    pub flight_number: String,
    /// Operating carrier.
    pub airline_name: String,
    /// Departure airport.
    pub origin: AirportCode,
    /// Arrival airport.
    pub destination: AirportCode,
    /// Departure time (UTC).
    pub departure_at: DateTime<Utc>,
    /// Arrival time (UTC).
    pub arrival_at: DateTime<Utc>,
    /// Calendar date at the origin.
    pub operate_date: NaiveDate,
    /// Operational status.
    pub status: FlightStatus,
}

impl FlightInstance {
    /// Only scheduled flights accept bookings.
    #[must_use]
    pub const fn is_bookable(&self) -> bool {
        matches!(self.status, FlightStatus::Scheduled)
    }
}

/// Network entry gating which transit airports are eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Departure airport.
    pub origin: AirportCode,
    /// Arrival airport.
    pub destination: AirportCode,
    /// Permitted stop, `None` for the direct entry.
    pub transit_airport: Option<AirportCode>,
    /// Inactive routes are ignored.
    pub is_active: bool,
}

/// Association of a booking with one of its flights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightLink {
    /// Linked flight.
    pub flight_instance_id: FlightInstanceId,
    /// 1 for the first leg, 2 for the second.
    pub hop_order: i16,
}

/// A flight as it appears on a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedFlight {
    /// 1 for the first leg, 2 for the second.
    pub hop_order: i16,
    /// The flight itself.
    #[serde(flatten)]
    pub flight: FlightInstance,
}

/// Immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Surrogate key.
    pub id: EventId,
    /// Kind of entity.
    pub entity_type: EntityType,
    /// Id of the entity.
    pub entity_id: Uuid,
    /// Status the entity moved to.
    pub event_type: BookingStatus,
    /// Airport where the event happened.
    pub location: Option<AirportCode>,
    /// Human-readable summary.
    pub description: String,
    /// Acting user, if any.
    pub created_by: Option<UserId>,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// An event about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    /// Kind of entity.
    pub entity_type: EntityType,
    /// Id of the entity.
    pub entity_id: Uuid,
    /// Status the entity moved to.
    pub event_type: BookingStatus,
    /// Airport where the event happened.
    pub location: Option<AirportCode>,
    /// Human-readable summary.
    pub description: String,
    /// Acting user, if any.
    pub created_by: Option<UserId>,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

impl NewEvent {
    /// Event recorded when a booking is created.
    #[must_use]
    pub fn booking_created(booking: &Booking) -> Self {
        Self {
            entity_type: EntityType::Booking,
            entity_id: booking.id.as_uuid(),
            event_type: BookingStatus::Booked,
            location: Some(booking.origin.clone()),
            description: format!("Booking created with reference {}", booking.ref_id),
            created_by: booking.created_by,
            created_at: booking.created_at,
        }
    }

    /// Assign an id, producing the stored form.
    #[must_use]
    pub fn into_event(self, id: EventId) -> Event {
        Event {
            id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            event_type: self.event_type,
            location: self.location,
            description: self.description,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Operation Results
// ═══════════════════════════════════════════════════════════════════════

/// A booking together with its flights in hop order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    /// The booking.
    pub booking: Booking,
    /// Linked flights, hop 1 first.
    pub flights: Vec<BookedFlight>,
}

/// Result of a successful status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    /// Booking after the transition.
    pub booking: Booking,
    /// The appended audit event.
    pub event: Event,
    /// When the transition happened.
    pub transitioned_at: DateTime<Utc>,
}

/// Result of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationOutcome {
    /// Booking after cancellation.
    pub booking: Booking,
    /// Reason recorded on the event.
    pub cancellation_reason: String,
    /// When the booking was cancelled.
    pub cancelled_at: DateTime<Utc>,
}

/// Full audit view of a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingHistory {
    /// The booking.
    pub booking: Booking,
    /// Linked flights, hop 1 first.
    pub flights: Vec<BookedFlight>,
    /// Events, newest first.
    pub timeline: Vec<Event>,
}

/// One page of bookings, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPage {
    /// Bookings on this page.
    pub bookings: Vec<Booking>,
    /// Effective page size.
    pub limit: u32,
    /// Heuristic: the page came back full.
    pub has_more: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn code(s: &str) -> AirportCode {
        AirportCode::parse(s).unwrap()
    }

    #[test]
    fn test_airport_code_normalises_case_and_whitespace() {
        assert_eq!(code(" doh ").as_str(), "DOH");
    }

    #[test]
    fn test_airport_code_rejects_wrong_shapes() {
        for bad in ["", "DE", "DELH", "D3L", "ÄBC"] {
            assert!(AirportCode::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_airport_code_deserialize_validates() {
        let ok: AirportCode = serde_json::from_str("\"dxb\"").unwrap();
        assert_eq!(ok.as_str(), "DXB");
        assert!(serde_json::from_str::<AirportCode>("\"dubai\"").is_err());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            BookingStatus::Booked,
            BookingStatus::Departed,
            BookingStatus::Arrived,
            BookingStatus::Delivered,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("LOST"), None);
        assert_eq!(FlightStatus::parse("SCHEDULED"), Some(FlightStatus::Scheduled));
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&BookingStatus::Delivered).unwrap();
        assert_eq!(json, "\"DELIVERED\"");
    }

    #[test]
    fn test_new_booking_validation() {
        let base = NewBooking {
            origin: code("DEL"),
            destination: code("DXB"),
            flight_instance_ids: vec![FlightInstanceId::new()],
            pieces: 2,
            weight_kg: 150,
        };
        assert!(base.validate().is_ok());

        let same = NewBooking {
            destination: code("DEL"),
            ..base.clone()
        };
        assert!(same.validate().is_err());

        let empty = NewBooking {
            pieces: 0,
            ..base.clone()
        };
        assert!(empty.validate().is_err());

        let weightless = NewBooking {
            weight_kg: 0,
            ..base
        };
        assert!(weightless.validate().is_err());
    }

    #[test]
    fn test_ref_id_parse_rejects_wrong_shapes() {
        for bad in [
            "",
            "DEL_DXB",
            "DEL_DXB_ABC12",
            "DEL_DXB_ABC1234",
            "DEL-DXB-ABC123",
            "DEL_DXB_123ABC",
            "DE1_DXB_ABC123",
            "DEL_DXB_ÄBC123",
            "DEL_DXB_ABC123; DROP TABLE bookings",
        ] {
            let err = RefId::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest, "{bad} should be rejected");
        }
    }

    #[test]
    fn test_ref_id_parse_normalises_case() {
        assert_eq!(RefId::parse("bom_lhr_xyz789").unwrap(), RefId::new("BOM_LHR_XYZ789"));
    }

    proptest! {
        #[test]
        fn prop_generated_ref_ids_have_expected_shape(seed in any::<u64>()) {
            use rand::SeedableRng;
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let ref_id = RefId::generate(&code("BOM"), &code("LHR"), &mut rng);
            let suffix = ref_id.as_str().strip_prefix("BOM_LHR_").unwrap();
            prop_assert_eq!(suffix.len(), 6);
            prop_assert!(suffix[..3].bytes().all(|b| b.is_ascii_uppercase()));
            prop_assert!(suffix[3..].bytes().all(|b| b.is_ascii_digit()));
            prop_assert_eq!(RefId::parse(ref_id.as_str()).unwrap(), ref_id);
        }
    }
}
