//! Booking lifecycle state machine.
//!
//! ```text
//! BOOKED ──depart──▶ DEPARTED ──arrive──▶ ARRIVED ──deliver──▶ DELIVERED
//!   │                   │
//!   └──────cancel───────┴──────────▶ CANCELLED
//! ```
//!
//! [`plan_transition`] is pure: it evaluates the guard against the locked
//! booking row and describes the writes to perform. The engine applies the
//! plan inside the transaction and rolls back on any error value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BookingError;
use crate::types::{Actor, Booking, BookingStatus, EntityType, NewEvent};

/// Reason recorded when a cancellation carries none.
pub const DEFAULT_CANCEL_REASON: &str = "Booking cancelled by user";

/// A status-changing event applied to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingTransition {
    /// BOOKED to DEPARTED.
    Depart,
    /// DEPARTED to ARRIVED.
    Arrive,
    /// ARRIVED to DELIVERED.
    Deliver,
    /// BOOKED or DEPARTED to CANCELLED.
    Cancel,
}

impl BookingTransition {
    /// Lower-case name, used as metrics label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Depart => "depart",
            Self::Arrive => "arrive",
            Self::Deliver => "deliver",
            Self::Cancel => "cancel",
        }
    }

    /// Status reached when the transition succeeds.
    #[must_use]
    pub const fn target(&self) -> BookingStatus {
        match self {
            Self::Depart => BookingStatus::Departed,
            Self::Arrive => BookingStatus::Arrived,
            Self::Deliver => BookingStatus::Delivered,
            Self::Cancel => BookingStatus::Cancelled,
        }
    }
}

impl fmt::Display for BookingTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingTransition {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "depart" | "departed" => Ok(Self::Depart),
            "arrive" | "arrived" => Ok(Self::Arrive),
            "deliver" | "delivered" => Ok(Self::Deliver),
            "cancel" | "cancelled" => Ok(Self::Cancel),
            other => Err(BookingError::bad_request(format!(
                "Unknown booking event '{other}'"
            ))),
        }
    }
}

impl BookingStatus {
    /// Status reached by applying `transition`, or `None` if the edge does
    /// not exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use freightline_core::{BookingStatus, BookingTransition};
    ///
    /// assert_eq!(
    ///     BookingStatus::Booked.apply(BookingTransition::Depart),
    ///     Some(BookingStatus::Departed)
    /// );
    /// assert_eq!(BookingStatus::Booked.apply(BookingTransition::Arrive), None);
    /// ```
    #[must_use]
    pub const fn apply(self, transition: BookingTransition) -> Option<Self> {
        match (self, transition) {
            (Self::Booked, BookingTransition::Depart) => Some(Self::Departed),
            (Self::Departed, BookingTransition::Arrive) => Some(Self::Arrived),
            (Self::Arrived, BookingTransition::Deliver) => Some(Self::Delivered),
            (Self::Booked | Self::Departed, BookingTransition::Cancel) => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns `true` if the booking may still be cancelled.
    #[must_use]
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, Self::Booked | Self::Departed)
    }
}

/// Writes to perform for an accepted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    /// Status to store.
    pub new_status: BookingStatus,
    /// Timestamp for `updated_at` and the event.
    pub transitioned_at: DateTime<Utc>,
    /// Audit event to append.
    pub event: NewEvent,
}

/// Evaluate the guard for `transition` against `booking` and describe the
/// resulting writes.
///
/// # Errors
///
/// Returns [`BookingError::BadRequest`] naming the current and required
/// status when the edge does not exist.
pub fn plan_transition(
    booking: &Booking,
    transition: BookingTransition,
    reason: Option<&str>,
    actor: Option<&Actor>,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, BookingError> {
    let Some(new_status) = booking.status.apply(transition) else {
        return Err(guard_violation(transition, booking.status));
    };

    let ref_id = &booking.ref_id;
    let (location, description) = match transition {
        BookingTransition::Depart => (
            booking.origin.clone(),
            format!("Booking with ref {ref_id} has departed from {}", booking.origin),
        ),
        BookingTransition::Arrive => (
            booking.destination.clone(),
            format!("Booking with ref {ref_id} has arrived at {}", booking.destination),
        ),
        BookingTransition::Deliver => (
            booking.destination.clone(),
            format!(
                "Booking with ref {ref_id} has been delivered at {}",
                booking.destination
            ),
        ),
        BookingTransition::Cancel => (
            booking.origin.clone(),
            format!(
                "Booking with ref {ref_id} cancelled: {}",
                cancel_reason(reason)
            ),
        ),
    };

    Ok(TransitionPlan {
        new_status,
        transitioned_at: now,
        event: NewEvent {
            entity_type: EntityType::Booking,
            entity_id: booking.id.as_uuid(),
            event_type: new_status,
            location: Some(location),
            description,
            created_by: actor.map(|a| a.user_id),
            created_at: now,
        },
    })
}

/// The reason to record for a cancellation.
#[must_use]
pub fn cancel_reason(reason: Option<&str>) -> &str {
    match reason.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => DEFAULT_CANCEL_REASON,
    }
}

fn guard_violation(transition: BookingTransition, current: BookingStatus) -> BookingError {
    let message = match transition {
        BookingTransition::Depart => format!(
            "Cannot mark as departed: Booking must be in BOOKED status, but current status is {current}"
        ),
        BookingTransition::Arrive => format!(
            "Cannot mark as arrived: Booking must be in DEPARTED status, but current status is {current}"
        ),
        BookingTransition::Deliver => format!(
            "Cannot mark as delivered: Booking must be in ARRIVED status, but current status is {current}"
        ),
        BookingTransition::Cancel => format!(
            "Cannot cancel booking with status '{current}'. Only bookings with status 'BOOKED' or 'DEPARTED' can be cancelled."
        ),
    };
    BookingError::BadRequest(message)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{AirportCode, BookingId, RefId, UserId, UserRole};
    use chrono::TimeZone;

    const ALL_STATUSES: [BookingStatus; 5] = [
        BookingStatus::Booked,
        BookingStatus::Departed,
        BookingStatus::Arrived,
        BookingStatus::Delivered,
        BookingStatus::Cancelled,
    ];

    const ALL_TRANSITIONS: [BookingTransition; 4] = [
        BookingTransition::Depart,
        BookingTransition::Arrive,
        BookingTransition::Deliver,
        BookingTransition::Cancel,
    ];

    fn booking(status: BookingStatus) -> Booking {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        Booking {
            id: BookingId::new(),
            ref_id: RefId::new("DEL_DXB_ABC123"),
            origin: AirportCode::parse("DEL").unwrap(),
            destination: AirportCode::parse("DXB").unwrap(),
            pieces: 3,
            weight_kg: 120,
            status,
            created_by: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_transition_table_is_exhaustive() {
        let mut allowed = Vec::new();
        for status in ALL_STATUSES {
            for transition in ALL_TRANSITIONS {
                if let Some(next) = status.apply(transition) {
                    allowed.push((status, transition, next));
                }
            }
        }
        assert_eq!(
            allowed,
            vec![
                (BookingStatus::Booked, BookingTransition::Depart, BookingStatus::Departed),
                (BookingStatus::Booked, BookingTransition::Cancel, BookingStatus::Cancelled),
                (BookingStatus::Departed, BookingTransition::Arrive, BookingStatus::Arrived),
                (BookingStatus::Departed, BookingTransition::Cancel, BookingStatus::Cancelled),
                (BookingStatus::Arrived, BookingTransition::Deliver, BookingStatus::Delivered),
            ]
        );
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in ALL_STATUSES.into_iter().filter(BookingStatus::is_terminal) {
            for transition in ALL_TRANSITIONS {
                assert_eq!(status.apply(transition), None);
            }
        }
    }

    #[test]
    fn test_depart_records_origin() {
        let plan = plan_transition(
            &booking(BookingStatus::Booked),
            BookingTransition::Depart,
            None,
            None,
            now(),
        )
        .unwrap();
        assert_eq!(plan.new_status, BookingStatus::Departed);
        assert_eq!(plan.event.event_type, BookingStatus::Departed);
        assert_eq!(plan.event.location.unwrap().as_str(), "DEL");
        assert_eq!(
            plan.event.description,
            "Booking with ref DEL_DXB_ABC123 has departed from DEL"
        );
        assert_eq!(plan.transitioned_at, now());
    }

    #[test]
    fn test_arrive_and_deliver_record_destination() {
        let arrive = plan_transition(
            &booking(BookingStatus::Departed),
            BookingTransition::Arrive,
            None,
            None,
            now(),
        )
        .unwrap();
        assert_eq!(arrive.event.location.unwrap().as_str(), "DXB");

        let deliver = plan_transition(
            &booking(BookingStatus::Arrived),
            BookingTransition::Deliver,
            None,
            None,
            now(),
        )
        .unwrap();
        assert_eq!(deliver.event.location.unwrap().as_str(), "DXB");
        assert!(deliver.event.description.contains("DEL_DXB_ABC123"));
    }

    #[test]
    fn test_arrive_on_booked_names_both_statuses() {
        let err = plan_transition(
            &booking(BookingStatus::Booked),
            BookingTransition::Arrive,
            None,
            None,
            now(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.message().contains("DEPARTED"));
        assert!(err.message().contains("BOOKED"));
    }

    #[test]
    fn test_cancel_delivered_is_rejected() {
        let err = plan_transition(
            &booking(BookingStatus::Delivered),
            BookingTransition::Cancel,
            Some("customer request"),
            None,
            now(),
        )
        .unwrap_err();
        assert_eq!(
            err.message(),
            "Cannot cancel booking with status 'DELIVERED'. Only bookings with status 'BOOKED' or 'DEPARTED' can be cancelled."
        );
    }

    #[test]
    fn test_cancel_carries_reason_and_actor() {
        let actor = Actor::new(UserId::new(), UserRole::Operator);
        let plan = plan_transition(
            &booking(BookingStatus::Departed),
            BookingTransition::Cancel,
            Some("shipper withdrew"),
            Some(&actor),
            now(),
        )
        .unwrap();
        assert_eq!(plan.new_status, BookingStatus::Cancelled);
        assert!(plan.event.description.contains("shipper withdrew"));
        assert_eq!(plan.event.created_by, Some(actor.user_id));
        assert_eq!(plan.event.location.unwrap().as_str(), "DEL");
    }

    #[test]
    fn test_cancel_reason_defaults() {
        assert_eq!(cancel_reason(None), DEFAULT_CANCEL_REASON);
        assert_eq!(cancel_reason(Some("   ")), DEFAULT_CANCEL_REASON);
        assert_eq!(cancel_reason(Some(" damaged ")), "damaged");
    }

    #[test]
    fn test_parse_transition_names() {
        assert_eq!("depart".parse::<BookingTransition>().unwrap(), BookingTransition::Depart);
        assert_eq!("DELIVERED".parse::<BookingTransition>().unwrap(), BookingTransition::Deliver);
        assert!("teleport".parse::<BookingTransition>().is_err());
    }
}
