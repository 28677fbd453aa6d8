//! Command-line surface and dispatch.

use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use std::time::Duration;
use uuid::Uuid;

use freightline_core::{
    Actor, AirportCode, BookingError, BookingTransition, FlightInstanceId, NewBooking, RefId,
    Result, RouteQuery, UserId, UserRole,
};
use freightline_runtime::retry::{RetryPolicy, retry_with_predicate};

use crate::resources::Resources;

/// Freightline air-cargo booking engine.
#[derive(Debug, Parser)]
#[command(name = "freightline", version, about)]
pub struct Cli {
    /// Acting user, recorded on bookings and events.
    #[arg(long, global = true, env = "FREIGHTLINE_USER_ID")]
    pub user_id: Option<Uuid>,

    /// Role of the acting user.
    #[arg(long, global = true, default_value = "operator", value_parser = parse_role)]
    pub role: UserRole,

    /// Retries on a busy booking before giving up.
    #[arg(long, global = true, default_value_t = 0)]
    pub retries: u32,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Actor built from `--user-id` and `--role`.
    #[must_use]
    pub fn actor(&self) -> Option<Actor> {
        self.user_id
            .map(|id| Actor::new(UserId::from_uuid(id), self.role))
    }

    /// Backoff for busy-lock retries.
    #[must_use]
    pub const fn lock_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.retries)
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(2))
            .multiplier(2)
            .build()
    }
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply database migrations.
    Migrate,

    /// Direct flights and the first one-stop itinerary for a date.
    Search(SearchArgs),

    /// Book cargo on one or two flights.
    Book(BookArgs),

    /// Apply a lifecycle event to a booking.
    Transition {
        /// Booking reference, e.g. `DEL_DXB_ABC123`.
        ref_id: String,
        /// One of depart, arrive, deliver, cancel.
        #[arg(value_parser = parse_transition)]
        event: BookingTransition,
        /// Cancellation reason.
        #[arg(long)]
        reason: Option<String>,
    },

    /// Cancel a BOOKED or DEPARTED booking.
    Cancel {
        /// Booking reference.
        ref_id: String,
        /// Cancellation reason.
        #[arg(long)]
        reason: Option<String>,
    },

    /// Booking, flights and timeline.
    History {
        /// Booking reference.
        ref_id: String,
    },

    /// Bookings visible to the acting user, newest first.
    Bookings {
        /// Page size, 1 to 100.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Key counts for the route cache.
    CacheStats,

    /// Drop cached route searches.
    CacheClear {
        /// Only this origin (requires --destination).
        #[arg(long, requires = "destination")]
        origin: Option<String>,
        /// Only this destination (requires --origin).
        #[arg(long, requires = "origin")]
        destination: Option<String>,
    },
}

/// Arguments of `search`.
#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Departure airport.
    #[arg(long)]
    pub origin: String,
    /// Arrival airport.
    #[arg(long)]
    pub destination: String,
    /// Departure date, `YYYY-MM-DD`.
    #[arg(long)]
    pub date: String,
}

/// Arguments of `book`.
#[derive(Debug, Args)]
pub struct BookArgs {
    /// Departure airport.
    #[arg(long)]
    pub origin: String,
    /// Arrival airport.
    #[arg(long)]
    pub destination: String,
    /// Flight instance id; give twice for a transit booking.
    #[arg(long = "flight", required = true)]
    pub flights: Vec<Uuid>,
    /// Number of pieces.
    #[arg(long)]
    pub pieces: i32,
    /// Weight in kilograms.
    #[arg(long)]
    pub weight_kg: i32,
}

fn parse_role(raw: &str) -> std::result::Result<UserRole, String> {
    UserRole::parse(&raw.to_ascii_uppercase())
        .ok_or_else(|| format!("unknown role '{raw}' (expected admin, operator or viewer)"))
}

fn parse_transition(raw: &str) -> std::result::Result<BookingTransition, String> {
    raw.parse::<BookingTransition>().map_err(|e| e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| BookingError::internal(format!("Failed to encode output: {e}")))
}

/// Run `cli.command` and return its JSON output.
///
/// # Errors
///
/// Returns the [`BookingError`] of the underlying operation.
pub async fn run(cli: &Cli, resources: &Resources) -> Result<Value> {
    let actor = cli.actor();
    match &cli.command {
        Command::Migrate => {
            // Resources apply migrations on startup.
            Ok(json!({ "migrated": true }))
        }
        Command::Search(args) => {
            let query = RouteQuery::parse(&args.origin, &args.destination, &args.date)?;
            let found = resources.route_search().search(&query).await?;
            to_json(&found)
        }
        Command::Book(args) => {
            let request = NewBooking {
                origin: AirportCode::parse(&args.origin)?,
                destination: AirportCode::parse(&args.destination)?,
                flight_instance_ids: args
                    .flights
                    .iter()
                    .copied()
                    .map(FlightInstanceId::from_uuid)
                    .collect(),
                pieces: args.pieces,
                weight_kg: args.weight_kg,
            };
            let created = resources
                .booking_engine()
                .create(request, actor.as_ref())
                .await?;
            to_json(&created)
        }
        Command::Transition {
            ref_id,
            event,
            reason,
        } => {
            let engine = resources.booking_engine();
            let ref_id = RefId::parse(ref_id)?;
            let outcome = retry_with_predicate(
                &cli.lock_retry_policy(),
                || engine.transition(&ref_id, *event, reason.as_deref(), actor.as_ref()),
                BookingError::is_retryable,
            )
            .await?;
            to_json(&outcome)
        }
        Command::Cancel { ref_id, reason } => {
            let engine = resources.booking_engine();
            let ref_id = RefId::parse(ref_id)?;
            let outcome = retry_with_predicate(
                &cli.lock_retry_policy(),
                || engine.cancel(&ref_id, reason.as_deref(), actor.as_ref()),
                BookingError::is_retryable,
            )
            .await?;
            to_json(&outcome)
        }
        Command::History { ref_id } => {
            let history = resources
                .booking_engine()
                .history(&RefId::parse(ref_id)?)
                .await?;
            to_json(&history)
        }
        Command::Bookings { limit } => {
            let actor = actor.ok_or_else(|| {
                BookingError::bad_request("--user-id is required to list bookings")
            })?;
            let page = resources.booking_engine().list(&actor, *limit).await?;
            to_json(&page)
        }
        Command::CacheStats => match resources.route_cache() {
            Some(cache) => to_json(&cache.stats().await),
            None => Ok(json!({ "enabled": false })),
        },
        Command::CacheClear {
            origin,
            destination,
        } => {
            let Some(cache) = resources.route_cache() else {
                return Ok(json!({ "enabled": false, "removed": 0 }));
            };
            let removed = match (origin, destination) {
                (Some(origin), Some(destination)) => {
                    let origin = AirportCode::parse(origin)?;
                    let destination = AirportCode::parse(destination)?;
                    cache.invalidate_route(&origin, &destination).await
                }
                _ => cache.clear().await,
            };
            Ok(json!({ "removed": removed }))
        }
    }
}
