//! Metric names shared by every crate that records them.
//!
//! Recording goes through the `metrics` facade at the call site; the
//! exporter in `freightline-runtime` describes these names.

/// Route cache hits.
pub const ROUTE_CACHE_HITS: &str = "freightline.route_cache.hits";
/// Route cache misses.
pub const ROUTE_CACHE_MISSES: &str = "freightline.route_cache.misses";
/// Swallowed route cache failures, labelled by `operation`.
pub const ROUTE_CACHE_ERRORS: &str = "freightline.route_cache.errors";
/// Committed status transitions, labelled by `event`.
pub const BOOKING_TRANSITIONS: &str = "freightline.booking.transitions";
/// Committed bookings.
pub const BOOKING_CREATED: &str = "freightline.booking.created";
/// Reference ids regenerated after a collision.
pub const BOOKING_REF_ID_COLLISIONS: &str = "freightline.booking.ref_id_collisions";
/// Lock-held time of a transition.
pub const BOOKING_TRANSITION_DURATION: &str = "freightline.booking.transition_duration_seconds";
/// Lock acquisitions refused because the resource was busy.
pub const LOCK_CONTENDED: &str = "freightline.lock.contended";
/// Store failures, labelled by `kind`.
pub const STORE_ERRORS: &str = "freightline.store.errors";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_namespaced_and_distinct() {
        let names = [
            ROUTE_CACHE_HITS,
            ROUTE_CACHE_MISSES,
            ROUTE_CACHE_ERRORS,
            BOOKING_TRANSITIONS,
            BOOKING_CREATED,
            BOOKING_REF_ID_COLLISIONS,
            BOOKING_TRANSITION_DURATION,
            LOCK_CONTENDED,
            STORE_ERRORS,
        ];
        assert!(names.iter().all(|name| name.starts_with("freightline.")));
        assert_eq!(names.iter().collect::<HashSet<_>>().len(), names.len());
    }
}
