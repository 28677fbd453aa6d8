//! Route search with a read-through cache.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use freightline_core::cache::{CacheBackend, RouteCache};
use freightline_core::environment::Clock;
use freightline_core::{FlightCatalog, Result, RouteQuery, RouteResolver, RouteSearchResult};

use crate::metrics::{ROUTE_CACHE_HITS, ROUTE_CACHE_MISSES};

/// Where a search result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// Served from the route cache.
    Cache,
    /// Computed by the resolver.
    Computed,
}

/// A search result with its provenance and a summary line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSearch {
    /// Human-readable summary.
    pub message: String,
    /// Where the result came from.
    pub source: ResultSource,
    /// The itineraries.
    #[serde(flatten)]
    pub result: RouteSearchResult,
}

/// Answers route searches, consulting the cache before the resolver.
pub struct RouteSearchService<C, B> {
    resolver: RouteResolver<C>,
    cache: Option<RouteCache<B>>,
    clock: Arc<dyn Clock>,
}

impl<C: FlightCatalog, B: CacheBackend> RouteSearchService<C, B> {
    /// Create a service. Pass `None` to disable caching.
    #[must_use]
    pub fn new(catalog: C, cache: Option<RouteCache<B>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: RouteResolver::new(catalog),
            cache,
            clock,
        }
    }

    /// The route cache, if enabled.
    #[must_use]
    pub const fn cache(&self) -> Option<&RouteCache<B>> {
        self.cache.as_ref()
    }

    /// Direct flights and the first transit itinerary for `query`.
    ///
    /// # Errors
    ///
    /// - [`freightline_core::BookingError::BadRequest`] if the date is in the past
    /// - [`freightline_core::BookingError::Internal`] if the catalog fails
    #[tracing::instrument(
        skip_all,
        fields(
            origin = %query.origin,
            destination = %query.destination,
            date = %query.departure_date
        )
    )]
    pub async fn search(&self, query: &RouteQuery) -> Result<RouteSearch> {
        let today = self.clock.now().date_naive();
        query.ensure_not_past(today)?;

        let cached = match &self.cache {
            Some(cache) => cache.get(query).await,
            None => None,
        };

        let (result, source) = if let Some(result) = cached {
            metrics::counter!(ROUTE_CACHE_HITS).increment(1);
            tracing::debug!("Route cache hit");
            (result, ResultSource::Cache)
        } else {
            let result = self.resolver.resolve(query).await?;
            if let Some(cache) = &self.cache {
                metrics::counter!(ROUTE_CACHE_MISSES).increment(1);
                let ttl = cache.ttl_policy().ttl_for(query.days_until_departure(today));
                tracing::debug!(ttl_seconds = ttl, "Route cache miss");
                cache.set(query, &result, ttl).await;
            }
            (result, ResultSource::Computed)
        };

        Ok(RouteSearch {
            message: summary(query, &result, source),
            source,
            result,
        })
    }
}

fn summary(query: &RouteQuery, result: &RouteSearchResult, source: ResultSource) -> String {
    format!(
        "{}Found {} direct flights{} for {} to {} on {}",
        if source == ResultSource::Cache { "[CACHED] " } else { "" },
        result.direct_flights.len(),
        if result.transit_route.is_some() { " and 1 transit route" } else { "" },
        query.origin,
        query.destination,
        query.departure_date.format("%Y-%m-%d"),
    )
}
