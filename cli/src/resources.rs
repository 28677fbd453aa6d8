//! Process-wide resources.
//!
//! Clients are constructed here once, injected into the services, and
//! closed by [`Resources::shutdown`].

use anyhow::Context;
use std::sync::Arc;

use freightline_core::cache::RouteCache;
use freightline_core::environment::{Clock, SystemClock};
use freightline_postgres::{PgAdvisoryLocks, PostgresStore};
use freightline_redis::RedisCacheBackend;
use freightline_runtime::metrics::MetricsServer;
use freightline_runtime::retry::{RetryPolicy, retry_with_backoff};
use freightline_runtime::{BookingEngine, RouteSearchService};

use crate::config::Config;

/// Owns every external client the commands need.
pub struct Resources {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Wall-clock time source.
    pub clock: Arc<dyn Clock>,
    /// `PostgreSQL` store.
    pub store: PostgresStore,
    /// Redis backend, absent when disabled or unreachable.
    pub cache: Option<RedisCacheBackend>,
}

impl Resources {
    /// Connect to every backend and apply migrations.
    ///
    /// The database connection is retried per `retry`. Redis is optional:
    /// when it cannot be reached the process runs without a route cache.
    ///
    /// # Errors
    ///
    /// Returns an error if `PostgreSQL` stays unreachable, a migration fails
    /// or the metrics exporter cannot start.
    pub async fn from_config(config: Config, retry: &RetryPolicy) -> anyhow::Result<Self> {
        if let Some(addr) = config.metrics_addr {
            MetricsServer::new(addr)
                .start()
                .context("Failed to start metrics exporter")?;
        }

        tracing::info!("Connecting to PostgreSQL...");
        let settings = config.database.pool_settings();
        let store = retry_with_backoff(retry, || {
            PostgresStore::connect(&config.database.url, &settings)
        })
        .await
        .context("Failed to connect to PostgreSQL")?;

        store.migrate().await.context("Failed to run migrations")?;

        let cache = if config.cache.enabled {
            match RedisCacheBackend::connect(&config.cache.redis_url).await {
                Ok(backend) => Some(backend),
                Err(error) => {
                    tracing::warn!(error = %error, "Redis unavailable, route cache disabled");
                    None
                }
            }
        } else {
            tracing::info!("Route cache disabled by configuration");
            None
        };

        Ok(Self {
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            store,
            cache,
        })
    }

    /// Booking engine over the store and its advisory locks.
    #[must_use]
    pub fn booking_engine(&self) -> BookingEngine<PostgresStore, PgAdvisoryLocks> {
        BookingEngine::new(
            self.store.clone(),
            self.store.advisory_locks(),
            Arc::clone(&self.clock),
        )
        .with_ref_id_attempts(self.config.ref_id_max_attempts)
    }

    /// Route cache, if a backend is connected.
    #[must_use]
    pub fn route_cache(&self) -> Option<RouteCache<RedisCacheBackend>> {
        self.cache
            .clone()
            .map(|backend| RouteCache::new(backend, self.config.cache.ttl))
    }

    /// Route search over the store and the route cache.
    #[must_use]
    pub fn route_search(&self) -> RouteSearchService<PostgresStore, RedisCacheBackend> {
        RouteSearchService::new(self.store.clone(), self.route_cache(), Arc::clone(&self.clock))
    }

    /// Close the pool. The Redis connection closes when dropped.
    pub async fn shutdown(self) {
        self.store.close().await;
        tracing::info!("Resources released");
    }
}
