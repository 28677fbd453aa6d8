//! Configuration loaded from environment variables.
//!
//! `.env` files are read by the binary before [`Config::from_env`] runs, so
//! both sources feed the same lookup.

use serde::Serialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use freightline_core::cache::CacheTtlPolicy;
use freightline_postgres::PoolSettings;
use freightline_runtime::booking::DEFAULT_REF_ID_ATTEMPTS;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Environment variable not set: {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("Invalid value '{value}' for {var}: {reason}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// `PostgreSQL` settings.
    pub database: DatabaseConfig,
    /// Redis and route cache settings.
    pub cache: CacheConfig,
    /// Reference id attempts before creation fails with `Conflict`.
    pub ref_id_max_attempts: u32,
    /// Prometheus listener, disabled when unset.
    pub metrics_addr: Option<SocketAddr>,
}

/// `PostgreSQL` configuration.
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseConfig {
    /// Connection URL.
    #[serde(skip_serializing)]
    pub url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Minimum idle connections.
    pub min_connections: u32,
    /// Connection timeout in seconds.
    pub connect_timeout: u64,
    /// Statement timeout in seconds.
    pub statement_timeout: u64,
}

impl DatabaseConfig {
    /// Pool settings for [`freightline_postgres::PostgresStore::connect`].
    #[must_use]
    pub const fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            statement_timeout: Duration::from_secs(self.statement_timeout),
        }
    }
}

/// Route cache configuration.
#[derive(Debug, Clone, Serialize)]
pub struct CacheConfig {
    /// Redis connection URL.
    #[serde(skip_serializing)]
    pub redis_url: String,
    /// Whether searches consult the cache at all.
    pub enabled: bool,
    /// Expiry by lead time.
    pub ttl: CacheTtlPolicy,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `DATABASE_URL` is unset, or
    /// [`ConfigError::Invalid`] if any variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CacheTtlPolicy::default();
        let config = Self {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", 1)?,
                connect_timeout: parse_or(&lookup, "DATABASE_CONNECT_TIMEOUT", 30)?,
                statement_timeout: parse_or(&lookup, "DATABASE_STATEMENT_TIMEOUT", 30)?,
            },
            cache: CacheConfig {
                redis_url: lookup("REDIS_URL")
                    .unwrap_or_else(|| "redis://localhost:6379".to_string()),
                enabled: flag_or(&lookup, "ROUTE_CACHE_ENABLED", true)?,
                ttl: CacheTtlPolicy {
                    near_seconds: parse_or(&lookup, "ROUTE_CACHE_TTL_NEAR", defaults.near_seconds)?,
                    week_seconds: parse_or(&lookup, "ROUTE_CACHE_TTL_WEEK", defaults.week_seconds)?,
                    default_seconds: parse_or(
                        &lookup,
                        "ROUTE_CACHE_TTL_DEFAULT",
                        defaults.default_seconds,
                    )?,
                },
            },
            ref_id_max_attempts: parse_or(
                &lookup,
                "BOOKING_REF_MAX_ATTEMPTS",
                DEFAULT_REF_ID_ATTEMPTS,
            )?,
            metrics_addr: lookup("METRICS_ADDR")
                .map(|raw| parse_value("METRICS_ADDR", raw))
                .transpose()?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DATABASE_MAX_CONNECTIONS",
                value: self.database.max_connections.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DATABASE_MIN_CONNECTIONS",
                value: self.database.min_connections.to_string(),
                reason: "must not exceed DATABASE_MAX_CONNECTIONS".to_string(),
            });
        }
        if self.ref_id_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "BOOKING_REF_MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value: raw,
    })
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(var).map_or(Ok(default), |raw| parse_value(var, raw))
}

fn flag_or<F>(lookup: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/freightline")]).unwrap();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.database.pool_settings().statement_timeout, Duration::from_secs(30));
        assert_eq!(config.cache.redis_url, "redis://localhost:6379");
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl, CacheTtlPolicy::default());
        assert_eq!(config.ref_id_max_attempts, 5);
        assert_eq!(config.metrics_addr, None);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/freightline"),
            ("DATABASE_MAX_CONNECTIONS", "20"),
            ("ROUTE_CACHE_ENABLED", "false"),
            ("ROUTE_CACHE_TTL_NEAR", "60"),
            ("BOOKING_REF_MAX_ATTEMPTS", "8"),
            ("METRICS_ADDR", "127.0.0.1:9090"),
        ])
        .unwrap();
        assert_eq!(config.database.max_connections, 20);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl.near_seconds, 60);
        assert_eq!(config.cache.ttl.week_seconds, 1800);
        assert_eq!(config.ref_id_max_attempts, 8);
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9090".parse().unwrap()));
    }

    #[test]
    fn test_missing_database_url() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/freightline"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DATABASE_MAX_CONNECTIONS", .. }));

        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/freightline"),
            ("ROUTE_CACHE_ENABLED", "maybe"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "ROUTE_CACHE_ENABLED", .. }));

        let err = load(&[
            ("DATABASE_URL", "postgres://localhost/freightline"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DATABASE_MAX_CONNECTIONS", .. }));
    }

    #[test]
    fn test_single_connection_pool_is_accepted() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/freightline"),
            ("DATABASE_MAX_CONNECTIONS", "1"),
            ("DATABASE_MIN_CONNECTIONS", "1"),
        ])
        .unwrap();
        assert_eq!(config.database.max_connections, 1);
    }
}
