//! # Environment Variable Loader
//!
//! Loads fixture configuration from environment variables so CI can pin
//! images or raise timeouts without touching test code.
//!
//! # Naming Convention
//! - `FX_PG_*`: PostgreSQL fixture settings
//! - `FX_RD_*`: Redis fixture settings
//! - `FX_WAIT_*`: Wait helper settings

use crate::config::{FixtureConfig, PostgresFixtureConfig, RedisFixtureConfig, WaitConfig};
use std::env;
use validator::Validate;

/// Load fixture configuration from environment variables.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Environment variables override default values. Unset or unparsable
/// variables fall back to the default for that field; the resulting
/// configuration is validated before it is returned.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("PostgreSQL image: {}", config.postgres.image_ref());
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// ### PostgreSQL Settings (`FX_PG_*`)
/// - `FX_PG_IMAGE`: Image name (default: "postgres")
/// - `FX_PG_TAG`: Image tag (default: "16-alpine")
/// - `FX_PG_USER`: Database user (default: "test")
/// - `FX_PG_PASSWORD`: Database password (default: "test")
/// - `FX_PG_DATABASE`: Database name (default: "testdb")
/// - `FX_PG_STARTUP_TIMEOUT_SECONDS`: Readiness deadline (default: 60)
/// - `FX_PG_POOL_SIZE`: Pool size (default: 5)
/// - `FX_PG_CONNECT_TIMEOUT_SECONDS`: Pool acquire timeout (default: 10)
///
/// ### Redis Settings (`FX_RD_*`)
/// - `FX_RD_IMAGE`: Image name (default: "redis")
/// - `FX_RD_TAG`: Image tag (default: "7-alpine")
/// - `FX_RD_STARTUP_TIMEOUT_SECONDS`: Readiness deadline (default: 60)
///
/// ### Wait Settings (`FX_WAIT_*`)
/// - `FX_WAIT_POLL_INTERVAL_MS`: Predicate polling interval (default: 100)
pub fn load_from_env() -> Result<FixtureConfig, Box<dyn std::error::Error>> {
    let config = FixtureConfig {
        postgres: load_postgres_from_env(),
        redis: load_redis_from_env(),
        wait: load_wait_from_env()
    };

    config.validate()?;
    Ok(config)
}

fn load_postgres_from_env() -> PostgresFixtureConfig {
    let defaults = PostgresFixtureConfig::default();
    PostgresFixtureConfig {
        image: env::var("FX_PG_IMAGE").unwrap_or(defaults.image),
        tag: env::var("FX_PG_TAG").unwrap_or(defaults.tag),
        user: env::var("FX_PG_USER").unwrap_or(defaults.user),
        password: env::var("FX_PG_PASSWORD").unwrap_or(defaults.password),
        database: env::var("FX_PG_DATABASE").unwrap_or(defaults.database),
        startup_timeout_seconds: parse_env("FX_PG_STARTUP_TIMEOUT_SECONDS")
            .unwrap_or(defaults.startup_timeout_seconds),
        pool_size: parse_env("FX_PG_POOL_SIZE").unwrap_or(defaults.pool_size),
        connect_timeout_seconds: parse_env("FX_PG_CONNECT_TIMEOUT_SECONDS")
            .unwrap_or(defaults.connect_timeout_seconds)
    }
}

fn load_redis_from_env() -> RedisFixtureConfig {
    let defaults = RedisFixtureConfig::default();
    RedisFixtureConfig {
        image: env::var("FX_RD_IMAGE").unwrap_or(defaults.image),
        tag: env::var("FX_RD_TAG").unwrap_or(defaults.tag),
        startup_timeout_seconds: parse_env("FX_RD_STARTUP_TIMEOUT_SECONDS")
            .unwrap_or(defaults.startup_timeout_seconds)
    }
}

fn load_wait_from_env() -> WaitConfig {
    WaitConfig {
        poll_interval_ms: parse_env("FX_WAIT_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| crate::config::default_poll_interval_ms())
    }
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>),
    }
}
