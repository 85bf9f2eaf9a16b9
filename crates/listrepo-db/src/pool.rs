//! Connection pool for list statements.
//!
//! A pool is sized by its connection count alone. Acquire timeout, idle
//! timeout, lifetime and the warm minimum come from
//! [`listrepo_core::defaults`]. The URL is parsed before connecting so a
//! malformed `DATABASE_URL` surfaces as [`Error::Config`] and the logs name
//! the target without its credentials.

use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{info, warn};

use listrepo_core::defaults::{
    POOL_CONNECT_TIMEOUT_SECS, POOL_IDLE_TIMEOUT_SECS, POOL_MAX_CONNECTIONS,
    POOL_MAX_LIFETIME_SECS, POOL_MIN_CONNECTIONS,
};
use listrepo_core::{Error, Result};

/// Pool sizing for a repository's executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    max_connections: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: POOL_MAX_CONNECTIONS,
        }
    }
}

impl PoolConfig {
    pub fn sized(max_connections: u32) -> Result<Self> {
        if max_connections == 0 {
            return Err(Error::Config(
                "Pool max_connections must be at least 1".to_string(),
            ));
        }
        Ok(Self { max_connections })
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    /// Warm minimum, never above the maximum.
    pub fn min_connections(&self) -> u32 {
        POOL_MIN_CONNECTIONS.min(self.max_connections)
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections())
            .acquire_timeout(Duration::from_secs(POOL_CONNECT_TIMEOUT_SECS))
            .idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .max_lifetime(Duration::from_secs(POOL_MAX_LIFETIME_SECS))
    }
}

fn connect_options(database_url: &str) -> Result<PgConnectOptions> {
    PgConnectOptions::from_str(database_url)
        .map_err(|e| Error::Config(format!("Invalid database URL: {}", e)))
}

/// Open a pool against `database_url`.
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let connect = connect_options(database_url)?;
    let start = Instant::now();

    info!(
        subsystem = "database",
        component = "pool",
        op = "create",
        host = connect.get_host(),
        port = connect.get_port(),
        database = connect.get_database().unwrap_or_default(),
        max_connections = config.max_connections(),
        min_connections = config.min_connections(),
        "Creating database connection pool"
    );

    let pool = config
        .options()
        .connect_with(connect)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Warn when a statement finished on a pool with every connection busy.
pub(crate) fn warn_if_saturated(pool: &PgPool, op: &'static str) {
    let size = pool.size();
    let idle = pool.num_idle();
    if idle == 0 && size >= pool.options().get_max_connections() {
        warn!(
            subsystem = "database",
            component = "pool",
            op,
            pool_size = size,
            "Connection pool saturated"
        );
    }
}
