//! Environment-driven configuration.
//!
//! Environment variables:
//! - `DATABASE_URL` (required)
//! - `LISTREPO_MAX_CONNECTIONS` (default: [`POOL_MAX_CONNECTIONS`])
//! - `LISTREPO_SCHEMA_PATH`: YAML or JSON schema registry file (optional)
//! - `LISTREPO_DEFAULT_PREFIX` (default: [`DEFAULT_PREFIX`])

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use listrepo_core::defaults::{DEFAULT_PREFIX, POOL_MAX_CONNECTIONS};
use listrepo_core::{validate_identifier, Error, Result, SchemaRegistry};

use crate::pool::{create_pool, PoolConfig};

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "LISTREPO_MAX_CONNECTIONS";
pub const ENV_SCHEMA_PATH: &str = "LISTREPO_SCHEMA_PATH";
pub const ENV_DEFAULT_PREFIX: &str = "LISTREPO_DEFAULT_PREFIX";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub schema_path: Option<PathBuf>,
    /// Root alias used when a caller does not pass one
    pub default_prefix: String,
}

impl ListingConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup(ENV_DATABASE_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} is not set", ENV_DATABASE_URL)))?;

        let max_connections = match lookup(ENV_MAX_CONNECTIONS) {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(Error::Config(format!(
                        "{} must be a positive integer, got '{}'",
                        ENV_MAX_CONNECTIONS, raw
                    )))
                }
            },
            None => POOL_MAX_CONNECTIONS,
        };

        let schema_path = lookup(ENV_SCHEMA_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let default_prefix =
            lookup(ENV_DEFAULT_PREFIX).unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        validate_identifier(&default_prefix, "prefix")
            .map_err(|e| Error::Config(format!("{}: {}", ENV_DEFAULT_PREFIX, e)))?;

        Ok(Self {
            database_url,
            max_connections,
            schema_path,
            default_prefix,
        })
    }

    pub fn pool_config(&self) -> Result<PoolConfig> {
        PoolConfig::sized(self.max_connections)
    }

    /// Registry from `schema_path`, or an empty one when none is configured.
    pub fn load_registry(&self) -> Result<SchemaRegistry> {
        match &self.schema_path {
            Some(path) => SchemaRegistry::from_path(path),
            None => Ok(SchemaRegistry::new()),
        }
    }

    pub async fn connect(&self) -> Result<PgPool> {
        info!(
            subsystem = "config",
            component = "listing",
            op = "connect",
            max_connections = self.max_connections,
            default_prefix = %self.default_prefix,
            "Connecting with environment configuration"
        );
        create_pool(&self.database_url, &self.pool_config()?).await
    }
}
