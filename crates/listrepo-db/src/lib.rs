//! # listrepo-db
//!
//! PostgreSQL layer for listrepo.
//!
//! This crate provides:
//! - SQL assembly for list queries (projection, joins, constraints, search,
//!   sorting, pagination, and count mode)
//! - Typed parameter binding
//! - A `QueryExecutor` boundary with a sqlx implementation
//! - `EntityListRepository`, the generic `ListRepository` implementation
//! - A fluent list builder
//! - Connection pool management and environment configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use listrepo_db::{ListingConfig, ListRepository, MetadataProvider, PgListRepository, PgQueryExecutor, ListRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ListingConfig::from_env()?;
//!     let registry = config.load_registry()?;
//!     let pool = config.connect().await?;
//!
//!     let contacts =
//!         PgListRepository::from_provider(PgQueryExecutor::new(pool), &registry, "contact")?;
//!
//!     let request = ListRequest::new().with_fields(["id", "firstName", "emails[0]_email"]);
//!     let rows = contacts.find(&request, &Default::default(), &config.default_prefix).await?;
//!     let total = contacts.get_count(&request, &Default::default(), &config.default_prefix).await?;
//!
//!     println!("{} of {} contacts", rows.len(), total);
//!     Ok(())
//! }
//! ```

pub mod assembly;
pub mod config;
pub mod executor;
pub mod list_builder;
pub mod params;
pub mod pool;
pub mod repository;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use listrepo_core::*;

pub use assembly::{AssembledQuery, ListQueryBuilder, ProjectedColumn};
pub use config::ListingConfig;
pub use executor::{PgQueryExecutor, QueryExecutor};
pub use list_builder::SqlListBuilder;
pub use params::{bind_params, QueryParam};
pub use pool::{create_pool, PoolConfig};
pub use repository::{EntityListRepository, PgListRepository};
