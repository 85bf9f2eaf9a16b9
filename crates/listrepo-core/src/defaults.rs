//! Centralized default constants for listrepo.
//!
//! Every crate references these constants instead of defining its own
//! magic numbers.

// =============================================================================
// QUERY ASSEMBLY
// =============================================================================

/// Default alias for the root entity in generated queries.
pub const DEFAULT_PREFIX: &str = "u";

/// Alias of the aggregate produced by count-only queries.
pub const COUNT_ALIAS: &str = "totalcount";

/// Default name of the identifier field.
pub const DEFAULT_IDENTIFIER: &str = "id";

/// PostgreSQL identifier length limit.
pub const MAX_IDENTIFIER_LEN: usize = 63;

// =============================================================================
// PAGINATION
// =============================================================================

/// First page number accepted by page-based pagination.
pub const FIRST_PAGE: u64 = 1;

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Default maximum number of connections in the pool.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Default minimum number of connections in the pool.
pub const POOL_MIN_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds.
pub const POOL_MAX_LIFETIME_SECS: u64 = 1800;
