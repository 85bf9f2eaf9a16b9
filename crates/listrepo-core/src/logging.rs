//! Structured logging schema and field name constants for listrepo.
//!
//! Reference list of the common structured field names both crates emit.
//! The `tracing` macros take field names as identifiers, so call sites spell
//! these names directly and nothing imports the constants at runtime.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, documented quirk applied (e.g. post-filter skipped) |
//! | INFO  | Lifecycle events (pool creation, registry load) |
//! | DEBUG | Assembled queries, search dispatch, post-filter decisions |
//! | TRACE | Per-row iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "listing", "database", "config"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "list_query", "executor", "post_filter", "pool", "registry",
/// "repository", "list_builder"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "find", "count", "assemble", "fetch_rows", "fetch_count", "search"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Entity type the repository is scoped to.
pub const ENTITY: &str = "entity";

/// Root alias used in the generated query.
pub const PREFIX: &str = "prefix";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of bound parameters in an assembled query.
pub const PARAM_COUNT: &str = "param_count";

/// Number of joins emitted by the assembler.
pub const JOIN_COUNT: &str = "join_count";

// ─── Search fields ─────────────────────────────────────────────────────────

/// Number of text-like fields matched by substring.
pub const TEXT_FIELDS: &str = "text_fields";

/// Number of number-like fields matched exactly.
pub const NUMBER_FIELDS: &str = "number_fields";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";
