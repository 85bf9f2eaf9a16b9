//! # listrepo-core
//!
//! Core types, traits, and abstractions for the listrepo library.
//!
//! This crate holds everything that does not touch the database: field and
//! association descriptors, the schema registry, list request parsing, typed
//! constraints, and the relational post-filter. `listrepo-db` turns these
//! into SQL and runs them.

pub mod criteria;
pub mod defaults;
pub mod descriptor;
pub mod error;
pub mod field_ref;
pub mod identifier;
pub mod logging;
pub mod metadata;
pub mod post_filter;
pub mod query;
pub mod request;
pub mod row;
pub mod traits;

// Re-export commonly used types at crate root
pub use criteria::{
    escape_like, is_numeric, Comparator, Conjunction, Constraint, PageSpec, SearchPlan,
    SearchSpec, SortOrder, SortSpec, WhereClause,
};
pub use descriptor::{AssociationDescriptor, Cardinality, FieldDescriptor, FieldKind};
pub use error::{Error, Result};
pub use field_ref::{FieldRef, RelationalKey};
pub use identifier::validate_identifier;
pub use metadata::{EntityMetadata, MetadataProvider, SchemaRegistry};
pub use post_filter::{PostFilter, RelationalFilters};
pub use query::ListQuery;
pub use request::ListRequest;
pub use row::{FindResult, Row};
pub use traits::ListRepository;
