//! Core traits for listrepo abstractions.
//!
//! These traits define the interfaces that storage-backed implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::metadata::EntityMetadata;
use crate::request::ListRequest;
use crate::row::{FindResult, Row};

/// List access to one entity type.
#[async_trait]
pub trait ListRepository: Send + Sync {
    /// Metadata this repository was constructed with.
    fn metadata(&self) -> &EntityMetadata;

    /// Run a list lookup.
    ///
    /// `where_eq` holds exact-value constraints keyed by field name.
    /// `prefix` is the alias of the root entity in the generated query.
    /// With `just_count` set the result is the number of rows `find` returns
    /// for the same arguments with pagination removed.
    async fn find_with(
        &self,
        request: &ListRequest,
        where_eq: &Map<String, Value>,
        prefix: &str,
        just_count: bool,
    ) -> Result<FindResult>;

    /// Matching rows, paginated and post-filtered.
    async fn find(
        &self,
        request: &ListRequest,
        where_eq: &Map<String, Value>,
        prefix: &str,
    ) -> Result<Vec<Row>> {
        self.find_with(request, where_eq, prefix, false)
            .await?
            .into_rows()
    }

    /// Length of the unpaginated `find` result.
    async fn get_count(
        &self,
        request: &ListRequest,
        where_eq: &Map<String, Value>,
        prefix: &str,
    ) -> Result<i64> {
        self.find_with(request, where_eq, prefix, true)
            .await?
            .into_count()
    }

    /// Single entity by identifier, with the default projection of root
    /// fields. Associations are not loaded; use [`find_by_id_with`] to
    /// select association fields. `Ok(None)` when it does not exist.
    ///
    /// [`find_by_id_with`]: ListRepository::find_by_id_with
    async fn find_by_id(&self, id: &Value) -> Result<Option<Row>> {
        self.find_by_id_with(id, &[]).await
    }

    /// Single entity by identifier with an explicit selection, which may
    /// name association fields such as `account_name` or `emails[0]_email`.
    /// The identifier is always selected, so to-many rows fold into one.
    /// An empty selection means the default projection.
    async fn find_by_id_with(&self, id: &Value, fields: &[String]) -> Result<Option<Row>>;
}
