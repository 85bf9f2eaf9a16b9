//! Generic list repository over one entity type.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use listrepo_core::defaults::DEFAULT_PREFIX;
use listrepo_core::{
    Cardinality, EntityMetadata, Error, FindResult, ListQuery, ListRepository, ListRequest,
    MetadataProvider, PageSpec, Result, Row,
};

use crate::assembly::ListQueryBuilder;
use crate::executor::{PgQueryExecutor, QueryExecutor};
use crate::list_builder::SqlListBuilder;

/// [`ListRepository`] for any entity described by [`EntityMetadata`].
///
/// Each call assembles exactly one statement, runs it through the executor,
/// and, in rows mode, folds the result with the query's post-filter.
pub struct EntityListRepository<E> {
    executor: E,
    metadata: Arc<EntityMetadata>,
}

/// Repository backed by PostgreSQL.
pub type PgListRepository = EntityListRepository<PgQueryExecutor>;

impl<E: QueryExecutor> EntityListRepository<E> {
    pub fn new(executor: E, metadata: Arc<EntityMetadata>) -> Self {
        Self { executor, metadata }
    }

    /// Look up `entity` once and bind the repository to its metadata.
    pub fn from_provider(
        executor: E,
        provider: &dyn MetadataProvider,
        entity: &str,
    ) -> Result<Self> {
        let metadata = provider.metadata(entity)?;
        info!(
            subsystem = "listing",
            component = "repository",
            op = "create",
            entity = %metadata.name,
            db_table = %metadata.table,
            "List repository created"
        );
        Ok(Self::new(executor, metadata))
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn metadata_arc(&self) -> Arc<EntityMetadata> {
        self.metadata.clone()
    }

    /// Fluent builder running against this repository.
    pub fn list_builder(&self) -> SqlListBuilder<'_, E> {
        SqlListBuilder::new(self)
    }

    /// Assemble and run an already resolved query.
    pub async fn run(&self, query: ListQuery, prefix: &str, just_count: bool) -> Result<FindResult> {
        let start = Instant::now();
        let assembled = ListQueryBuilder::new(&self.metadata)
            .with_query(query)
            .with_prefix(prefix)
            .with_count_only(just_count)
            .build()?;

        if just_count {
            let count = self.executor.fetch_count(&assembled).await?;
            debug!(
                subsystem = "listing",
                component = "repository",
                op = "count",
                entity = %self.metadata.name,
                result_count = count,
                duration_ms = start.elapsed().as_millis() as u64,
                "Count completed"
            );
            return Ok(FindResult::Count(count));
        }

        let rows = self.executor.fetch_rows(&assembled).await?;
        let fetched = rows.len();
        let rows = assembled.post_filter.apply(rows);

        debug!(
            subsystem = "listing",
            component = "repository",
            op = "find",
            entity = %self.metadata.name,
            fetched,
            result_count = rows.len(),
            post_filter = assembled.post_filter.is_active(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Find completed"
        );
        Ok(FindResult::Rows(rows))
    }
}

#[async_trait]
impl<E: QueryExecutor> ListRepository for EntityListRepository<E> {
    fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    async fn find_with(
        &self,
        request: &ListRequest,
        where_eq: &Map<String, Value>,
        prefix: &str,
        just_count: bool,
    ) -> Result<FindResult> {
        let query = ListQuery::from_request(&self.metadata, request, where_eq)?;
        self.run(query, prefix, just_count).await
    }

    async fn find_by_id_with(&self, id: &Value, fields: &[String]) -> Result<Option<Row>> {
        if id.is_null() {
            return Err(Error::InvalidInput("Identifier cannot be null".to_string()));
        }

        let identifier = self.metadata.identifier.clone();
        let mut request = ListRequest::new();
        if !fields.is_empty() {
            request.fields = fields.to_vec();
            if !request.fields.contains(&identifier) {
                request.fields.insert(0, identifier.clone());
            }
        }
        let mut where_eq = Map::new();
        where_eq.insert(identifier, id.clone());

        let mut query = ListQuery::from_request(&self.metadata, &request, &where_eq)?;
        // A to-many join yields several rows for one entity; they must all
        // reach the fold.
        let expands = query
            .associations(true)
            .into_iter()
            .map(|name| self.metadata.association(name))
            .collect::<Result<Vec<_>>>()?
            .iter()
            .any(|assoc| assoc.cardinality == Cardinality::ToMany);
        if !expands {
            query.page = PageSpec::new(None, Some(1));
        }

        let rows = self.run(query, DEFAULT_PREFIX, false).await?.into_rows()?;
        Ok(rows.into_iter().next())
    }
}
