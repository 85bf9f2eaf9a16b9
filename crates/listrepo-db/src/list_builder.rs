//! Fluent list builder.
//!
//! [`SqlListBuilder`] is the programmatic counterpart to
//! [`ListRequest`](listrepo_core::ListRequest): callers pick fields by
//! resolved [`FieldRef`], add typed constraints that the request format
//! cannot express (comparators, OR-joined clauses, IN, BETWEEN, grouping),
//! and then `execute` or `count`. Both terminal calls go through the same
//! assembler as the repository.
//!
//! ```rust,ignore
//! let repo = PgListRepository::new(PgQueryExecutor::new(pool), metadata);
//! let builder = repo.list_builder();
//! let id = builder.field_descriptor("id")?;
//! let age = builder.field_descriptor("age")?;
//!
//! let builder = builder
//!     .add_select_field(id)
//!     .where_clause(age, json!(18), Comparator::GreaterOrEqual, Conjunction::And)
//!     .limit(20)
//!     .set_current_page(2);
//!
//! let total = builder.count().await?;
//! let rows = builder.execute().await?;
//! ```

use serde_json::Value;
use tracing::debug;

use listrepo_core::defaults::{DEFAULT_PREFIX, FIRST_PAGE};
use listrepo_core::{
    Comparator, Conjunction, Constraint, FieldRef, ListQuery, PageSpec, Result, Row,
    SearchPlan, SortOrder, SortSpec, WhereClause,
};

use crate::executor::QueryExecutor;
use crate::repository::EntityListRepository;

pub struct SqlListBuilder<'r, E> {
    repository: &'r EntityListRepository<E>,
    select: Vec<FieldRef>,
    search_fields: Vec<FieldRef>,
    search: Option<String>,
    sort: Vec<SortSpec>,
    constraints: Vec<Constraint>,
    group_by: Vec<FieldRef>,
    limit: Option<u64>,
    page: u64,
    prefix: String,
}

impl<'r, E: QueryExecutor> SqlListBuilder<'r, E> {
    pub fn new(repository: &'r EntityListRepository<E>) -> Self {
        Self {
            repository,
            select: Vec::new(),
            search_fields: Vec::new(),
            search: None,
            sort: Vec::new(),
            constraints: Vec::new(),
            group_by: Vec::new(),
            limit: None,
            page: FIRST_PAGE,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Every field this builder can address: root fields first, then the
    /// fields of each association as `assoc_field`.
    pub fn field_descriptors(&self) -> Vec<FieldRef> {
        let metadata = self.repository.metadata_arc();
        let roots = metadata
            .fields
            .iter()
            .map(|f| FieldRef::root(&f.name, f.column(), f.kind));
        let associated = metadata.associations.iter().flat_map(|assoc| {
            assoc
                .fields
                .iter()
                .map(|f| FieldRef::associated(&assoc.name, &f.name, f.column(), f.kind))
        });
        roots.chain(associated).collect()
    }

    /// Resolve a field name (`name`, `assoc_field`, or `assoc[N]_field`).
    pub fn field_descriptor(&self, name: &str) -> Result<FieldRef> {
        self.repository.metadata_arc().resolve(name)
    }

    pub fn set_select_fields(self, select: Vec<FieldRef>) -> Self {
        Self { select, ..self }
    }

    pub fn add_select_field(mut self, field: FieldRef) -> Self {
        self.select.push(field);
        self
    }

    /// Selected field by its display name (`emails[1]_domain`) or its
    /// result alias (`emails_domain`).
    pub fn get_select_field(&self, name: &str) -> Option<&FieldRef> {
        self.select
            .iter()
            .find(|f| f.to_string() == name || f.alias() == name)
    }

    pub fn has_select_field(&self, name: &str) -> bool {
        self.get_select_field(name).is_some()
    }

    pub fn select_fields(&self) -> &[FieldRef] {
        &self.select
    }

    pub fn add_search_field(mut self, field: FieldRef) -> Self {
        self.search_fields.push(field);
        self
    }

    /// Search the added search fields for `value`.
    pub fn search(self, value: impl Into<String>) -> Self {
        Self {
            search: Some(value.into()),
            ..self
        }
    }

    pub fn sort(mut self, field: FieldRef, order: SortOrder) -> Self {
        self.sort.push(SortSpec::new(field, order));
        self
    }

    pub fn limit(self, limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    /// 1-based page; only takes effect together with a limit.
    pub fn set_current_page(self, page: u64) -> Self {
        Self { page, ..self }
    }

    pub fn get_current_page(&self) -> u64 {
        self.page
    }

    pub fn with_prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self
        }
    }

    pub fn where_clause(
        mut self,
        field: FieldRef,
        value: Value,
        comparator: Comparator,
        conjunction: Conjunction,
    ) -> Self {
        self.constraints.push(Constraint::Where(WhereClause::new(
            field,
            value,
            comparator,
            conjunction,
        )));
        self
    }

    /// `field` must equal one of `values`. An empty list matches nothing.
    pub fn where_in(mut self, field: FieldRef, values: Vec<Value>) -> Self {
        self.constraints.push(Constraint::In { field, values });
        self
    }

    pub fn between(mut self, field: FieldRef, low: Value, high: Value, conjunction: Conjunction) -> Self {
        self.constraints.push(Constraint::Between {
            field,
            low,
            high,
            conjunction,
        });
        self
    }

    pub fn add_group_by(mut self, field: FieldRef) -> Self {
        self.group_by.push(field);
        self
    }

    /// The resolved query this builder currently describes.
    pub fn to_query(&self) -> Result<ListQuery> {
        let page = PageSpec::for_page(self.page, self.limit)?;

        let search = match self.search.as_deref() {
            Some(pattern) if !pattern.is_empty() && !self.search_fields.is_empty() => {
                Some(SearchPlan::from_fields(pattern, self.search_fields.clone())?)
            }
            Some(pattern) if !pattern.is_empty() => {
                debug!(
                    subsystem = "listing",
                    component = "list_builder",
                    op = "search",
                    "Search value set without search fields; ignored"
                );
                None
            }
            _ => None,
        };

        Ok(ListQuery {
            select: self.select.clone(),
            constraints: self.constraints.clone(),
            search,
            sort: self.sort.clone(),
            group_by: self.group_by.clone(),
            page,
        })
    }

    /// Matching rows for the current page.
    pub async fn execute(&self) -> Result<Vec<Row>> {
        self.repository
            .run(self.to_query()?, &self.prefix, false)
            .await?
            .into_rows()
    }

    /// Number of matching entities, regardless of page and limit.
    pub async fn count(&self) -> Result<i64> {
        self.repository
            .run(self.to_query()?, &self.prefix, true)
            .await?
            .into_count()
    }
}

impl<E> std::fmt::Debug for SqlListBuilder<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlListBuilder")
            .field("select", &self.select)
            .field("search", &self.search)
            .field("constraints", &self.constraints.len())
            .field("limit", &self.limit)
            .field("page", &self.page)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl<E> Clone for SqlListBuilder<'_, E> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository,
            select: self.select.clone(),
            search_fields: self.search_fields.clone(),
            search: self.search.clone(),
            sort: self.sort.clone(),
            constraints: self.constraints.clone(),
            group_by: self.group_by.clone(),
            limit: self.limit,
            page: self.page,
            prefix: self.prefix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::params::QueryParam;
    use crate::test_fixtures::{contact_metadata, RecordingExecutor};
    use listrepo_core::Error;
    use serde_json::json;

    fn repository(executor: RecordingExecutor) -> EntityListRepository<RecordingExecutor> {
        EntityListRepository::new(executor, Arc::new(contact_metadata()))
    }

    #[test]
    fn test_field_descriptors_cover_associations() {
        let repo = repository(RecordingExecutor::new());
        let names: Vec<String> = repo
            .list_builder()
            .field_descriptors()
            .iter()
            .map(|f| f.alias())
            .collect();
        assert!(names.contains(&"firstName".to_string()));
        assert!(names.contains(&"emails_domain".to_string()));
        assert!(names.contains(&"account_name".to_string()));
    }

    #[test]
    fn test_select_field_lookup() {
        let repo = repository(RecordingExecutor::new());
        let builder = repo.list_builder();
        let domain = builder.field_descriptor("emails[1]_domain").unwrap();
        let builder = builder.add_select_field(domain);

        assert!(builder.has_select_field("emails[1]_domain"));
        assert!(builder.has_select_field("emails_domain"));
        assert!(!builder.has_select_field("id"));
        assert_eq!(
            builder.get_select_field("emails_domain").unwrap().index,
            Some(1)
        );
    }

    #[test]
    fn test_unknown_descriptor() {
        let repo = repository(RecordingExecutor::new());
        assert!(matches!(
            repo.list_builder().field_descriptor("nickname"),
            Err(Error::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_page_and_limit() {
        let repo = repository(RecordingExecutor::new());
        let builder = repo.list_builder().limit(10).set_current_page(3);
        assert_eq!(builder.get_limit(), Some(10));
        assert_eq!(builder.get_current_page(), 3);

        let query = builder.to_query().unwrap();
        assert_eq!(query.page, PageSpec::new(Some(20), Some(10)));

        let invalid = repo.list_builder().set_current_page(0);
        assert!(matches!(invalid.to_query(), Err(Error::InvalidInput(_))));

        let overflow = repo.list_builder().limit(u64::MAX).set_current_page(3);
        assert!(matches!(overflow.to_query(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_search_needs_search_fields() {
        let repo = repository(RecordingExecutor::new());
        let builder = repo.list_builder().search("max");
        assert!(builder.to_query().unwrap().search.is_none());

        let name = builder.field_descriptor("firstName").unwrap();
        let query = builder.add_search_field(name).to_query().unwrap();
        let plan = query.search.unwrap();
        assert_eq!(plan.text_fields.len(), 1);
        assert!(plan.number_fields.is_empty());
    }

    #[tokio::test]
    async fn test_execute_with_typed_constraints() {
        let repo = repository(RecordingExecutor::new());
        let builder = repo.list_builder();
        let id = builder.field_descriptor("id").unwrap();
        let age = builder.field_descriptor("age").unwrap();
        let name = builder.field_descriptor("firstName").unwrap();

        builder
            .set_select_fields(vec![id.clone(), name.clone()])
            .where_clause(age.clone(), json!(18), Comparator::GreaterOrEqual, Conjunction::And)
            .where_clause(name.clone(), json!("Max"), Comparator::Equal, Conjunction::Or)
            .where_in(id, vec![json!(1), json!(2)])
            .sort(name, SortOrder::Desc)
            .limit(5)
            .execute()
            .await
            .unwrap();

        let query = repo.executor().last_query().unwrap();
        assert!(query.sql.contains(
            r#"WHERE ("u"."age" >= $1 OR "u"."first_name" = $2 AND "u"."id" = ANY($3))"#
        ));
        assert!(query.sql.ends_with(r#"ORDER BY "u"."first_name" DESC LIMIT $4 OFFSET $5"#));
        assert_eq!(
            query.params,
            vec![
                QueryParam::Int(18),
                QueryParam::String("Max".into()),
                QueryParam::IntArray(vec![1, 2]),
                QueryParam::Int(5),
                QueryParam::Int(0),
            ]
        );
    }

    #[tokio::test]
    async fn test_count_and_group_by() {
        let repo = repository(RecordingExecutor::new().with_count(3));
        let builder = repo.list_builder();
        let age = builder.field_descriptor("age").unwrap();
        let builder = builder
            .add_select_field(age.clone())
            .between(age.clone(), json!(18), json!(30), Conjunction::And)
            .add_group_by(age)
            .limit(10);

        assert_eq!(builder.count().await.unwrap(), 3);
        let count_query = repo.executor().last_query().unwrap();
        assert!(count_query
            .sql
            .starts_with(r#"SELECT COUNT(*) AS "totalcount" FROM (SELECT 1 FROM"#));
        assert!(count_query.sql.contains("BETWEEN $1 AND $2"));
        assert!(count_query.sql.ends_with(r#"GROUP BY "u"."age") AS "grouped""#));
        assert!(!count_query.sql.contains("LIMIT"));

        builder.execute().await.unwrap();
        let rows_query = repo.executor().last_query().unwrap();
        assert!(rows_query.sql.contains(r#"GROUP BY "u"."age""#));
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let repo = repository(RecordingExecutor::new());
        let builder = repo.list_builder().with_prefix("contact_alias");
        let id = builder.field_descriptor("id").unwrap();
        builder.add_select_field(id).execute().await.unwrap();

        let query = repo.executor().last_query().unwrap();
        assert!(query.sql.contains(r#"FROM "contact" AS "contact_alias""#));
    }
}
