//! SQL assembly for list queries.
//!
//! [`ListQueryBuilder`] turns a resolved [`ListQuery`] into one parameterized
//! PostgreSQL statement. The builder is a value: every `with_*` call returns
//! a new builder and `build` never mutates it, so one builder can produce
//! both the row query and the count query.
//!
//! ## Statement shape
//!
//! ```text
//! SELECT <projection | COUNT(DISTINCT root.id) | COUNT(*)>
//! FROM "<table>" AS "<prefix>"
//! LEFT JOIN "<assoc table>" AS "<assoc>" ON ...
//! WHERE (<constraints>) AND (<search terms OR-ed>)
//! GROUP BY ... ORDER BY ... LIMIT $n OFFSET $m
//! ```
//!
//! Count statements count what the row query returns: distinct root ids
//! when rows are folded by a repetition index, otherwise joined rows. A
//! grouped row query is counted through a derived table.
//!
//! Every identifier comes from validated metadata and is double-quoted.
//! Every caller value is a bind parameter.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, trace};

use listrepo_core::defaults::{COUNT_ALIAS, DEFAULT_PREFIX};
use listrepo_core::{
    validate_identifier, Cardinality, Comparator, Constraint, EntityMetadata, Error, FieldKind,
    FieldRef, ListQuery, PostFilter, Result, SearchPlan,
};

use crate::params::{coerce, coerce_list, QueryParam};

/// One projected result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedColumn {
    pub alias: String,
    pub kind: FieldKind,
}

/// A statement ready to execute, plus what the executor needs to decode it.
#[derive(Debug, Clone)]
pub struct AssembledQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
    /// Result columns in select order; empty for count queries
    pub projection: Vec<ProjectedColumn>,
    /// Fold applied to the fetched rows
    pub post_filter: PostFilter,
    pub count_only: bool,
}

/// Sequentially numbered bind parameters.
#[derive(Debug, Default)]
struct ParamList {
    params: Vec<QueryParam>,
}

impl ParamList {
    fn push(&mut self, param: QueryParam) -> String {
        let placeholder = param.placeholder(self.params.len() + 1);
        self.params.push(param);
        placeholder
    }
}

/// Alias of the derived table wrapping a grouped count.
const GROUPED_ALIAS: &str = "grouped";

/// What a built statement returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// Projected rows
    Rows,
    /// Distinct root ids, matching the number of folded rows
    CountEntities,
    /// Joined rows, matching an unfolded row query
    CountRows,
    /// Groups, matching an unfolded grouped row query
    CountGroups,
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident)
}

fn limit_param(value: u64, what: &str) -> Result<QueryParam> {
    i64::try_from(value)
        .map(QueryParam::Int)
        .map_err(|_| Error::InvalidInput(format!("{} {} is out of range", what, value)))
}

/// Immutable builder producing [`AssembledQuery`] values.
#[derive(Debug, Clone)]
pub struct ListQueryBuilder<'m> {
    metadata: &'m EntityMetadata,
    query: ListQuery,
    prefix: String,
    count_only: bool,
}

impl<'m> ListQueryBuilder<'m> {
    pub fn new(metadata: &'m EntityMetadata) -> Self {
        Self {
            metadata,
            query: ListQuery::default(),
            prefix: DEFAULT_PREFIX.to_string(),
            count_only: false,
        }
    }

    pub fn with_query(self, query: ListQuery) -> Self {
        Self { query, ..self }
    }

    /// Alias of the root entity in the statement.
    pub fn with_prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self
        }
    }

    pub fn with_count_only(self, count_only: bool) -> Self {
        Self { count_only, ..self }
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn build(&self) -> Result<AssembledQuery> {
        self.validate_prefix()?;

        let post_filter = self.query.post_filter(self.metadata);
        let shape = match (self.count_only, post_filter.is_active()) {
            (false, _) => Shape::Rows,
            (true, true) => Shape::CountEntities,
            (true, false) if self.query.group_by.is_empty() => Shape::CountRows,
            (true, false) => Shape::CountGroups,
        };

        let mut params = ParamList::default();
        let mut sql = String::from("SELECT ");

        let projection = match shape {
            Shape::Rows => {
                let (select_list, projection) = self.select_list();
                sql.push_str(&select_list);
                projection
            }
            Shape::CountEntities => {
                let id_column = self.metadata.identifier_field()?.column();
                sql.push_str(&format!(
                    "COUNT(DISTINCT {}.{}) AS {}",
                    quote(&self.prefix),
                    quote(id_column),
                    quote(COUNT_ALIAS)
                ));
                Vec::new()
            }
            Shape::CountRows => {
                sql.push_str(&format!("COUNT(*) AS {}", quote(COUNT_ALIAS)));
                Vec::new()
            }
            Shape::CountGroups => {
                sql.push('1');
                Vec::new()
            }
        };

        sql.push_str(&format!(
            " FROM {} AS {}",
            quote(&self.metadata.table),
            quote(&self.prefix)
        ));

        // Folded counts only need root ids; every other shape joins exactly
        // as the row query does.
        let associations = self
            .query
            .associations(shape != Shape::CountEntities);
        for name in &associations {
            sql.push(' ');
            sql.push_str(&self.join_clause(name)?);
        }

        let mut conditions = Vec::new();
        if let Some(constraints) = self.constraint_group(&mut params)? {
            conditions.push(constraints);
        }
        if let Some(search) = &self.query.search {
            if let Some(group) = self.search_group(search, &mut params) {
                conditions.push(group);
            }
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        match shape {
            Shape::Rows => {
                self.push_group_by(&mut sql)?;
                self.push_order_and_page(&mut sql, &mut params)?;
            }
            Shape::CountGroups => {
                self.push_group_by(&mut sql)?;
                sql = format!(
                    "SELECT COUNT(*) AS {} FROM ({}) AS {}",
                    quote(COUNT_ALIAS),
                    sql,
                    quote(GROUPED_ALIAS)
                );
            }
            Shape::CountEntities | Shape::CountRows => {}
        }

        debug!(
            subsystem = "database",
            component = "list_query",
            op = "assemble",
            entity = %self.metadata.name,
            prefix = %self.prefix,
            count_only = self.count_only,
            shape = ?shape,
            join_count = associations.len(),
            param_count = params.params.len(),
            "List query assembled"
        );
        trace!(
            subsystem = "database",
            component = "list_query",
            sql = %sql,
            params = ?params.params.iter().map(QueryParam::describe).collect::<Vec<_>>(),
            "List query text"
        );

        Ok(AssembledQuery {
            sql,
            params: params.params,
            projection,
            post_filter: if self.count_only {
                PostFilter::default()
            } else {
                post_filter
            },
            count_only: self.count_only,
        })
    }

    fn validate_prefix(&self) -> Result<()> {
        validate_identifier(&self.prefix, "prefix")?;
        if self.metadata.has_association(&self.prefix) {
            return Err(Error::InvalidInput(format!(
                "Prefix '{}' collides with an association of '{}'",
                self.prefix, self.metadata.name
            )));
        }
        Ok(())
    }

    /// Select list with duplicate aliases collapsed to their first position.
    fn select_list(&self) -> (String, Vec<ProjectedColumn>) {
        let mut seen = HashSet::new();
        let mut exprs = Vec::new();
        let mut projection = Vec::new();

        for field in self.query.projection(self.metadata) {
            let alias = field.alias();
            if !seen.insert(alias.clone()) {
                continue;
            }
            exprs.push(format!("{} AS {}", self.select_expr(&field), quote(&alias)));
            projection.push(ProjectedColumn {
                alias,
                kind: field.kind,
            });
        }

        (exprs.join(", "), projection)
    }

    /// Column expression normalized to the type the executor decodes.
    fn select_expr(&self, field: &FieldRef) -> String {
        let column = field.qualified_column(&self.prefix);
        match field.kind {
            FieldKind::Integer => format!("CAST({} AS BIGINT)", column),
            FieldKind::Float => format!("CAST({} AS DOUBLE PRECISION)", column),
            FieldKind::Decimal => format!("CAST({} AS NUMERIC)", column),
            FieldKind::Guid => format!("CAST({} AS TEXT)", column),
            FieldKind::DateTime => format!("CAST({} AS TIMESTAMPTZ)", column),
            FieldKind::String | FieldKind::Text | FieldKind::Boolean => column,
        }
    }

    fn join_clause(&self, name: &str) -> Result<String> {
        let assoc = self.metadata.association(name)?;
        let on = match assoc.cardinality {
            Cardinality::ToMany => format!(
                "{}.{} = {}.{}",
                quote(&assoc.name),
                quote(&assoc.join_column),
                quote(&self.prefix),
                quote(self.metadata.identifier_field()?.column())
            ),
            Cardinality::ToOne => format!(
                "{}.{} = {}.{}",
                quote(&assoc.name),
                quote(&assoc.target_identifier),
                quote(&self.prefix),
                quote(&assoc.join_column)
            ),
        };
        Ok(format!(
            "LEFT JOIN {} AS {} ON {}",
            quote(&assoc.table),
            quote(&assoc.name),
            on
        ))
    }

    /// Field outside the projection; repetition indexes make no sense here.
    fn unindexed<'f>(&self, field: &'f FieldRef, usage: &str) -> Result<&'f FieldRef> {
        if field.is_relational() {
            return Err(Error::InvalidInput(format!(
                "{} field '{}' cannot carry a repetition index",
                usage, field
            )));
        }
        Ok(field)
    }

    fn constraint_group(&self, params: &mut ParamList) -> Result<Option<String>> {
        if self.query.constraints.is_empty() {
            return Ok(None);
        }

        let mut group = String::new();
        for (position, constraint) in self.query.constraints.iter().enumerate() {
            if position > 0 {
                group.push(' ');
                group.push_str(constraint.conjunction().as_sql());
                group.push(' ');
            }
            group.push_str(&self.render_constraint(constraint, params)?);
        }
        Ok(Some(format!("({})", group)))
    }

    fn render_constraint(&self, constraint: &Constraint, params: &mut ParamList) -> Result<String> {
        let field = self.unindexed(constraint.field(), "Constraint")?;
        let column = field.qualified_column(&self.prefix);

        match constraint {
            Constraint::Where(clause) => {
                if clause.value.is_null() {
                    return match clause.comparator {
                        Comparator::Equal => Ok(format!("{} IS NULL", column)),
                        Comparator::Unequal => Ok(format!("{} IS NOT NULL", column)),
                        other => Err(Error::InvalidInput(format!(
                            "Cannot compare '{}' with null using {}",
                            field,
                            other.as_sql()
                        ))),
                    };
                }
                let placeholder = params.push(coerce(field, &clause.value)?);
                Ok(format!(
                    "{} {} {}",
                    column,
                    clause.comparator.as_sql(),
                    placeholder
                ))
            }
            Constraint::In { values, .. } => {
                if values.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let placeholder = params.push(coerce_list(field, values)?);
                Ok(format!("{} = ANY({})", column, placeholder))
            }
            Constraint::Between { low, high, .. } => {
                let low = params.push(self.bound(field, low)?);
                let high = params.push(self.bound(field, high)?);
                Ok(format!("{} BETWEEN {} AND {}", column, low, high))
            }
        }
    }

    fn bound(&self, field: &FieldRef, value: &Value) -> Result<QueryParam> {
        if value.is_null() {
            return Err(Error::InvalidInput(format!(
                "BETWEEN bound for '{}' cannot be null",
                field
            )));
        }
        coerce(field, value)
    }

    /// OR-group of search terms, or `None` when no field is eligible.
    ///
    /// The substring parameter and the numeric parameter are each bound
    /// once and shared by every field of their kind.
    fn search_group(&self, search: &SearchPlan, params: &mut ParamList) -> Option<String> {
        if search.is_empty() {
            return None;
        }

        let mut terms = Vec::new();

        if !search.text_fields.is_empty() {
            let placeholder = params.push(QueryParam::String(search.substring_param()));
            for field in &search.text_fields {
                let column = field.qualified_column(&self.prefix);
                let target = match field.kind {
                    FieldKind::Guid => format!("CAST({} AS TEXT)", column),
                    _ => column,
                };
                terms.push(format!("{} ILIKE {} ESCAPE '\\'", target, placeholder));
            }
        }

        if !search.number_fields.is_empty() {
            let placeholder = params.push(QueryParam::Numeric(search.numeric_param()));
            for field in &search.number_fields {
                terms.push(format!(
                    "{} = {}",
                    field.qualified_column(&self.prefix),
                    placeholder
                ));
            }
        }

        debug!(
            subsystem = "database",
            component = "list_query",
            op = "search",
            text_fields = search.text_fields.len(),
            number_fields = search.number_fields.len(),
            "Search terms added"
        );

        Some(format!("({})", terms.join(" OR ")))
    }

    fn push_group_by(&self, sql: &mut String) -> Result<()> {
        if !self.query.group_by.is_empty() {
            let columns = self
                .query
                .group_by
                .iter()
                .map(|f| Ok(self.unindexed(f, "Group-by")?.qualified_column(&self.prefix)))
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns.join(", "));
        }
        Ok(())
    }

    /// ORDER BY and pagination; row queries only.
    fn push_order_and_page(&self, sql: &mut String, params: &mut ParamList) -> Result<()> {
        if !self.query.sort.is_empty() {
            let keys = self
                .query
                .sort
                .iter()
                .map(|s| {
                    let field = self.unindexed(&s.field, "Sort")?;
                    Ok(format!(
                        "{} {}",
                        field.qualified_column(&self.prefix),
                        s.order.as_sql()
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        let page = self.query.page;
        if let Some(limit) = page.limit {
            let placeholder = params.push(limit_param(limit, "Limit")?);
            sql.push_str(&format!(" LIMIT {}", placeholder));
        }
        if let Some(offset) = page.offset {
            let placeholder = params.push(limit_param(offset, "Offset")?);
            sql.push_str(&format!(" OFFSET {}", placeholder));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::contact_metadata;
    use listrepo_core::{
        Conjunction, ListRequest, PageSpec, SearchSpec, SortOrder, WhereClause,
    };
    use serde_json::{json, Map};

    fn resolve(meta: &EntityMetadata, request: &ListRequest, where_eq: Value) -> ListQuery {
        let where_eq: Map<String, Value> = where_eq.as_object().cloned().unwrap();
        ListQuery::from_request(meta, request, &where_eq).unwrap()
    }

    #[test]
    fn test_plain_projection() {
        let meta = contact_metadata();
        let request = ListRequest::new().with_fields(["id", "firstName"]);
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({})))
            .build()
            .unwrap();

        assert_eq!(
            built.sql,
            r#"SELECT CAST("u"."id" AS BIGINT) AS "id", "u"."first_name" AS "firstName" FROM "contact" AS "u""#
        );
        assert!(built.params.is_empty());
        assert_eq!(built.projection.len(), 2);
        assert_eq!(built.projection[1].alias, "firstName");
    }

    #[test]
    fn test_joins_and_where() {
        let meta = contact_metadata();
        let request = ListRequest::new().with_fields(["id", "emails_domain"]);
        let built = ListQueryBuilder::new(&meta)
            .with_prefix("c")
            .with_query(resolve(&meta, &request, json!({"account_name": "ACME"})))
            .build()
            .unwrap();

        assert_eq!(
            built.sql,
            concat!(
                r#"SELECT CAST("c"."id" AS BIGINT) AS "id", "emails"."domain" AS "emails_domain" "#,
                r#"FROM "contact" AS "c" "#,
                r#"LEFT JOIN "contact_email" AS "emails" ON "emails"."contact_id" = "c"."id" "#,
                r#"LEFT JOIN "account" AS "account" ON "account"."id" = "c"."account_id" "#,
                r#"WHERE ("account"."name" = $1)"#
            )
        );
        assert_eq!(built.params, vec![QueryParam::String("ACME".into())]);
    }

    #[test]
    fn test_search_binds_pattern_twice() {
        let meta = contact_metadata();
        let request = ListRequest::new()
            .with_fields(["id"])
            .with_search(SearchSpec::new("42"));
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({})))
            .build()
            .unwrap();

        assert_eq!(
            built.params,
            vec![
                QueryParam::String("%42%".into()),
                QueryParam::Numeric("42".into())
            ]
        );
        assert!(built.sql.contains(r#""u"."first_name" ILIKE $1 ESCAPE '\'"#));
        assert!(built.sql.contains(r#"CAST("u"."uuid" AS TEXT) ILIKE $1"#));
        assert!(built.sql.contains(r#""u"."id" = CAST($2 AS NUMERIC)"#));
        assert!(built.sql.contains(r#""u"."age" = CAST($2 AS NUMERIC)"#));
        assert!(!built.sql.contains(r#""u"."disabled" ILIKE"#));
    }

    #[test]
    fn test_non_numeric_search_skips_number_fields() {
        let meta = contact_metadata();
        let request = ListRequest::new()
            .with_fields(["id"])
            .with_search(SearchSpec::new("max_"));
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({})))
            .build()
            .unwrap();

        assert_eq!(built.params, vec![QueryParam::String(r"%max\_%".into())]);
        assert!(!built.sql.contains("NUMERIC"));
    }

    #[test]
    fn test_search_without_eligible_fields_adds_no_clause() {
        let meta = contact_metadata();
        let request = ListRequest::new()
            .with_fields(["id"])
            .with_search(SearchSpec::new("abc").with_fields(vec!["age".to_string()]));
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({})))
            .build()
            .unwrap();

        assert!(!built.sql.contains("WHERE"));
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_constraints_and_search_are_anded() {
        let meta = contact_metadata();
        let request = ListRequest::new()
            .with_fields(["id"])
            .with_search(SearchSpec::new("max").with_fields(vec!["firstName".to_string()]));
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({"disabled": false})))
            .build()
            .unwrap();

        assert!(built.sql.ends_with(
            r#"WHERE ("u"."disabled" = $1) AND ("u"."first_name" ILIKE $2 ESCAPE '\')"#
        ));
        assert_eq!(
            built.params,
            vec![QueryParam::Bool(false), QueryParam::String("%max%".into())]
        );
    }

    #[test]
    fn test_sort_and_pagination() {
        let meta = contact_metadata();
        let request = ListRequest::new()
            .with_fields(["id"])
            .with_sort("firstName", SortOrder::Desc)
            .with_sort("id", SortOrder::Asc)
            .with_page(PageSpec::new(Some(20), Some(10)));
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({})))
            .build()
            .unwrap();

        assert!(built.sql.ends_with(
            r#"ORDER BY "u"."first_name" DESC, "u"."id" ASC LIMIT $1 OFFSET $2"#
        ));
        assert_eq!(built.params, vec![QueryParam::Int(10), QueryParam::Int(20)]);
    }

    #[test]
    fn test_count_mode() {
        let meta = contact_metadata();
        let request = ListRequest::new()
            .with_fields(["id", "emails[1]_domain"])
            .with_sort("firstName", SortOrder::Asc)
            .with_page(PageSpec::new(Some(5), Some(5)));
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({"age": 30})))
            .with_count_only(true)
            .build()
            .unwrap();

        assert_eq!(
            built.sql,
            r#"SELECT COUNT(DISTINCT "u"."id") AS "totalcount" FROM "contact" AS "u" WHERE ("u"."age" = $1)"#
        );
        assert_eq!(built.params, vec![QueryParam::Int(30)]);
        assert!(built.projection.is_empty());
        assert!(!built.post_filter.is_active());
    }

    #[test]
    fn test_count_keeps_joins_needed_by_search() {
        let meta = contact_metadata();
        let request = ListRequest::new()
            .with_search(SearchSpec::new("a.com").with_fields(vec!["emails_domain".to_string()]));
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({})))
            .with_count_only(true)
            .build()
            .unwrap();

        assert!(built.sql.contains(r#"LEFT JOIN "contact_email" AS "emails""#));
    }

    #[test]
    fn test_count_unfolded_to_many_counts_joined_rows() {
        let meta = contact_metadata();
        let request = ListRequest::new().with_fields(["id", "emails_domain"]);
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({})))
            .with_count_only(true)
            .build()
            .unwrap();

        assert_eq!(
            built.sql,
            concat!(
                r#"SELECT COUNT(*) AS "totalcount" FROM "contact" AS "u" "#,
                r#"LEFT JOIN "contact_email" AS "emails" ON "emails"."contact_id" = "u"."id""#
            )
        );
    }

    #[test]
    fn test_count_where_on_to_many_counts_joined_rows() {
        let meta = contact_metadata();
        let request = ListRequest::new().with_fields(["id"]);
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({"emails_domain": "a.com"})))
            .with_count_only(true)
            .build()
            .unwrap();

        assert!(built.sql.starts_with(r#"SELECT COUNT(*) AS "totalcount""#));
        assert!(built.sql.contains(r#"LEFT JOIN "contact_email" AS "emails""#));
        assert!(built.sql.ends_with(r#"WHERE ("emails"."domain" = $1)"#));
    }

    #[test]
    fn test_count_grouped_counts_groups() {
        let meta = contact_metadata();
        let mut query = resolve(&meta, &ListRequest::new().with_fields(["age"]), json!({}));
        query.group_by.push(meta.resolve("age").unwrap());
        query.page = PageSpec::new(Some(10), Some(10));

        let built = ListQueryBuilder::new(&meta)
            .with_query(query)
            .with_count_only(true)
            .build()
            .unwrap();

        assert_eq!(
            built.sql,
            concat!(
                r#"SELECT COUNT(*) AS "totalcount" FROM "#,
                r#"(SELECT 1 FROM "contact" AS "u" GROUP BY "u"."age") AS "grouped""#
            )
        );
        assert!(built.params.is_empty());
    }

    #[test]
    fn test_indexed_selection_is_projected_once() {
        let meta = contact_metadata();
        let request = ListRequest::new().with_fields(["id", "emails_domain", "emails[1]_domain"]);
        let built = ListQueryBuilder::new(&meta)
            .with_query(resolve(&meta, &request, json!({})))
            .build()
            .unwrap();

        let aliases: Vec<_> = built.projection.iter().map(|p| p.alias.as_str()).collect();
        assert_eq!(aliases, vec!["id", "emails_domain"]);
        assert_eq!(built.sql.matches("LEFT JOIN").count(), 1);
        assert_eq!(built.post_filter.filters().get("emails_domain"), Some(1));
        assert!(built.post_filter.is_active());
    }

    #[test]
    fn test_null_where_values() {
        let meta = contact_metadata();
        let field = meta.resolve("note").unwrap();
        let query = ListQuery {
            constraints: vec![
                Constraint::Where(WhereClause::eq(field.clone(), Value::Null)),
                Constraint::Where(WhereClause::new(
                    field.clone(),
                    Value::Null,
                    Comparator::Unequal,
                    Conjunction::Or,
                )),
            ],
            ..ListQuery::default()
        };
        let built = ListQueryBuilder::new(&meta).with_query(query).build().unwrap();
        assert!(built
            .sql
            .ends_with(r#"WHERE ("u"."note" IS NULL OR "u"."note" IS NOT NULL)"#));

        let bad = ListQuery {
            constraints: vec![Constraint::Where(WhereClause::new(
                field,
                Value::Null,
                Comparator::Greater,
                Conjunction::And,
            ))],
            ..ListQuery::default()
        };
        assert!(matches!(
            ListQueryBuilder::new(&meta).with_query(bad).build(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_in_and_between() {
        let meta = contact_metadata();
        let age = meta.resolve("age").unwrap();
        let query = ListQuery {
            constraints: vec![
                Constraint::In {
                    field: age.clone(),
                    values: vec![json!(20), json!(30)],
                },
                Constraint::Between {
                    field: age.clone(),
                    low: json!(18),
                    high: json!(65),
                    conjunction: Conjunction::Or,
                },
                Constraint::In {
                    field: age,
                    values: vec![],
                },
            ],
            ..ListQuery::default()
        };
        let built = ListQueryBuilder::new(&meta).with_query(query).build().unwrap();

        assert!(built.sql.ends_with(
            r#"WHERE ("u"."age" = ANY($1) OR "u"."age" BETWEEN $2 AND $3 AND FALSE)"#
        ));
        assert_eq!(
            built.params,
            vec![
                QueryParam::IntArray(vec![20, 30]),
                QueryParam::Int(18),
                QueryParam::Int(65)
            ]
        );
    }

    #[test]
    fn test_invalid_where_value_fails() {
        let meta = contact_metadata();
        let query = resolve(&meta, &ListRequest::new(), json!({"age": "old"}));
        assert!(matches!(
            ListQueryBuilder::new(&meta).with_query(query).build(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_prefix_validation() {
        let meta = contact_metadata();
        for prefix in ["emails", "u; DROP TABLE contact", "", "select"] {
            let result = ListQueryBuilder::new(&meta).with_prefix(prefix).build();
            assert!(result.is_err(), "prefix {:?} should be rejected", prefix);
        }
    }

    #[test]
    fn test_indexed_sort_rejected() {
        let meta = contact_metadata();
        let request = ListRequest::new().with_sort("emails[0]_domain", SortOrder::Asc);
        let query = resolve(&meta, &request, json!({}));
        assert!(matches!(
            ListQueryBuilder::new(&meta).with_query(query).build(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_build_does_not_mutate_builder() {
        let meta = contact_metadata();
        let request = ListRequest::new()
            .with_fields(["id"])
            .with_page(PageSpec::new(None, Some(5)));
        let builder = ListQueryBuilder::new(&meta).with_query(resolve(&meta, &request, json!({})));

        let first = builder.build().unwrap();
        let count = builder.clone().with_count_only(true).build().unwrap();
        let second = builder.build().unwrap();

        assert_eq!(first.sql, second.sql);
        assert_eq!(first.params, second.params);
        assert!(count.sql.starts_with("SELECT COUNT(*)"));
    }
}
