//! Fully resolved list query.
//!
//! A [`ListQuery`] is what the SQL assembler consumes: every field is already
//! a [`FieldRef`], so assembly never sees caller strings.

use serde_json::{Map, Value};

use crate::criteria::{Constraint, PageSpec, SearchPlan, SortSpec, WhereClause};
use crate::error::{Error, Result};
use crate::field_ref::FieldRef;
use crate::metadata::EntityMetadata;
use crate::post_filter::{PostFilter, RelationalFilters};
use crate::request::ListRequest;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Projected fields; empty projects every root field
    pub select: Vec<FieldRef>,
    pub constraints: Vec<Constraint>,
    pub search: Option<SearchPlan>,
    pub sort: Vec<SortSpec>,
    pub group_by: Vec<FieldRef>,
    pub page: PageSpec,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a request plus an equality map against `metadata`.
    ///
    /// Fails fast on any name that does not resolve.
    pub fn from_request(
        metadata: &EntityMetadata,
        request: &ListRequest,
        where_eq: &Map<String, Value>,
    ) -> Result<Self> {
        let select = request
            .fields
            .iter()
            .map(|name| metadata.resolve(name))
            .collect::<Result<Vec<_>>>()?;

        let mut constraints = Vec::with_capacity(where_eq.len());
        for (key, value) in where_eq {
            let field = metadata.resolve(key)?;
            if field.is_relational() {
                return Err(Error::InvalidInput(format!(
                    "Where key '{}' cannot carry a repetition index",
                    key
                )));
            }
            constraints.push(Constraint::Where(WhereClause::eq(field, value.clone())));
        }

        let search = match &request.search {
            Some(spec) => spec.plan(metadata)?,
            None => None,
        };

        let sort = request
            .sorting
            .iter()
            .map(|(name, order)| {
                let field = metadata.resolve(name)?;
                Ok(SortSpec::new(field, *order))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            select,
            constraints,
            search,
            sort,
            group_by: Vec::new(),
            page: request.page,
        })
    }

    /// Projection with the "empty means every root field" default applied.
    pub fn projection(&self, metadata: &EntityMetadata) -> Vec<FieldRef> {
        if !self.select.is_empty() {
            return self.select.clone();
        }
        metadata
            .fields
            .iter()
            .map(|f| FieldRef::root(&f.name, f.column(), f.kind))
            .collect()
    }

    /// Whether the caller explicitly selected the identifier field.
    pub fn selects_identifier(&self, metadata: &EntityMetadata) -> bool {
        self.select
            .iter()
            .any(|f| f.is_root() && f.field == metadata.identifier)
    }

    /// Alias → index for every index-qualified selection.
    pub fn relational_filters(&self) -> RelationalFilters {
        self.select
            .iter()
            .filter_map(|f| f.index.map(|index| (f.alias(), index)))
            .collect()
    }

    /// Post-filter matching this query's selection.
    pub fn post_filter(&self, metadata: &EntityMetadata) -> PostFilter {
        let id_alias = self
            .selects_identifier(metadata)
            .then(|| metadata.identifier.clone());
        PostFilter::new(self.relational_filters(), id_alias)
    }

    /// Associations referenced by the query, in first-reference order.
    ///
    /// With `include_projection` false, only associations needed to evaluate
    /// constraints, search, sort, and grouping are returned.
    pub fn associations(&self, include_projection: bool) -> Vec<&str> {
        let projected = self.select.iter().filter(|_| include_projection);
        let constrained = self.constraints.iter().map(Constraint::field);
        let searched = self
            .search
            .iter()
            .flat_map(|s| s.text_fields.iter().chain(s.number_fields.iter()));
        let sorted = self.sort.iter().map(|s| &s.field);
        let grouped = self.group_by.iter();

        let mut names: Vec<&str> = Vec::new();
        for field in projected
            .chain(constrained)
            .chain(searched)
            .chain(sorted)
            .chain(grouped)
        {
            if let Some(assoc) = field.association.as_deref() {
                if !names.contains(&assoc) {
                    names.push(assoc);
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{SearchSpec, SortOrder};
    use crate::metadata::tests::contact_metadata;
    use serde_json::json;

    fn where_map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_from_request_resolves_everything() {
        let meta = contact_metadata();
        let request = ListRequest::new()
            .with_fields(["id", "emails[1]_domain", "account_name"])
            .with_search(SearchSpec::new("max"))
            .with_sort("firstName", SortOrder::Desc)
            .with_page(PageSpec::new(Some(10), Some(5)));

        let query =
            ListQuery::from_request(&meta, &request, &where_map(json!({"age": 30}))).unwrap();

        assert_eq!(query.select.len(), 3);
        assert_eq!(query.constraints.len(), 1);
        assert!(query.search.is_some());
        assert_eq!(query.sort[0].field.column, "first_name");
        assert_eq!(query.page.limit, Some(5));
    }

    #[test]
    fn test_unknown_names_fail_fast() {
        let meta = contact_metadata();
        let empty = Map::new();

        let bad_field = ListRequest::new().with_fields(["id", "nickname"]);
        assert!(matches!(
            ListQuery::from_request(&meta, &bad_field, &empty),
            Err(Error::FieldNotFound(_))
        ));

        let bad_sort = ListRequest::new().with_sort("nickname", SortOrder::Asc);
        assert!(matches!(
            ListQuery::from_request(&meta, &bad_sort, &empty),
            Err(Error::FieldNotFound(_))
        ));

        let bad_where = where_map(json!({"nickname": "x"}));
        assert!(matches!(
            ListQuery::from_request(&meta, &ListRequest::new(), &bad_where),
            Err(Error::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_indexed_where_key_rejected() {
        let meta = contact_metadata();
        let where_eq = where_map(json!({"emails[0]_domain": "a.com"}));
        assert!(matches!(
            ListQuery::from_request(&meta, &ListRequest::new(), &where_eq),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_relational_filters_and_identifier() {
        let meta = contact_metadata();
        let request = ListRequest::new().with_fields(["id", "emails[1]_domain"]);
        let query = ListQuery::from_request(&meta, &request, &Map::new()).unwrap();

        assert!(query.selects_identifier(&meta));
        assert_eq!(query.relational_filters().get("emails_domain"), Some(1));
        assert!(query.post_filter(&meta).is_active());

        let without_id = ListRequest::new().with_fields(["emails[1]_domain"]);
        let query = ListQuery::from_request(&meta, &without_id, &Map::new()).unwrap();
        assert!(!query.selects_identifier(&meta));
        assert!(!query.post_filter(&meta).is_active());
    }

    #[test]
    fn test_associated_id_is_not_the_identifier() {
        let meta = contact_metadata();
        let request = ListRequest::new().with_fields(["emails_id", "emails[1]_domain"]);
        let query = ListQuery::from_request(&meta, &request, &Map::new()).unwrap();
        assert!(!query.selects_identifier(&meta));
    }

    #[test]
    fn test_projection_defaults_to_root_fields() {
        let meta = contact_metadata();
        let query = ListQuery::new();
        let names: Vec<_> = query
            .projection(&meta)
            .into_iter()
            .map(|f| f.field)
            .collect();
        assert_eq!(
            names,
            vec!["id", "firstName", "note", "age", "uuid", "disabled", "created"]
        );
    }

    #[test]
    fn test_associations_with_and_without_projection() {
        let meta = contact_metadata();
        let request = ListRequest::new().with_fields(["id", "emails_domain"]);
        let query =
            ListQuery::from_request(&meta, &request, &where_map(json!({"account_name": "ACME"})))
                .unwrap();

        assert_eq!(query.associations(true), vec!["emails", "account"]);
        assert_eq!(query.associations(false), vec!["account"]);
    }
}
