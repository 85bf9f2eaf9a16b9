//! REST-style list request parameters.
//!
//! Parses the query string of a list endpoint:
//!
//! | Parameter      | Meaning                                      |
//! |----------------|----------------------------------------------|
//! | `fields`       | comma-separated selection, e.g. `id,emails[0]_email` |
//! | `search`       | free-text pattern                            |
//! | `searchFields` | comma-separated fields eligible for search   |
//! | `sortBy`       | field to sort by                             |
//! | `sortOrder`    | `asc` (default) or `desc`                    |
//! | `limit`        | page size                                    |
//! | `page`         | 1-based page number (default 1)              |
//!
//! Field names stay strings here; they are resolved against entity metadata
//! when the request is turned into a `ListQuery`.

use std::collections::HashMap;

use crate::criteria::{PageSpec, SearchSpec, SortOrder};
use crate::error::{Error, Result};

/// Parsed list parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Selected fields (empty selects every root field)
    pub fields: Vec<String>,

    pub search: Option<SearchSpec>,

    /// Sort keys in priority order
    pub sorting: Vec<(String, SortOrder)>,

    pub page: PageSpec,
}

impl ListRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_search(mut self, search: SearchSpec) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sorting.push((field.into(), order));
        self
    }

    pub fn with_page(mut self, page: PageSpec) -> Self {
        self.page = page;
        self
    }

    /// Same request without pagination bounds.
    pub fn unpaginated(&self) -> Self {
        Self {
            page: PageSpec::unbounded(),
            ..self.clone()
        }
    }

    /// Parse query-string parameters. Unknown parameters are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut request = Self::new();

        if let Some(fields) = params.get("fields") {
            request.fields = parse_list(fields);
        }

        if let Some(pattern) = params.get("search").filter(|p| !p.is_empty()) {
            let fields = params
                .get("searchFields")
                .map(|f| parse_list(f))
                .unwrap_or_default();
            request.search = Some(SearchSpec::new(pattern.clone()).with_fields(fields));
        }

        if let Some(sort_by) = params.get("sortBy").filter(|s| !s.is_empty()) {
            let order = match params.get("sortOrder") {
                Some(order) => SortOrder::parse(order)?,
                None => SortOrder::Asc,
            };
            request.sorting.push((sort_by.clone(), order));
        }

        let limit = params
            .get("limit")
            .map(|v| parse_number(v, "limit"))
            .transpose()?;
        let page = params
            .get("page")
            .map(|v| parse_number(v, "page"))
            .transpose()?
            .unwrap_or(crate::defaults::FIRST_PAGE);
        request.page = PageSpec::for_page(page, limit)?;

        Ok(request)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number(value: &str, name: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Invalid {}: {}", name, value)))
}
