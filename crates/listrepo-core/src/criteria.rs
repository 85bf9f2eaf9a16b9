//! Typed constraints, sort, search, and page specifications.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::field_ref::FieldRef;
use crate::metadata::EntityMetadata;

/// Comparison operator of a where clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    Unequal,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl Comparator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparator::Equal => "=",
            Comparator::Unequal => "!=",
            Comparator::Greater => ">",
            Comparator::GreaterOrEqual => ">=",
            Comparator::Less => "<",
            Comparator::LessOrEqual => "<=",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(Comparator::Equal),
            "!=" | "<>" => Ok(Comparator::Unequal),
            ">" => Ok(Comparator::Greater),
            ">=" => Ok(Comparator::GreaterOrEqual),
            "<" => Ok(Comparator::Less),
            "<=" => Ok(Comparator::LessOrEqual),
            other => Err(Error::InvalidInput(format!("Invalid comparator: {}", other))),
        }
    }
}

/// How a clause joins the clauses before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Case-insensitive parse of `asc` / `desc`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(Error::InvalidInput(format!("Invalid sort order: {}", s))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// `field <comparator> value`, joined to its predecessors by `conjunction`.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub field: FieldRef,
    pub value: Value,
    pub comparator: Comparator,
    pub conjunction: Conjunction,
}

impl WhereClause {
    pub fn new(field: FieldRef, value: Value, comparator: Comparator, conjunction: Conjunction) -> Self {
        Self {
            field,
            value,
            comparator,
            conjunction,
        }
    }

    /// Equality clause joined with AND.
    pub fn eq(field: FieldRef, value: Value) -> Self {
        Self::new(field, value, Comparator::Equal, Conjunction::And)
    }
}

/// A row constraint as it reaches the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Where(WhereClause),
    /// `field IN (values)`, always AND-joined
    In { field: FieldRef, values: Vec<Value> },
    /// `field BETWEEN low AND high`
    Between {
        field: FieldRef,
        low: Value,
        high: Value,
        conjunction: Conjunction,
    },
}

impl Constraint {
    pub fn field(&self) -> &FieldRef {
        match self {
            Constraint::Where(clause) => &clause.field,
            Constraint::In { field, .. } | Constraint::Between { field, .. } => field,
        }
    }

    pub fn conjunction(&self) -> Conjunction {
        match self {
            Constraint::Where(clause) => clause.conjunction,
            Constraint::In { .. } => Conjunction::And,
            Constraint::Between { conjunction, .. } => *conjunction,
        }
    }
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: FieldRef,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: FieldRef, order: SortOrder) -> Self {
        Self { field, order }
    }
}

/// Pagination bounds; `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageSpec {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl PageSpec {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(offset: Option<u64>, limit: Option<u64>) -> Self {
        Self { offset, limit }
    }

    /// Bounds for a 1-based page of `limit` rows.
    pub fn for_page(page: u64, limit: Option<u64>) -> Result<Self> {
        if page < crate::defaults::FIRST_PAGE {
            return Err(Error::InvalidInput(format!(
                "Page must be at least {}, got {}",
                crate::defaults::FIRST_PAGE,
                page
            )));
        }
        let offset = match limit {
            Some(l) => Some((page - 1).checked_mul(l).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Page {} with limit {} is out of range",
                    page, l
                ))
            })?),
            None => None,
        };
        Ok(Self { offset, limit })
    }

    pub fn is_bounded(&self) -> bool {
        self.offset.is_some() || self.limit.is_some()
    }
}

/// Free-text search request: a pattern plus the fields allowed to match it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchSpec {
    pub pattern: String,
    /// Explicit field names; empty means every root scalar field
    pub fields: Vec<String>,
}

impl SearchSpec {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Resolve eligible fields and split them by kind.
    ///
    /// Returns `None` for an empty pattern. Text-like fields always take
    /// part; number-like fields only when the pattern is numeric.
    pub fn plan(&self, metadata: &EntityMetadata) -> Result<Option<SearchPlan>> {
        if self.pattern.is_empty() {
            return Ok(None);
        }

        let eligible: Vec<FieldRef> = if self.fields.is_empty() {
            metadata
                .field_names()
                .into_iter()
                .map(|name| metadata.root_ref(name))
                .collect::<Result<_>>()?
        } else {
            self.fields
                .iter()
                .map(|name| metadata.resolve(name))
                .collect::<Result<_>>()?
        };

        SearchPlan::from_fields(&self.pattern, eligible).map(Some)
    }
}

/// Search fields split by match strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    pub pattern: String,
    /// Matched by case-insensitive substring
    pub text_fields: Vec<FieldRef>,
    /// Matched exactly against the numeric pattern
    pub number_fields: Vec<FieldRef>,
}

impl SearchPlan {
    /// Split already resolved fields by kind. Number-like fields are kept
    /// only when `pattern` is numeric; other kinds are dropped.
    pub fn from_fields(pattern: &str, fields: Vec<FieldRef>) -> Result<Self> {
        if let Some(indexed) = fields.iter().find(|f| f.is_relational()) {
            return Err(Error::InvalidInput(format!(
                "Search field '{}' cannot carry a repetition index",
                indexed
            )));
        }

        let numeric = is_numeric(pattern);
        let (text_fields, number_fields): (Vec<_>, Vec<_>) = fields
            .into_iter()
            .filter(|f| f.kind.is_text_like() || (numeric && f.kind.is_number_like()))
            .partition(|f| f.kind.is_text_like());

        Ok(Self {
            pattern: pattern.to_string(),
            text_fields,
            number_fields,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.text_fields.is_empty() && self.number_fields.is_empty()
    }

    /// The pattern bound for substring matches, with LIKE wildcards escaped.
    pub fn substring_param(&self) -> String {
        format!("%{}%", escape_like(&self.pattern))
    }

    /// The pattern bound for exact numeric matches.
    pub fn numeric_param(&self) -> String {
        self.pattern.trim().to_string()
    }
}

/// True if `s` is a finite decimal or scientific number, ignoring
/// surrounding whitespace.
pub fn is_numeric(s: &str) -> bool {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return false;
    }
    // f64 parsing also accepts "inf" and "NaN"; those are words, not numbers.
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E'))
    {
        return false;
    }
    trimmed.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
