//! Resolved field selectors.
//!
//! Callers name fields with plain strings: `name` for a root field,
//! `emails_domain` for a field of an association, and `emails[1]_domain` for
//! the field of one specific repetition of a to-many association. The string
//! grammar is parsed exactly once, against entity metadata, into a
//! [`FieldRef`]; everything downstream works with the typed value.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::descriptor::FieldKind;

static INDEXED_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\[(\d+)\]_([A-Za-z_][A-Za-z0-9_]*)$")
        .expect("indexed key pattern is valid")
});

/// An index-qualified key such as `emails[0]_email`, before metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalKey {
    pub association: String,
    pub index: usize,
    pub field: String,
}

impl RelationalKey {
    /// Parse the `association[index]_field` form. Returns `None` for keys
    /// without an index qualifier.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = INDEXED_KEY.captures(raw)?;
        let index = caps[2].parse().ok()?;
        Some(Self {
            association: caps[1].to_string(),
            index,
            field: caps[3].to_string(),
        })
    }
}

impl fmt::Display for RelationalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]_{}", self.association, self.index, self.field)
    }
}

/// A field selector resolved against entity metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Association the field belongs to (`None` for root fields)
    pub association: Option<String>,

    /// Repetition of a to-many association the caller asked for
    pub index: Option<usize>,

    /// Field name within the root entity or association
    pub field: String,

    /// Storage column
    pub column: String,

    /// Declared scalar kind
    pub kind: FieldKind,
}

impl FieldRef {
    pub fn root(field: impl Into<String>, column: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            association: None,
            index: None,
            field: field.into(),
            column: column.into(),
            kind,
        }
    }

    pub fn associated(
        association: impl Into<String>,
        field: impl Into<String>,
        column: impl Into<String>,
        kind: FieldKind,
    ) -> Self {
        Self {
            association: Some(association.into()),
            ..Self::root(field, column, kind)
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Key under which the field appears in result rows.
    ///
    /// The repetition index is not part of the alias: `emails[1]_domain`
    /// and `emails_domain` both land in `emails_domain`.
    pub fn alias(&self) -> String {
        match &self.association {
            Some(assoc) => format!("{}_{}", assoc, self.field),
            None => self.field.clone(),
        }
    }

    /// Quoted `"alias"."column"` for use in SQL, with `prefix` standing in
    /// for the root alias. Both parts are validated identifiers.
    pub fn qualified_column(&self, prefix: &str) -> String {
        let table_alias = self.association.as_deref().unwrap_or(prefix);
        format!("\"{}\".\"{}\"", table_alias, self.column)
    }

    pub fn is_root(&self) -> bool {
        self.association.is_none()
    }

    pub fn is_relational(&self) -> bool {
        self.index.is_some()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.association, self.index) {
            (Some(assoc), Some(index)) => write!(f, "{}[{}]_{}", assoc, index, self.field),
            _ => f.write_str(&self.alias()),
        }
    }
}
