//! Relational index filtering.
//!
//! A join against a to-many association yields one row per (entity, related
//! row) pair. When the caller selects `emails[1]_domain` they want a single
//! row per entity carrying the domain of the *second* email. SQL cannot say
//! that as a row predicate, so the rows are folded here instead:
//!
//! - the first row seen for an id becomes that id's representative row and
//!   counts as repetition 0 (the counter starts at -1 and is incremented on
//!   every row for the id, including the first);
//! - whenever a row's repetition equals a filter's index, the filter's field
//!   is copied from that row into the representative;
//! - later rows for a known id are never admitted.
//!
//! Folding needs the identifier in the rows. Without it the rows are
//! returned untouched, duplicates included.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::row::{id_key, Row};

/// Output alias → repetition index requested for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationalFilters {
    entries: Vec<(String, usize)>,
}

impl RelationalFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a filter; a later filter for the same alias replaces the earlier one.
    pub fn insert(&mut self, alias: impl Into<String>, index: usize) {
        let alias = alias.into();
        match self.entries.iter_mut().find(|(a, _)| *a == alias) {
            Some(entry) => entry.1 = index,
            None => self.entries.push((alias, index)),
        }
    }

    pub fn get(&self, alias: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, index)| *index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(a, i)| (a.as_str(), *i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for RelationalFilters {
    fn from_iter<T: IntoIterator<Item = (S, usize)>>(iter: T) -> Self {
        let mut filters = Self::new();
        for (alias, index) in iter {
            filters.insert(alias, index);
        }
        filters
    }
}

/// Folds flat join rows into one representative row per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    filters: RelationalFilters,
    /// Alias of the identifier, present only if the caller selected it
    id_alias: Option<String>,
}

impl PostFilter {
    pub fn new(filters: RelationalFilters, id_alias: Option<String>) -> Self {
        Self { filters, id_alias }
    }

    pub fn filters(&self) -> &RelationalFilters {
        &self.filters
    }

    /// True if `apply` will fold rows.
    pub fn is_active(&self) -> bool {
        !self.filters.is_empty() && self.id_alias.is_some()
    }

    pub fn apply(&self, rows: Vec<Row>) -> Vec<Row> {
        if self.filters.is_empty() {
            return rows;
        }
        let Some(id_alias) = self.id_alias.as_deref() else {
            warn!(
                subsystem = "listing",
                component = "post_filter",
                filter_count = self.filters.len(),
                result_count = rows.len(),
                "Relational filters requested without selecting the identifier; rows left unfolded"
            );
            return rows;
        };

        let input_count = rows.len();
        // id key -> (position of representative row, current repetition)
        let mut seen: HashMap<String, (usize, i64)> = HashMap::new();
        let mut folded: Vec<Row> = Vec::new();

        for row in rows {
            let key = id_key(row.get(id_alias));
            let entry = seen.entry(key).or_insert_with(|| {
                folded.push(row.clone());
                (folded.len() - 1, -1)
            });
            entry.1 += 1;
            let (position, repetition) = *entry;

            trace!(
                subsystem = "listing",
                component = "post_filter",
                position,
                repetition,
                "Row visited"
            );

            for (alias, index) in self.filters.iter() {
                if index as i64 == repetition {
                    let value = row.get(alias).cloned().unwrap_or(Value::Null);
                    folded[position].insert(alias.to_string(), value);
                }
            }
        }

        debug!(
            subsystem = "listing",
            component = "post_filter",
            filter_count = self.filters.len(),
            input_count,
            result_count = folded.len(),
            "Relational filters applied"
        );
        folded
    }
}
