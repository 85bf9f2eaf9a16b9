//! Result rows.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One result row: selected alias → value, in selection order.
pub type Row = Map<String, Value>;

/// Outcome of a list lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum FindResult {
    Rows(Vec<Row>),
    Count(i64),
}

impl FindResult {
    pub fn into_rows(self) -> Result<Vec<Row>> {
        match self {
            FindResult::Rows(rows) => Ok(rows),
            FindResult::Count(_) => Err(Error::Internal(
                "expected rows from a count-only lookup".to_string(),
            )),
        }
    }

    pub fn into_count(self) -> Result<i64> {
        match self {
            FindResult::Count(count) => Ok(count),
            FindResult::Rows(_) => Err(Error::Internal(
                "expected a count from a rows lookup".to_string(),
            )),
        }
    }
}

/// Hash key for an identifier value. Numbers and strings stay distinct.
pub(crate) fn id_key(value: Option<&Value>) -> String {
    value.map(Value::to_string).unwrap_or_else(|| "null".to_string())
}
