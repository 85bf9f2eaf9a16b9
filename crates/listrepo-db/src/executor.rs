//! Query execution against PostgreSQL.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::BigDecimal;
use sqlx::Row as _;
use tracing::debug;

use listrepo_core::defaults::COUNT_ALIAS;
use listrepo_core::{Error, FieldKind, Result, Row};

use crate::assembly::{AssembledQuery, ProjectedColumn};
use crate::params::bind_params;
use crate::pool::warn_if_saturated;

/// Storage boundary: runs assembled statements.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// All rows of a row-mode statement, decoded by projected kind.
    async fn fetch_rows(&self, query: &AssembledQuery) -> Result<Vec<Row>>;

    /// The `totalcount` aggregate of a count-mode statement.
    async fn fetch_count(&self, query: &AssembledQuery) -> Result<i64>;
}

/// PostgreSQL implementation of [`QueryExecutor`].
#[derive(Debug, Clone)]
pub struct PgQueryExecutor {
    pool: PgPool,
}

impl PgQueryExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn fetch_rows(&self, query: &AssembledQuery) -> Result<Vec<Row>> {
        if query.count_only {
            return Err(Error::Internal(
                "count statement passed to fetch_rows".to_string(),
            ));
        }

        let start = Instant::now();
        let pg_rows = bind_params(sqlx::query(&query.sql), &query.params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let rows = pg_rows
            .iter()
            .map(|row| decode_row(row, &query.projection))
            .collect::<Result<Vec<_>>>()?;

        warn_if_saturated(&self.pool, "fetch_rows");
        debug!(
            subsystem = "database",
            component = "executor",
            op = "fetch_rows",
            result_count = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Rows fetched"
        );
        Ok(rows)
    }

    async fn fetch_count(&self, query: &AssembledQuery) -> Result<i64> {
        if !query.count_only {
            return Err(Error::Internal(
                "row statement passed to fetch_count".to_string(),
            ));
        }

        let start = Instant::now();
        let row = bind_params(sqlx::query(&query.sql), &query.params)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        let count: i64 = row.try_get(COUNT_ALIAS)?;

        warn_if_saturated(&self.pool, "fetch_count");
        debug!(
            subsystem = "database",
            component = "executor",
            op = "fetch_count",
            result_count = count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Count fetched"
        );
        Ok(count)
    }
}

fn decode_row(row: &PgRow, projection: &[ProjectedColumn]) -> Result<Row> {
    let mut out = Row::new();
    for column in projection {
        out.insert(column.alias.clone(), decode_value(row, column)?);
    }
    Ok(out)
}

/// Decode one column. The assembler casts each projected column, so the
/// wire type is fixed per kind.
fn decode_value(row: &PgRow, column: &ProjectedColumn) -> Result<Value> {
    let name = column.alias.as_str();
    let value = match column.kind {
        FieldKind::String | FieldKind::Text | FieldKind::Guid => {
            row.try_get::<Option<String>, _>(name)?.map(Value::String)
        }
        FieldKind::Integer => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        FieldKind::Float => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(Number::from_f64)
            .map(Value::Number),
        FieldKind::Decimal => row
            .try_get::<Option<BigDecimal>, _>(name)?
            .map(|d| decimal_value(&d)),
        FieldKind::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        FieldKind::DateTime => row
            .try_get::<Option<DateTime<Utc>>, _>(name)?
            .map(|ts| Value::String(ts.to_rfc3339())),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// JSON number when representable, otherwise the exact decimal text.
fn decimal_value(decimal: &BigDecimal) -> Value {
    let text = decimal.to_string();
    match text.parse::<Number>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_decimal_value() {
        let d = BigDecimal::from_str("19.99").unwrap();
        assert_eq!(decimal_value(&d), serde_json::json!(19.99));

        let whole = BigDecimal::from_str("42").unwrap();
        assert_eq!(decimal_value(&whole), serde_json::json!(42));
    }
}
