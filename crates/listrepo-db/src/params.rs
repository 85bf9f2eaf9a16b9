//! Typed bind parameters for assembled list queries.
//!
//! Caller values arrive as JSON. They are coerced into a [`QueryParam`]
//! according to the declared [`FieldKind`] of the field they constrain, so
//! the database always receives a value of the column's type and never a
//! string spliced into SQL.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use uuid::Uuid;

use listrepo_core::{is_numeric, Error, FieldKind, FieldRef, Result};

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// Integer parameter (also used for LIMIT and OFFSET).
    Int(i64),
    /// Decimal literal sent as text and cast server-side.
    Numeric(String),
    /// Single UUID parameter.
    Uuid(Uuid),
    /// Timestamp parameter.
    Timestamp(DateTime<Utc>),
    /// Boolean parameter.
    Bool(bool),
    /// String parameter.
    String(String),
    /// Array of integers (for `= ANY` matching).
    IntArray(Vec<i64>),
    /// Array of decimal literals.
    NumericArray(Vec<String>),
    /// Array of UUIDs.
    UuidArray(Vec<Uuid>),
    /// Array of timestamps.
    TimestampArray(Vec<DateTime<Utc>>),
    /// Array of booleans.
    BoolArray(Vec<bool>),
    /// Array of strings.
    StringArray(Vec<String>),
}

impl QueryParam {
    /// SQL expression referencing this parameter at position `index`.
    ///
    /// Numeric parameters travel as text, so the placeholder carries the cast.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            QueryParam::Numeric(_) => format!("CAST(${} AS NUMERIC)", index),
            QueryParam::NumericArray(_) => format!("CAST(${} AS NUMERIC[])", index),
            _ => format!("${}", index),
        }
    }

    /// Bound value rendered for debug logs.
    pub fn describe(&self) -> String {
        match self {
            QueryParam::Int(v) => v.to_string(),
            QueryParam::Numeric(v) | QueryParam::String(v) => format!("'{}'", v),
            QueryParam::Uuid(v) => v.to_string(),
            QueryParam::Timestamp(v) => v.to_rfc3339(),
            QueryParam::Bool(v) => v.to_string(),
            QueryParam::IntArray(v) => format!("{:?}", v),
            QueryParam::NumericArray(v) | QueryParam::StringArray(v) => format!("{:?}", v),
            QueryParam::UuidArray(v) => format!("{} uuids", v.len()),
            QueryParam::TimestampArray(v) => format!("{} timestamps", v.len()),
            QueryParam::BoolArray(v) => format!("{:?}", v),
        }
    }
}

/// Bind every parameter, in order, onto `query`.
pub fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Int(v) => query.bind(v),
            QueryParam::Numeric(v) => query.bind(v),
            QueryParam::Uuid(v) => query.bind(v),
            QueryParam::Timestamp(v) => query.bind(v),
            QueryParam::Bool(v) => query.bind(v),
            QueryParam::String(v) => query.bind(v),
            QueryParam::IntArray(v) => query.bind(v),
            QueryParam::NumericArray(v) => query.bind(v),
            QueryParam::UuidArray(v) => query.bind(v),
            QueryParam::TimestampArray(v) => query.bind(v),
            QueryParam::BoolArray(v) => query.bind(v),
            QueryParam::StringArray(v) => query.bind(v),
        };
    }
    query
}

fn mismatch(field: &FieldRef, value: &Value) -> Error {
    Error::InvalidInput(format!(
        "Value {} is not a valid {} for field '{}'",
        value,
        field.kind.as_str(),
        field
    ))
}

/// Coerce a scalar JSON value to the parameter type of `field`.
///
/// `null` is rejected here; the assembler turns it into `IS NULL`.
pub fn coerce(field: &FieldRef, value: &Value) -> Result<QueryParam> {
    let param = match (field.kind, value) {
        (_, Value::Null | Value::Array(_) | Value::Object(_)) => None,

        (FieldKind::String | FieldKind::Text, Value::String(s)) => {
            Some(QueryParam::String(s.clone()))
        }
        (FieldKind::String | FieldKind::Text, Value::Number(n)) => {
            Some(QueryParam::String(n.to_string()))
        }
        (FieldKind::String | FieldKind::Text, Value::Bool(b)) => {
            Some(QueryParam::String(b.to_string()))
        }

        (FieldKind::Guid, Value::String(s)) => {
            Uuid::parse_str(s.trim()).ok().map(QueryParam::Uuid)
        }

        (FieldKind::Integer, Value::Number(n)) => n.as_i64().map(QueryParam::Int),
        (FieldKind::Integer, Value::String(s)) => s.trim().parse().ok().map(QueryParam::Int),

        (FieldKind::Float | FieldKind::Decimal, Value::Number(n)) => {
            Some(QueryParam::Numeric(n.to_string()))
        }
        (FieldKind::Float | FieldKind::Decimal, Value::String(s)) if is_numeric(s) => {
            Some(QueryParam::Numeric(s.trim().to_string()))
        }

        (FieldKind::Boolean, Value::Bool(b)) => Some(QueryParam::Bool(*b)),
        (FieldKind::Boolean, Value::String(s)) => parse_bool(s).map(QueryParam::Bool),
        (FieldKind::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(0) => Some(QueryParam::Bool(false)),
            Some(1) => Some(QueryParam::Bool(true)),
            _ => None,
        },

        (FieldKind::DateTime, Value::String(s)) => parse_timestamp(s).map(QueryParam::Timestamp),

        _ => None,
    };

    param.ok_or_else(|| mismatch(field, value))
}

/// Coerce a list of values to one array parameter for `= ANY` matching.
pub fn coerce_list(field: &FieldRef, values: &[Value]) -> Result<QueryParam> {
    let params = values
        .iter()
        .map(|v| coerce(field, v))
        .collect::<Result<Vec<_>>>()?;

    macro_rules! collect_as {
        ($variant:ident, $array:ident) => {
            QueryParam::$array(
                params
                    .into_iter()
                    .filter_map(|p| match p {
                        QueryParam::$variant(v) => Some(v),
                        _ => None,
                    })
                    .collect(),
            )
        };
    }

    Ok(match field.kind {
        FieldKind::String | FieldKind::Text => collect_as!(String, StringArray),
        FieldKind::Guid => collect_as!(Uuid, UuidArray),
        FieldKind::Integer => collect_as!(Int, IntArray),
        FieldKind::Float | FieldKind::Decimal => collect_as!(Numeric, NumericArray),
        FieldKind::Boolean => collect_as!(Bool, BoolArray),
        FieldKind::DateTime => collect_as!(Timestamp, TimestampArray),
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// RFC 3339 timestamps, or plain `YYYY-MM-DD` dates taken as midnight UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(kind: FieldKind) -> FieldRef {
        FieldRef::root("f", "f", kind)
    }

    #[test]
    fn test_placeholder_casts_numeric() {
        assert_eq!(QueryParam::Int(1).placeholder(3), "$3");
        assert_eq!(
            QueryParam::Numeric("1.5".into()).placeholder(2),
            "CAST($2 AS NUMERIC)"
        );
        assert_eq!(
            QueryParam::NumericArray(vec![]).placeholder(1),
            "CAST($1 AS NUMERIC[])"
        );
    }

    #[test]
    fn test_coerce_integer() {
        let f = field(FieldKind::Integer);
        assert_eq!(coerce(&f, &json!(42)).unwrap(), QueryParam::Int(42));
        assert_eq!(coerce(&f, &json!(" 7 ")).unwrap(), QueryParam::Int(7));
        assert!(coerce(&f, &json!(1.5)).is_err());
        assert!(coerce(&f, &json!("seven")).is_err());
    }

    #[test]
    fn test_coerce_decimal_keeps_literal() {
        let f = field(FieldKind::Decimal);
        assert_eq!(
            coerce(&f, &json!("19.99")).unwrap(),
            QueryParam::Numeric("19.99".into())
        );
        assert_eq!(
            coerce(&f, &json!(3)).unwrap(),
            QueryParam::Numeric("3".into())
        );
        assert!(coerce(&f, &json!("NaN")).is_err());
    }

    #[test]
    fn test_coerce_guid() {
        let f = field(FieldKind::Guid);
        let id = Uuid::new_v4();
        assert_eq!(
            coerce(&f, &json!(id.to_string())).unwrap(),
            QueryParam::Uuid(id)
        );
        assert!(coerce(&f, &json!("not-a-uuid")).is_err());
    }

    #[test]
    fn test_coerce_boolean_forms() {
        let f = field(FieldKind::Boolean);
        assert_eq!(coerce(&f, &json!(true)).unwrap(), QueryParam::Bool(true));
        assert_eq!(coerce(&f, &json!("FALSE")).unwrap(), QueryParam::Bool(false));
        assert_eq!(coerce(&f, &json!(1)).unwrap(), QueryParam::Bool(true));
        assert!(coerce(&f, &json!(2)).is_err());
    }

    #[test]
    fn test_coerce_datetime() {
        let f = field(FieldKind::DateTime);
        let QueryParam::Timestamp(ts) = coerce(&f, &json!("2024-03-01T10:00:00+02:00")).unwrap()
        else {
            panic!("expected timestamp");
        };
        assert_eq!(ts.to_rfc3339(), "2024-03-01T08:00:00+00:00");

        let QueryParam::Timestamp(day) = coerce(&f, &json!("2024-03-01")).unwrap() else {
            panic!("expected timestamp");
        };
        assert_eq!(day.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_coerce_rejects_composites_and_null() {
        let f = field(FieldKind::String);
        assert!(matches!(coerce(&f, &json!(null)), Err(Error::InvalidInput(_))));
        assert!(coerce(&f, &json!([1])).is_err());
        assert!(coerce(&f, &json!({"a": 1})).is_err());
    }

    #[test]
    fn test_coerce_list() {
        let ints = coerce_list(&field(FieldKind::Integer), &[json!(1), json!("2")]).unwrap();
        assert_eq!(ints, QueryParam::IntArray(vec![1, 2]));

        let strings = coerce_list(&field(FieldKind::Text), &[json!("a"), json!(3)]).unwrap();
        assert_eq!(
            strings,
            QueryParam::StringArray(vec!["a".into(), "3".into()])
        );

        assert!(coerce_list(&field(FieldKind::Integer), &[json!(1), json!("x")]).is_err());
    }
}
