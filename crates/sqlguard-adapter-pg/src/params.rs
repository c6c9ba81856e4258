//! Positional binding of JSON parameters.
//!
//! Parameters arrive without column metadata, so the Postgres type is
//! chosen from the JSON value. Strings that look like ISO dates or RFC 3339
//! timestamps are bound as `date` / `timestamptz` so that predicates such as
//! `sale_date BETWEEN $1 AND $2` type-check.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlguard_runtime::ExecutorError;
use sqlx::Arguments;
use sqlx::postgres::PgArguments;

fn args_add<T>(args: &mut PgArguments, v: T) -> Result<(), ExecutorError>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    args.add(v).map_err(|e| ExecutorError::Conversion(e.to_string()))
}

/// Postgres type a JSON parameter is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParamKind {
    Null,
    Bool,
    Int,
    Float,
    Date,
    Timestamp,
    Text,
    Json,
}

impl ParamKind {
    pub(crate) fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_i64() => Self::Int,
            Value::Number(_) => Self::Float,
            Value::String(s) if parse_date(s).is_some() => Self::Date,
            Value::String(s) if parse_timestamp(s).is_some() => Self::Timestamp,
            Value::String(_) => Self::Text,
            Value::Array(_) | Value::Object(_) => Self::Json,
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Bind `params` in order.
pub(crate) fn bind_params(params: &[Value]) -> Result<PgArguments, ExecutorError> {
    let mut args = PgArguments::default();

    for (i, value) in params.iter().enumerate() {
        match (ParamKind::of(value), value) {
            (ParamKind::Null, _) => args_add(&mut args, Option::<String>::None)?,
            (ParamKind::Bool, Value::Bool(b)) => args_add(&mut args, *b)?,
            (ParamKind::Int, Value::Number(n)) => {
                let v = n.as_i64().ok_or_else(|| {
                    ExecutorError::Conversion(format!("parameter ${}: {n}", i + 1))
                })?;
                args_add(&mut args, v)?
            }
            (ParamKind::Float, Value::Number(n)) => {
                let v = n.as_f64().ok_or_else(|| {
                    ExecutorError::Conversion(format!("parameter ${}: {n}", i + 1))
                })?;
                args_add(&mut args, v)?
            }
            (ParamKind::Date, Value::String(s)) => match parse_date(s) {
                Some(d) => args_add(&mut args, d)?,
                None => args_add(&mut args, s.clone())?,
            },
            (ParamKind::Timestamp, Value::String(s)) => match parse_timestamp(s) {
                Some(t) => args_add(&mut args, t)?,
                None => args_add(&mut args, s.clone())?,
            },
            (ParamKind::Json, v) => args_add(&mut args, sqlx::types::Json(v.clone()))?,
            (_, v) => args_add(&mut args, value_to_string(v))?,
        }
    }

    Ok(args)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_param_kinds() {
        assert_eq!(ParamKind::of(&json!(null)), ParamKind::Null);
        assert_eq!(ParamKind::of(&json!(true)), ParamKind::Bool);
        assert_eq!(ParamKind::of(&json!(42)), ParamKind::Int);
        assert_eq!(ParamKind::of(&json!(1.5)), ParamKind::Float);
        assert_eq!(ParamKind::of(&json!("2025-01-01")), ParamKind::Date);
        assert_eq!(ParamKind::of(&json!("2025-01-01T10:00:00Z")), ParamKind::Timestamp);
        assert_eq!(ParamKind::of(&json!("Northeast")), ParamKind::Text);
        assert_eq!(ParamKind::of(&json!("2025-13-45")), ParamKind::Text);
        assert_eq!(ParamKind::of(&json!({"a": 1})), ParamKind::Json);
    }

    #[test]
    fn test_bind_params_accepts_every_kind() {
        let params = vec![
            json!(null),
            json!(false),
            json!(7),
            json!(0.25),
            json!("2025-03-31"),
            json!("2025-03-31T23:59:59+00:00"),
            json!("store_12"),
            json!([1, 2, 3]),
        ];
        assert!(bind_params(&params).is_ok());
    }
}
