//! Conversion of Postgres rows into JSON maps.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Number, Value, json};
use sqlguard_runtime::{ExecutorError, Row};
use sqlx::postgres::PgRow;
use sqlx::{Column, Postgres, Row as _, TypeInfo};

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, ExecutorError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
        .map_err(|e| ExecutorError::Conversion(e.to_string()))
}

/// Convert one row, keeping column order.
///
/// Numerics become JSON numbers (as `f64`), dates and timestamps ISO 8601
/// strings, uuids strings, and `json`/`jsonb` values are passed through.
/// Types without a mapping are read as text when possible, else `null`.
pub(crate) fn row_to_json(row: &PgRow) -> Result<Row, ExecutorError> {
    let mut obj = serde_json::Map::new();

    for (idx, col) in row.columns().iter().enumerate() {
        let value = match col.type_info().name() {
            "BOOL" => get::<bool>(row, idx)?.map(Value::Bool),
            "INT2" => get::<i16>(row, idx)?.map(|v| json!(v)),
            "INT4" => get::<i32>(row, idx)?.map(|v| json!(v)),
            "INT8" => get::<i64>(row, idx)?.map(|v| json!(v)),
            "FLOAT4" => get::<f32>(row, idx)?.and_then(|v| float(f64::from(v))),
            "FLOAT8" => get::<f64>(row, idx)?.and_then(float),
            "NUMERIC" => get::<BigDecimal>(row, idx)?.map(|v| decimal(&v)),
            "DATE" => get::<NaiveDate>(row, idx)?.map(|v| json!(v.to_string())),
            "TIME" => get::<NaiveTime>(row, idx)?.map(|v| json!(v.to_string())),
            "TIMESTAMP" => get::<NaiveDateTime>(row, idx)?
                .map(|v| json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
            "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx)?.map(|v| json!(v.to_rfc3339())),
            "UUID" => get::<uuid::Uuid>(row, idx)?.map(|v| json!(v.to_string())),
            "JSON" | "JSONB" => get::<Value>(row, idx)?,
            _ => row.try_get::<Option<String>, _>(idx).ok().flatten().map(Value::String),
        };

        obj.insert(col.name().to_string(), value.unwrap_or(Value::Null));
    }

    Ok(obj)
}

fn float(v: f64) -> Option<Value> {
    Number::from_f64(v).map(Value::Number)
}

/// Decimals go through their text form; values `f64` cannot hold are kept
/// as strings.
fn decimal(v: &BigDecimal) -> Value {
    let text = v.to_string();
    match text.parse::<f64>().ok().and_then(float) {
        Some(n) => n,
        None => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_decimal_to_number() {
        let v = BigDecimal::from_str("1250000.50").unwrap();
        assert_eq!(decimal(&v), json!(1250000.5));
    }

    #[test]
    fn test_huge_decimal_stays_text() {
        let text = format!("1{}", "0".repeat(400));
        let v = BigDecimal::from_str(&text).unwrap();
        assert!(matches!(decimal(&v), Value::String(_)));
    }

    #[test]
    fn test_nan_float_is_null() {
        assert_eq!(float(f64::NAN), None);
    }
}
