//! Conversion of result rows into change-tracked records

use crate::domain::{BeltError, FieldMap, Result, TrackedRow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use tokio_postgres::types::Type;
use tokio_postgres::Row;
use uuid::Uuid;

/// Convert a row into a [`TrackedRow`] keyed by `key`, if given
pub fn tracked_row(row: &Row, key: Option<&str>) -> Result<TrackedRow> {
    let mut fields = FieldMap::new();
    for (idx, column) in row.columns().iter().enumerate() {
        fields.insert(column.name().to_string(), column_value(row, idx, column.type_())?);
    }

    let tracked = TrackedRow::new(fields);
    Ok(match key {
        Some(key) => tracked.with_key(key),
        None => tracked,
    })
}

/// Read one column as JSON. NULL becomes `Value::Null`; types without a direct
/// mapping are read as text.
fn column_value(row: &Row, idx: usize, ty: &Type) -> Result<Value> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::from),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(Value::from),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|f| Value::from(f64::from(f))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?,
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map(|u| Value::String(u.to_string())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::String(d.to_string())),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(|t| Value::String(t.to_string())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|t| Value::String(t.to_string())),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|t| Value::String(t.to_rfc3339())),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .map_err(|_| {
                BeltError::Source(format!(
                    "Column '{}' has unsupported type {}; cast it to text in the query",
                    row.columns()[idx].name(),
                    ty
                ))
            })?
            .map(Value::String),
    };

    Ok(value.unwrap_or(Value::Null))
}
