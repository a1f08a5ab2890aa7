//! Convert serde_json::Value to typed values that sqlx can bind through the `Any` driver.

use crate::attribute::DataType;
use crate::error::MShopError;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;

/// Storage format of datetime columns.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A value bound to a statement. Nulls keep their column type so PostgreSQL
/// receives a parameter of the right kind.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null(DataType),
    Int(i64),
    Text(String),
}

impl BindValue {
    pub fn from_json(v: &Value, kind: DataType) -> Result<Self, MShopError> {
        convert(v, kind).map_err(MShopError::Validation)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BindValue::Null(_))
    }

    pub fn bind<'q>(&self, query: Query<'q, Any, AnyArguments<'q>>) -> Query<'q, Any, AnyArguments<'q>> {
        match self {
            BindValue::Null(DataType::Int) => query.bind(None::<i64>),
            BindValue::Null(_) => query.bind(None::<String>),
            BindValue::Int(n) => query.bind(*n),
            BindValue::Text(s) => query.bind(s.clone()),
        }
    }
}

/// Conversion shared by statement binding and item field assignment.
pub(crate) fn convert(v: &Value, kind: DataType) -> Result<BindValue, String> {
    if v.is_null() {
        return Ok(BindValue::Null(kind));
    }
    match kind {
        DataType::Int => match v {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(BindValue::Int)
                .ok_or_else(|| format!("expected an integer, got {}", n)),
            Value::Bool(b) => Ok(BindValue::Int(i64::from(*b))),
            Value::String(s) if s.trim().is_empty() => Ok(BindValue::Null(kind)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(BindValue::Int)
                .map_err(|_| format!("expected an integer, got '{}'", s)),
            other => Err(format!("expected an integer, got {}", type_name_of_json(other))),
        },
        DataType::String => match v {
            Value::String(s) => Ok(BindValue::Text(s.clone())),
            Value::Number(n) => Ok(BindValue::Text(n.to_string())),
            Value::Bool(b) => Ok(BindValue::Text(b.to_string())),
            other => Err(format!("expected a string, got {}", type_name_of_json(other))),
        },
        DataType::DateTime => match v {
            Value::String(s) if s.trim().is_empty() => Ok(BindValue::Null(kind)),
            Value::String(s) => normalize_datetime(s).map(BindValue::Text),
            other => Err(format!("expected a datetime, got {}", type_name_of_json(other))),
        },
        DataType::Json => match v {
            Value::Object(_) => serde_json::to_string(v)
                .map(BindValue::Text)
                .map_err(|e| e.to_string()),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(_)) => Ok(BindValue::Text(s.clone())),
                _ => Err(format!("expected a JSON object, got '{}'", s)),
            },
            other => Err(format!("expected an object, got {}", type_name_of_json(other))),
        },
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS`, the `T`-separated form, or a bare date.
fn normalize_datetime(s: &str) -> Result<String, String> {
    let s = s.trim().replace('T', " ");
    if let Ok(dt) = NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT) {
        return Ok(dt.format(DATETIME_FORMAT).to_string());
    }
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map(|d| format!("{} 00:00:00", d.format("%Y-%m-%d")))
        .map_err(|_| format!("expected a datetime, got '{}'", s))
}

fn type_name_of_json(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
