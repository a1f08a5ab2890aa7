//! Field validation from configured rules and column requirements.

use crate::config::ValidationRule;
use crate::error::MShopError;
use crate::schema::Column;
use chrono::NaiveDate;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Checks required columns, then every configured rule. `fields` is keyed
    /// by field key (`code`, `position`), messages use `prefix`.
    pub fn validate(
        prefix: &str,
        fields: &Map<String, Value>,
        columns: &[Column],
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), MShopError> {
        for col in columns.iter().filter(|c| c.required) {
            if is_blank(fields.get(col.key)) {
                return Err(MShopError::Validation(format!("{}.{} is required", prefix, col.key)));
            }
        }
        for (key, rule) in rules {
            let val = fields.get(key);
            if rule.required == Some(true) && is_blank(val) {
                return Err(MShopError::Validation(format!("{}.{} is required", prefix, key)));
            }
            if let Some(v) = val {
                validate_field(&format!("{}.{}", prefix, key), v, rule)?;
            }
        }
        Ok(())
    }
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn validate_field(name: &str, v: &Value, rule: &ValidationRule) -> Result<(), MShopError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(name, v, format)?;
    }
    if let (Some(max), Some(s)) = (rule.max_length, v.as_str()) {
        if s.chars().count() > max as usize {
            return Err(MShopError::Validation(format!(
                "{} must be at most {} characters",
                name, max
            )));
        }
    }
    if let (Some(min), Some(s)) = (rule.min_length, v.as_str()) {
        if s.chars().count() < min as usize {
            return Err(MShopError::Validation(format!(
                "{} must be at least {} characters",
                name, min
            )));
        }
    }
    if let Some(pattern) = &rule.pattern {
        let re = Regex::new(pattern).map_err(|_| MShopError::Validation(format!("invalid pattern for {}", name)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(MShopError::Validation(format!("{} does not match required pattern", name)));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(MShopError::Validation(format!(
                "{} must be one of: {:?}",
                name,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let (Some(min), Some(n)) = (rule.minimum, v.as_f64()) {
        if n < min {
            return Err(MShopError::Validation(format!("{} must be at least {}", name, min)));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, v.as_f64()) {
        if n > max {
            return Err(MShopError::Validation(format!("{} must be at most {}", name, max)));
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(name: &str, v: &Value, format: &str) -> Result<(), MShopError> {
    let Some(s) = v.as_str() else { return Ok(()) };
    if s.is_empty() {
        return Ok(());
    }
    match format.to_lowercase().as_str() {
        "email" => {
            if !s.contains('@') || s.len() < 3 {
                return Err(MShopError::Validation(format!("{} must be a valid email", name)));
            }
        }
        "date" => {
            if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() {
                return Err(MShopError::Validation(format!("{} must be a date (YYYY-MM-DD)", name)));
            }
        }
        _ => {}
    }
    Ok(())
}
