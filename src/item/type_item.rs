use super::{to_i64, to_text, unknown, Common, Record};
use crate::attribute::DataType;
use crate::schema::Column;
use serde_json::Value;

/// Entry of a `<domain>/type` table, identified by (domain, code).
#[derive(Clone, Debug, PartialEq)]
pub struct TypeItem {
    pub common: Common,
    pub code: String,
    pub domain: String,
    pub label: String,
    pub status: i64,
}

impl Default for TypeItem {
    fn default() -> Self {
        TypeItem {
            common: Common::default(),
            code: String::new(),
            domain: String::new(),
            label: String::new(),
            status: 1,
        }
    }
}

impl Record for TypeItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("code", DataType::String).required(),
        Column::new("domain", DataType::String).required(),
        Column::new("label", DataType::String),
        Column::new("status", DataType::Int),
    ];

    fn common(&self) -> &Common {
        &self.common
    }

    fn common_mut(&mut self) -> &mut Common {
        &mut self.common
    }

    fn get(&self, key: &str) -> Value {
        match key {
            "code" => Value::from(self.code.as_str()),
            "domain" => Value::from(self.domain.as_str()),
            "label" => Value::from(self.label.as_str()),
            "status" => Value::from(self.status),
            _ => Value::Null,
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "code" => self.code = to_text(value)?,
            "domain" => self.domain = to_text(value)?,
            "label" => self.label = to_text(value)?,
            "status" => self.status = to_i64(value, 1)?,
            _ => return unknown(key),
        }
        Ok(())
    }
}
