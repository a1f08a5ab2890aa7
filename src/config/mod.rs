//! Configuration tree with slash-separated path lookup, typed settings and
//! per-domain validation rules.

pub mod loader;
pub mod types;
pub mod validator;

pub use loader::*;
pub use types::*;
pub use validator::*;

use crate::error::ConfigError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// JSON configuration addressed by paths like `mshop/common/manager/maxcount`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    root: Map<String, Value>,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(root) => Ok(Config { root }),
            other => Err(ConfigError::Load(format!("configuration root must be an object, got {}", other))),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = segments(path);
        let first = parts.next()?;
        parts.try_fold(self.root.get(first)?, |node, part| node.get(part))
    }

    /// Typed lookup; a present value of the wrong shape is an error.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ConfigError> {
        match self.get(path) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| ConfigError::Validation(format!("{}: {}", path, e))),
        }
    }

    /// Value at `path`, or `default` when missing or not convertible.
    pub fn get_or<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        self.get_as(path).ok().flatten().unwrap_or(default)
    }

    /// Sets a value, creating intermediate objects (and replacing scalars in the way).
    pub fn set(&mut self, path: &str, value: Value) {
        let mut parts: Vec<&str> = segments(path).collect();
        let Some(last) = parts.pop() else { return };
        let mut node = &mut self.root;
        for part in parts {
            let entry = node
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            node = match entry {
                Value::Object(map) => map,
                _ => return,
            };
        }
        node.insert(last.to_string(), value);
    }

    /// Rules of `mshop/<path>/manager/validate`, keyed by field key.
    pub fn validation_rules(&self, path: &str) -> Result<HashMap<String, ValidationRule>, ConfigError> {
        let rules: HashMap<String, ValidationRule> = self
            .get_as(&format!("mshop/{}/manager/validate", path))?
            .unwrap_or_default();
        validate_rules(path, &rules)?;
        Ok(rules)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|p| !p.is_empty())
}
