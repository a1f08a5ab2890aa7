//! Search attribute definitions and the per-domain registry resolving them.

use crate::error::{ConfigError, MShopError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Storage type of a searchable field; drives value conversion and DDL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    String,
    DateTime,
    Json,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Int => "integer",
            DataType::String => "string",
            DataType::DateTime => "datetime",
            DataType::Json => "json",
        }
    }
}

/// One searchable field: logical code, SQL fragment and the joins it needs.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeDef {
    pub code: String,
    pub label: String,
    /// Qualified column expression, e.g. `mproli."refid"`.
    pub sql: String,
    pub kind: DataType,
    /// Join clauses required whenever this field is referenced.
    pub joins: Vec<String>,
    /// Internal fields (ids, site) are hidden from public listings.
    pub public: bool,
}

impl AttributeDef {
    pub fn new(code: impl Into<String>, sql: impl Into<String>, kind: DataType) -> Self {
        let code = code.into();
        AttributeDef {
            label: code.clone(),
            code,
            sql: sql.into(),
            kind,
            joins: Vec::new(),
            public: true,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn join(mut self, clause: impl Into<String>) -> Self {
        self.joins.push(clause.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }
}

/// Maps codes to definitions for one domain. Unresolved codes fall through to
/// the delegates in the order they were added; the first match wins.
/// Immutable once shared behind an `Arc`.
#[derive(Clone, Debug, Default)]
pub struct AttributeRegistry {
    domain: String,
    defs: Vec<AttributeDef>,
    by_code: HashMap<String, usize>,
    delegates: Vec<Arc<AttributeRegistry>>,
}

impl AttributeRegistry {
    pub fn new(domain: impl Into<String>) -> Self {
        AttributeRegistry {
            domain: domain.into(),
            ..Default::default()
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Adds definitions local to this domain. A code may only be registered once.
    pub fn register<T>(&mut self, defs: T) -> Result<(), ConfigError>
    where
        T: IntoIterator<Item = AttributeDef>,
    {
        for def in defs {
            if self.by_code.contains_key(&def.code) {
                return Err(ConfigError::DuplicateAttribute(def.code));
            }
            self.by_code.insert(def.code.clone(), self.defs.len());
            self.defs.push(def);
        }
        Ok(())
    }

    pub fn delegate(&mut self, sub: Arc<AttributeRegistry>) {
        self.delegates.push(sub);
    }

    pub fn resolve(&self, code: &str) -> Result<&AttributeDef, MShopError> {
        self.lookup(code)
            .ok_or_else(|| MShopError::Compile(code.to_string()))
    }

    fn lookup(&self, code: &str) -> Option<&AttributeDef> {
        if let Some(idx) = self.by_code.get(code) {
            return self.defs.get(*idx);
        }
        self.delegates.iter().find_map(|d| d.lookup(code))
    }

    /// Public definitions, local first, then delegates; shadowed codes are skipped.
    pub fn all_public(&self) -> Vec<&AttributeDef> {
        self.all(true).into_iter().filter(|d| d.public).collect()
    }

    /// Every definition reachable from this registry, optionally including delegates.
    pub fn all(&self, with_sub: bool) -> Vec<&AttributeDef> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect(with_sub, &mut seen, &mut out);
        out
    }

    fn collect<'a>(&'a self, with_sub: bool, seen: &mut HashSet<&'a str>, out: &mut Vec<&'a AttributeDef>) {
        for def in &self.defs {
            if seen.insert(def.code.as_str()) {
                out.push(def);
            }
        }
        if with_sub {
            for sub in &self.delegates {
                sub.collect(with_sub, seen, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_registry() -> Arc<AttributeRegistry> {
        let join = r#"LEFT JOIN "mshop_plugin_type" AS mpluty ON ( mpluty."id" = mplu."typeid" )"#;
        let mut reg = AttributeRegistry::new("plugin/type");
        reg.register([
            AttributeDef::new("plugin.type.id", r#"mpluty."id""#, DataType::Int).join(join).private(),
            AttributeDef::new("plugin.type.code", r#"mpluty."code""#, DataType::String).join(join),
        ])
        .unwrap();
        Arc::new(reg)
    }

    #[test]
    fn resolves_local_before_delegates() {
        let mut reg = AttributeRegistry::new("plugin");
        reg.register([AttributeDef::new("plugin.label", r#"mplu."label""#, DataType::String)])
            .unwrap();
        reg.delegate(type_registry());

        assert_eq!(reg.resolve("plugin.label").unwrap().sql, r#"mplu."label""#);
        let code = reg.resolve("plugin.type.code").unwrap();
        assert_eq!(code.joins.len(), 1);
        assert!(matches!(reg.resolve("plugin.nope"), Err(MShopError::Compile(c)) if c == "plugin.nope"));
    }

    #[test]
    fn first_match_wins_across_delegates() {
        let mut shadow = AttributeRegistry::new("other");
        shadow
            .register([AttributeDef::new("plugin.type.code", "x.code", DataType::String)])
            .unwrap();

        let mut reg = AttributeRegistry::new("plugin");
        reg.delegate(type_registry());
        reg.delegate(Arc::new(shadow));
        assert_eq!(reg.resolve("plugin.type.code").unwrap().sql, r#"mpluty."code""#);
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let mut reg = AttributeRegistry::new("plugin");
        let def = AttributeDef::new("plugin.label", "a", DataType::String);
        let err = reg.register([def.clone(), def]).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAttribute(c) if c == "plugin.label"));
    }

    #[test]
    fn public_listing_hides_internal_fields() {
        let mut reg = AttributeRegistry::new("plugin");
        reg.register([
            AttributeDef::new("plugin.id", r#"mplu."id""#, DataType::Int).private(),
            AttributeDef::new("plugin.label", r#"mplu."label""#, DataType::String),
        ])
        .unwrap();
        reg.delegate(type_registry());

        let codes: Vec<_> = reg.all_public().iter().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["plugin.label", "plugin.type.code"]);
        assert_eq!(reg.all(false).len(), 2);
    }
}
