//! Table layouts of the standard domains and the search attributes derived from them.

use crate::attribute::{AttributeDef, AttributeRegistry, DataType};
use crate::error::ConfigError;
use crate::item::{
    AttributeItem, CatalogItem, ListItem, MediaItem, PluginItem, PriceItem, ProductItem, Record, TextItem,
    TypeItem,
};
use crate::sql::quoted;
use std::sync::Arc;

/// A data column. `key` is the field name used in search codes and field maps
/// (`pos` is exposed as `position`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub key: &'static str,
    pub kind: DataType,
    pub required: bool,
}

impl Column {
    pub const fn new(name: &'static str, kind: DataType) -> Self {
        Column {
            name,
            key: name,
            kind,
            required: false,
        }
    }

    pub const fn key(self, key: &'static str) -> Self {
        Column { key, ..self }
    }

    pub const fn required(self) -> Self {
        Column { required: true, ..self }
    }
}

/// Storage layout of one manager. `id`, `siteid`, `ctime`, `mtime` and `editor`
/// are implied; `columns` lists the data columns in select order.
#[derive(Clone, Debug)]
pub struct Schema {
    pub path: String,
    pub table: String,
    pub alias: String,
    pub columns: &'static [Column],
    /// Business key columns (besides `siteid`), unique at storage level.
    pub unique: &'static [&'static str],
    pub type_schema: Option<Box<Schema>>,
}

impl Schema {
    pub fn of<I: Record>(path: &str, table: &str, alias: &str) -> Self {
        Schema {
            path: path.to_string(),
            table: table.to_string(),
            alias: alias.to_string(),
            columns: I::COLUMNS,
            unique: &[],
            type_schema: None,
        }
    }

    pub fn unique(mut self, keys: &'static [&'static str]) -> Self {
        self.unique = keys;
        self
    }

    pub fn typed(mut self, type_schema: Schema) -> Self {
        self.type_schema = Some(Box::new(type_schema));
        self
    }

    /// Search code prefix, e.g. `product.lists` for `product/lists`.
    pub fn prefix(&self) -> String {
        self.path.replace('/', ".")
    }

    fn col(&self, name: &str) -> String {
        format!("{}.{}", self.alias, quoted(name))
    }

    /// `LEFT JOIN` of the type table, if this schema has one.
    pub fn type_join(&self) -> Option<String> {
        self.type_schema.as_ref().map(|t| {
            format!(
                "LEFT JOIN {} AS {} ON ( {}.{} = {} )",
                quoted(&t.table),
                t.alias,
                t.alias,
                quoted("id"),
                self.col("typeid")
            )
        })
    }

    /// Expressions fetched by `search`: id, siteid, data columns, ctime, mtime,
    /// editor, then the type code when typed.
    pub fn select_columns(&self) -> Vec<String> {
        let mut out = vec![self.col("id"), self.col("siteid")];
        out.extend(self.columns.iter().map(|c| self.col(c.name)));
        out.extend(["ctime", "mtime", "editor"].iter().map(|c| self.col(c)));
        if let Some(t) = &self.type_schema {
            out.push(t.col("code"));
        }
        out
    }

    pub fn base_joins(&self) -> Vec<String> {
        self.type_join().into_iter().collect()
    }

    fn definitions(&self, join: Option<&str>) -> Vec<AttributeDef> {
        let prefix = self.prefix();
        let def = |key: &str, column: &str, kind: DataType| {
            let def = AttributeDef::new(format!("{}.{}", prefix, key), self.col(column), kind);
            match join {
                Some(j) => def.join(j),
                None => def,
            }
        };
        let mut out = vec![
            def("id", "id", DataType::Int).private(),
            def("siteid", "siteid", DataType::Int).private(),
        ];
        out.extend(self.columns.iter().map(|c| def(c.key, c.name, c.kind)));
        out.push(def("ctime", "ctime", DataType::DateTime));
        out.push(def("mtime", "mtime", DataType::DateTime));
        out.push(def("editor", "editor", DataType::String));
        out
    }

    /// Search attributes of this manager; the type registry is a delegate whose
    /// fields pull in the type join.
    pub fn registry(&self) -> Result<AttributeRegistry, ConfigError> {
        let mut reg = AttributeRegistry::new(self.path.as_str());
        reg.register(self.definitions(None))?;
        if let (Some(t), Some(join)) = (&self.type_schema, self.type_join()) {
            let mut sub = AttributeRegistry::new(t.path.as_str());
            sub.register(t.definitions(Some(&join)))?;
            reg.delegate(Arc::new(sub));
        }
        Ok(reg)
    }
}

const TYPE_KEY: &[&str] = &["domain", "code"];
const LIST_KEY: &[&str] = &["parentid", "domain", "typeid", "refid"];

fn type_of(path: &str, table: &str, alias: &str) -> Schema {
    Schema::of::<TypeItem>(path, table, alias).unique(TYPE_KEY)
}

pub fn attribute() -> Schema {
    Schema::of::<AttributeItem>("attribute", "mshop_attribute", "matt")
        .unique(&["domain", "typeid", "code"])
        .typed(type_of("attribute/type", "mshop_attribute_type", "mattty"))
}

pub fn media() -> Schema {
    Schema::of::<MediaItem>("media", "mshop_media", "mmed").typed(type_of("media/type", "mshop_media_type", "mmedty"))
}

pub fn text() -> Schema {
    Schema::of::<TextItem>("text", "mshop_text", "mtex").typed(type_of("text/type", "mshop_text_type", "mtexty"))
}

pub fn price() -> Schema {
    Schema::of::<PriceItem>("price", "mshop_price", "mpri").typed(type_of("price/type", "mshop_price_type", "mprity"))
}

pub fn product() -> Schema {
    Schema::of::<ProductItem>("product", "mshop_product", "mpro")
        .unique(&["code"])
        .typed(type_of("product/type", "mshop_product_type", "mproty"))
}

pub fn product_lists() -> Schema {
    Schema::of::<ListItem>("product/lists", "mshop_product_list", "mproli")
        .unique(LIST_KEY)
        .typed(type_of("product/lists/type", "mshop_product_list_type", "mprolity"))
}

pub fn catalog() -> Schema {
    Schema::of::<CatalogItem>("catalog", "mshop_catalog", "mcat").unique(&["code"])
}

pub fn catalog_lists() -> Schema {
    Schema::of::<ListItem>("catalog/lists", "mshop_catalog_list", "mcatli")
        .unique(LIST_KEY)
        .typed(type_of("catalog/lists/type", "mshop_catalog_list_type", "mcatlity"))
}

pub fn plugin() -> Schema {
    Schema::of::<PluginItem>("plugin", "mshop_plugin", "mplu").typed(type_of("plugin/type", "mshop_plugin_type", "mpluty"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_columns_and_type_fields() {
        let reg = attribute().registry().unwrap();
        assert_eq!(reg.resolve("attribute.code").unwrap().sql, r#"matt."code""#);
        assert_eq!(reg.resolve("attribute.position").unwrap().sql, r#"matt."pos""#);
        assert!(!reg.resolve("attribute.id").unwrap().public);

        let ty = reg.resolve("attribute.type.code").unwrap();
        assert_eq!(ty.sql, r#"mattty."code""#);
        assert_eq!(
            ty.joins,
            vec![r#"LEFT JOIN "mshop_attribute_type" AS mattty ON ( mattty."id" = matt."typeid" )"#.to_string()]
        );
        assert!(reg.resolve("attribute.lists.id").is_err());
    }

    #[test]
    fn select_list_ends_with_type_code() {
        let s = product_lists();
        let cols = s.select_columns();
        assert_eq!(cols.first().map(String::as_str), Some(r#"mproli."id""#));
        assert_eq!(cols.last().map(String::as_str), Some(r#"mprolity."code""#));
        assert_eq!(cols.len(), 2 + ListItem::COLUMNS.len() + 3 + 1);
        assert_eq!(s.base_joins().len(), 1);
        assert_eq!(s.prefix(), "product.lists");
    }

    #[test]
    fn untyped_schema_has_no_joins() {
        let s = catalog();
        assert!(s.type_join().is_none());
        assert!(s.base_joins().is_empty());
        assert!(s.registry().unwrap().resolve("catalog.type.code").is_err());
    }
}
