//! Domain items and their field-level access.
//!
//! Every item embeds a [`Common`] block (identity, site scope, timestamps) and
//! exposes its data columns by key through [`Record`]. Field maps use the
//! manager's prefix, e.g. `attribute.code` or `product.lists.refid`.

mod domain;
mod list;
mod type_item;

pub use domain::{AttributeItem, CatalogItem, MediaItem, PluginItem, PriceItem, ProductItem, TextItem};
pub use list::{ListItem, ListRefs};
pub use type_item::TypeItem;

use crate::attribute::DataType;
use crate::error::MShopError;
use crate::schema::Column;
use crate::sql::{convert, BindValue};
use serde_json::{Map, Value};
use std::fmt;

/// Fields shared by every stored item. `site_id`, the timestamps, `editor` and
/// `type_code` are maintained by the manager and read-only for callers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Common {
    pub id: Option<i64>,
    pub site_id: i64,
    /// Code of the referenced type, read through the type join.
    pub type_code: Option<String>,
    pub ctime: Option<String>,
    pub mtime: Option<String>,
    pub editor: String,
}

pub trait Record: Clone + Default + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Data columns in storage order.
    const COLUMNS: &'static [Column];

    fn common(&self) -> &Common;
    fn common_mut(&mut self) -> &mut Common;

    /// Value of a data column by key; `Value::Null` for unknown keys.
    fn get(&self, key: &str) -> Value;
    /// Sets a data column by key, converting the value to the column type.
    fn set(&mut self, key: &str, value: Value) -> Result<(), String>;

    fn id(&self) -> Option<i64> {
        self.common().id
    }

    fn into_ref(self) -> Option<RefItem> {
        None
    }

    fn from_ref(_item: RefItem) -> Option<Self> {
        None
    }

    /// Carries state that is not stored in the item's own row (attached list
    /// items, referenced items) over from `previous` after a reload.
    fn adopt_transient(&mut self, _previous: Self) {}
}

/// An item of any domain a list item can point to.
#[derive(Clone, Debug, PartialEq)]
pub enum RefItem {
    Attribute(AttributeItem),
    Media(MediaItem),
    Text(TextItem),
    Price(PriceItem),
    Product(ProductItem),
    Catalog(CatalogItem),
}

impl RefItem {
    pub fn domain(&self) -> &'static str {
        match self {
            RefItem::Attribute(_) => "attribute",
            RefItem::Media(_) => "media",
            RefItem::Text(_) => "text",
            RefItem::Price(_) => "price",
            RefItem::Product(_) => "product",
            RefItem::Catalog(_) => "catalog",
        }
    }

    pub fn common(&self) -> &Common {
        match self {
            RefItem::Attribute(i) => i.common(),
            RefItem::Media(i) => i.common(),
            RefItem::Text(i) => i.common(),
            RefItem::Price(i) => i.common(),
            RefItem::Product(i) => i.common(),
            RefItem::Catalog(i) => i.common(),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.common().id
    }
}

/// Field map with prefixed keys: id, siteid, data columns, type code (typed
/// items only), ctime, mtime, editor.
pub fn to_array<I: Record>(item: &I, prefix: &str, typed: bool) -> Map<String, Value> {
    let c = item.common();
    let mut out = Map::new();
    out.insert(format!("{}.id", prefix), opt_int(c.id));
    out.insert(format!("{}.siteid", prefix), Value::from(c.site_id));
    for col in I::COLUMNS {
        out.insert(format!("{}.{}", prefix, col.key), item.get(col.key));
    }
    if typed {
        out.insert(format!("{}.type", prefix), opt_text(&c.type_code));
    }
    out.insert(format!("{}.ctime", prefix), opt_text(&c.ctime));
    out.insert(format!("{}.mtime", prefix), opt_text(&c.mtime));
    out.insert(format!("{}.editor", prefix), Value::from(c.editor.clone()));
    out
}

const READ_ONLY: &[&str] = &["siteid", "type", "ctime", "mtime", "editor"];

/// Applies a field map to `item`. Keys of other prefixes (and nested keys like
/// `product.lists.refid` for prefix `product`) are skipped, read-only keys are
/// ignored, unknown keys of the own prefix are rejected.
pub fn from_array<I: Record>(item: &mut I, prefix: &str, map: &Map<String, Value>) -> Result<(), MShopError> {
    let own = format!("{}.", prefix);
    for (key, value) in map {
        let Some(field) = key.strip_prefix(&own) else { continue };
        if field.contains('.') || READ_ONLY.contains(&field) {
            continue;
        }
        if field == "id" {
            item.common_mut().id = to_int(value.clone()).map_err(|e| invalid(key, e))?;
            continue;
        }
        if !I::COLUMNS.iter().any(|c| c.key == field) {
            return Err(MShopError::Validation(format!("unknown field {}", key)));
        }
        item.set(field, value.clone()).map_err(|e| invalid(key, e))?;
    }
    Ok(())
}

fn invalid(key: &str, reason: String) -> MShopError {
    MShopError::Validation(format!("{}: {}", key, reason))
}

pub(crate) fn unknown(key: &str) -> Result<(), String> {
    Err(format!("unknown field '{}'", key))
}

pub(crate) fn opt_int(v: Option<i64>) -> Value {
    v.map_or(Value::Null, Value::from)
}

pub(crate) fn opt_text(v: &Option<String>) -> Value {
    v.as_ref().map_or(Value::Null, |s| Value::from(s.as_str()))
}

pub(crate) fn to_int(v: Value) -> Result<Option<i64>, String> {
    match convert(&v, DataType::Int)? {
        BindValue::Int(n) => Ok(Some(n)),
        _ => Ok(None),
    }
}

/// Integer with a default for null.
pub(crate) fn to_i64(v: Value, default: i64) -> Result<i64, String> {
    to_int(v).map(|n| n.unwrap_or(default))
}

pub(crate) fn to_text(v: Value) -> Result<String, String> {
    Ok(to_opt_text(v)?.unwrap_or_default())
}

pub(crate) fn to_opt_text(v: Value) -> Result<Option<String>, String> {
    match convert(&v, DataType::String)? {
        BindValue::Text(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

pub(crate) fn to_datetime(v: Value) -> Result<Option<String>, String> {
    match convert(&v, DataType::DateTime)? {
        BindValue::Text(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

pub(crate) fn to_map(v: Value) -> Result<Map<String, Value>, String> {
    match v {
        Value::Null => Ok(Map::new()),
        Value::Object(m) => Ok(m),
        Value::String(s) if s.trim().is_empty() => Ok(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(m)) => Ok(m),
            _ => Err(format!("expected a JSON object, got '{}'", s)),
        },
        other => Err(format!("expected an object, got {}", other)),
    }
}
