use super::{
    opt_int, opt_text, to_datetime, to_i64, to_int, to_map, to_opt_text, to_text, unknown, Common, ListItem,
    ListRefs, Record, RefItem,
};
use crate::attribute::DataType;
use crate::schema::Column;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct AttributeItem {
    pub common: Common,
    pub type_id: Option<i64>,
    pub domain: String,
    pub code: String,
    pub status: i64,
    pub position: i64,
    pub label: String,
}

impl Default for AttributeItem {
    fn default() -> Self {
        AttributeItem {
            common: Common::default(),
            type_id: None,
            domain: String::new(),
            code: String::new(),
            status: 1,
            position: 0,
            label: String::new(),
        }
    }
}

impl Record for AttributeItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("typeid", DataType::Int).required(),
        Column::new("domain", DataType::String).required(),
        Column::new("code", DataType::String).required(),
        Column::new("status", DataType::Int),
        Column::new("pos", DataType::Int).key("position"),
        Column::new("label", DataType::String),
    ];

    fn common(&self) -> &Common {
        &self.common
    }

    fn common_mut(&mut self) -> &mut Common {
        &mut self.common
    }

    fn get(&self, key: &str) -> Value {
        match key {
            "typeid" => opt_int(self.type_id),
            "domain" => Value::from(self.domain.as_str()),
            "code" => Value::from(self.code.as_str()),
            "status" => Value::from(self.status),
            "position" => Value::from(self.position),
            "label" => Value::from(self.label.as_str()),
            _ => Value::Null,
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "typeid" => self.type_id = to_int(value)?,
            "domain" => self.domain = to_text(value)?,
            "code" => self.code = to_text(value)?,
            "status" => self.status = to_i64(value, 1)?,
            "position" => self.position = to_i64(value, 0)?,
            "label" => self.label = to_text(value)?,
            _ => return unknown(key),
        }
        Ok(())
    }

    fn into_ref(self) -> Option<RefItem> {
        Some(RefItem::Attribute(self))
    }

    fn from_ref(item: RefItem) -> Option<Self> {
        match item {
            RefItem::Attribute(i) => Some(i),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaItem {
    pub common: Common,
    pub type_id: Option<i64>,
    pub domain: String,
    pub label: String,
    pub language_id: Option<String>,
    pub url: String,
    pub preview: String,
    pub mime_type: String,
    pub status: i64,
}

impl Default for MediaItem {
    fn default() -> Self {
        MediaItem {
            common: Common::default(),
            type_id: None,
            domain: String::new(),
            label: String::new(),
            language_id: None,
            url: String::new(),
            preview: String::new(),
            mime_type: String::new(),
            status: 1,
        }
    }
}

impl Record for MediaItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("typeid", DataType::Int).required(),
        Column::new("domain", DataType::String).required(),
        Column::new("label", DataType::String),
        Column::new("langid", DataType::String).key("languageid"),
        Column::new("link", DataType::String).key("url").required(),
        Column::new("preview", DataType::String),
        Column::new("mimetype", DataType::String),
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
            "typeid" => opt_int(self.type_id),
            "domain" => Value::from(self.domain.as_str()),
            "label" => Value::from(self.label.as_str()),
            "languageid" => opt_text(&self.language_id),
            "url" => Value::from(self.url.as_str()),
            "preview" => Value::from(self.preview.as_str()),
            "mimetype" => Value::from(self.mime_type.as_str()),
            "status" => Value::from(self.status),
            _ => Value::Null,
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "typeid" => self.type_id = to_int(value)?,
            "domain" => self.domain = to_text(value)?,
            "label" => self.label = to_text(value)?,
            "languageid" => self.language_id = to_opt_text(value)?.filter(|s| !s.is_empty()),
            "url" => self.url = to_text(value)?,
            "preview" => self.preview = to_text(value)?,
            "mimetype" => self.mime_type = to_text(value)?,
            "status" => self.status = to_i64(value, 1)?,
            _ => return unknown(key),
        }
        Ok(())
    }

    fn into_ref(self) -> Option<RefItem> {
        Some(RefItem::Media(self))
    }

    fn from_ref(item: RefItem) -> Option<Self> {
        match item {
            RefItem::Media(i) => Some(i),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TextItem {
    pub common: Common,
    pub type_id: Option<i64>,
    pub domain: String,
    pub language_id: Option<String>,
    pub label: String,
    pub content: String,
    pub status: i64,
}

impl Default for TextItem {
    fn default() -> Self {
        TextItem {
            common: Common::default(),
            type_id: None,
            domain: String::new(),
            language_id: None,
            label: String::new(),
            content: String::new(),
            status: 1,
        }
    }
}

impl Record for TextItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("typeid", DataType::Int).required(),
        Column::new("domain", DataType::String).required(),
        Column::new("langid", DataType::String).key("languageid"),
        Column::new("label", DataType::String),
        Column::new("content", DataType::String),
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
            "typeid" => opt_int(self.type_id),
            "domain" => Value::from(self.domain.as_str()),
            "languageid" => opt_text(&self.language_id),
            "label" => Value::from(self.label.as_str()),
            "content" => Value::from(self.content.as_str()),
            "status" => Value::from(self.status),
            _ => Value::Null,
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "typeid" => self.type_id = to_int(value)?,
            "domain" => self.domain = to_text(value)?,
            "languageid" => self.language_id = to_opt_text(value)?.filter(|s| !s.is_empty()),
            "label" => self.label = to_text(value)?,
            "content" => self.content = to_text(value)?,
            "status" => self.status = to_i64(value, 1)?,
            _ => return unknown(key),
        }
        Ok(())
    }

    fn into_ref(self) -> Option<RefItem> {
        Some(RefItem::Text(self))
    }

    fn from_ref(item: RefItem) -> Option<Self> {
        match item {
            RefItem::Text(i) => Some(i),
            _ => None,
        }
    }
}

/// Amounts are kept as decimal strings exactly as given.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceItem {
    pub common: Common,
    pub type_id: Option<i64>,
    pub domain: String,
    pub label: String,
    pub currency_id: String,
    pub quantity: i64,
    pub value: String,
    pub costs: String,
    pub rebate: String,
    pub tax_rate: String,
    pub status: i64,
}

impl Default for PriceItem {
    fn default() -> Self {
        PriceItem {
            common: Common::default(),
            type_id: None,
            domain: String::new(),
            label: String::new(),
            currency_id: String::new(),
            quantity: 1,
            value: "0.00".into(),
            costs: "0.00".into(),
            rebate: "0.00".into(),
            tax_rate: "0.00".into(),
            status: 1,
        }
    }
}

impl Record for PriceItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("typeid", DataType::Int).required(),
        Column::new("domain", DataType::String).required(),
        Column::new("label", DataType::String),
        Column::new("currencyid", DataType::String).required(),
        Column::new("quantity", DataType::Int),
        Column::new("value", DataType::String),
        Column::new("costs", DataType::String),
        Column::new("rebate", DataType::String),
        Column::new("taxrate", DataType::String),
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
            "typeid" => opt_int(self.type_id),
            "domain" => Value::from(self.domain.as_str()),
            "label" => Value::from(self.label.as_str()),
            "currencyid" => Value::from(self.currency_id.as_str()),
            "quantity" => Value::from(self.quantity),
            "value" => Value::from(self.value.as_str()),
            "costs" => Value::from(self.costs.as_str()),
            "rebate" => Value::from(self.rebate.as_str()),
            "taxrate" => Value::from(self.tax_rate.as_str()),
            "status" => Value::from(self.status),
            _ => Value::Null,
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "typeid" => self.type_id = to_int(value)?,
            "domain" => self.domain = to_text(value)?,
            "label" => self.label = to_text(value)?,
            "currencyid" => self.currency_id = to_text(value)?,
            "quantity" => self.quantity = to_i64(value, 1)?,
            "value" => self.value = to_text(value)?,
            "costs" => self.costs = to_text(value)?,
            "rebate" => self.rebate = to_text(value)?,
            "taxrate" => self.tax_rate = to_text(value)?,
            "status" => self.status = to_i64(value, 1)?,
            _ => return unknown(key),
        }
        Ok(())
    }

    fn into_ref(self) -> Option<RefItem> {
        Some(RefItem::Price(self))
    }

    fn from_ref(item: RefItem) -> Option<Self> {
        match item {
            RefItem::Price(i) => Some(i),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProductItem {
    pub common: Common,
    pub type_id: Option<i64>,
    pub code: String,
    pub label: String,
    pub status: i64,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub lists: Vec<ListItem>,
}

impl Default for ProductItem {
    fn default() -> Self {
        ProductItem {
            common: Common::default(),
            type_id: None,
            code: String::new(),
            label: String::new(),
            status: 1,
            date_start: None,
            date_end: None,
            lists: Vec::new(),
        }
    }
}

impl Record for ProductItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("typeid", DataType::Int),
        Column::new("code", DataType::String).required(),
        Column::new("label", DataType::String),
        Column::new("status", DataType::Int),
        Column::new("start", DataType::DateTime).key("datestart"),
        Column::new("end", DataType::DateTime).key("dateend"),
    ];

    fn common(&self) -> &Common {
        &self.common
    }

    fn common_mut(&mut self) -> &mut Common {
        &mut self.common
    }

    fn get(&self, key: &str) -> Value {
        match key {
            "typeid" => opt_int(self.type_id),
            "code" => Value::from(self.code.as_str()),
            "label" => Value::from(self.label.as_str()),
            "status" => Value::from(self.status),
            "datestart" => opt_text(&self.date_start),
            "dateend" => opt_text(&self.date_end),
            _ => Value::Null,
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "typeid" => self.type_id = to_int(value)?,
            "code" => self.code = to_text(value)?,
            "label" => self.label = to_text(value)?,
            "status" => self.status = to_i64(value, 1)?,
            "datestart" => self.date_start = to_datetime(value)?,
            "dateend" => self.date_end = to_datetime(value)?,
            _ => return unknown(key),
        }
        Ok(())
    }

    fn into_ref(self) -> Option<RefItem> {
        Some(RefItem::Product(self))
    }

    fn from_ref(item: RefItem) -> Option<Self> {
        match item {
            RefItem::Product(i) => Some(i),
            _ => None,
        }
    }

    fn adopt_transient(&mut self, previous: Self) {
        self.lists = previous.lists;
    }
}

impl ListRefs for ProductItem {
    const LIST_PATH: &'static str = "product/lists";

    fn lists(&self) -> &[ListItem] {
        &self.lists
    }

    fn lists_mut(&mut self) -> &mut Vec<ListItem> {
        &mut self.lists
    }
}

/// Catalog nodes carry no type.
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogItem {
    pub common: Common,
    pub code: String,
    pub label: String,
    pub status: i64,
    pub config: Map<String, Value>,
    pub lists: Vec<ListItem>,
}

impl Default for CatalogItem {
    fn default() -> Self {
        CatalogItem {
            common: Common::default(),
            code: String::new(),
            label: String::new(),
            status: 1,
            config: Map::new(),
            lists: Vec::new(),
        }
    }
}

impl Record for CatalogItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("code", DataType::String).required(),
        Column::new("label", DataType::String),
        Column::new("status", DataType::Int),
        Column::new("config", DataType::Json),
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
            "label" => Value::from(self.label.as_str()),
            "status" => Value::from(self.status),
            "config" => Value::Object(self.config.clone()),
            _ => Value::Null,
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "code" => self.code = to_text(value)?,
            "label" => self.label = to_text(value)?,
            "status" => self.status = to_i64(value, 1)?,
            "config" => self.config = to_map(value)?,
            _ => return unknown(key),
        }
        Ok(())
    }

    fn into_ref(self) -> Option<RefItem> {
        Some(RefItem::Catalog(self))
    }

    fn from_ref(item: RefItem) -> Option<Self> {
        match item {
            RefItem::Catalog(i) => Some(i),
            _ => None,
        }
    }

    fn adopt_transient(&mut self, previous: Self) {
        self.lists = previous.lists;
    }
}

impl ListRefs for CatalogItem {
    const LIST_PATH: &'static str = "catalog/lists";

    fn lists(&self) -> &[ListItem] {
        &self.lists
    }

    fn lists_mut(&mut self) -> &mut Vec<ListItem> {
        &mut self.lists
    }
}

/// Service provider configuration (delivery, payment) handled by an external provider.
#[derive(Clone, Debug, PartialEq)]
pub struct PluginItem {
    pub common: Common,
    pub type_id: Option<i64>,
    pub label: String,
    pub provider: String,
    pub config: Map<String, Value>,
    pub position: i64,
    pub status: i64,
}

impl Default for PluginItem {
    fn default() -> Self {
        PluginItem {
            common: Common::default(),
            type_id: None,
            label: String::new(),
            provider: String::new(),
            config: Map::new(),
            position: 0,
            status: 1,
        }
    }
}

impl Record for PluginItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("typeid", DataType::Int).required(),
        Column::new("label", DataType::String),
        Column::new("provider", DataType::String).required(),
        Column::new("config", DataType::Json),
        Column::new("pos", DataType::Int).key("position"),
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
            "typeid" => opt_int(self.type_id),
            "label" => Value::from(self.label.as_str()),
            "provider" => Value::from(self.provider.as_str()),
            "config" => Value::Object(self.config.clone()),
            "position" => Value::from(self.position),
            "status" => Value::from(self.status),
            _ => Value::Null,
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "typeid" => self.type_id = to_int(value)?,
            "label" => self.label = to_text(value)?,
            "provider" => self.provider = to_text(value)?,
            "config" => self.config = to_map(value)?,
            "position" => self.position = to_i64(value, 0)?,
            "status" => self.status = to_i64(value, 1)?,
            _ => return unknown(key),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_column_key_is_readable_and_writable() {
        fn check<I: Record>() {
            let mut item = I::default();
            for col in I::COLUMNS {
                let v = item.get(col.key);
                item.set(col.key, v).unwrap_or_else(|e| panic!("{}: {}", col.key, e));
            }
            assert!(item.set("nope", json!(1)).is_err());
        }
        check::<AttributeItem>();
        check::<MediaItem>();
        check::<TextItem>();
        check::<PriceItem>();
        check::<ProductItem>();
        check::<CatalogItem>();
        check::<PluginItem>();
    }

    #[test]
    fn ref_conversion_keeps_the_domain() {
        let media = MediaItem {
            url: "img.jpg".into(),
            ..MediaItem::default()
        };
        let r = media.clone().into_ref().unwrap();
        assert_eq!(r.domain(), "media");
        assert_eq!(MediaItem::from_ref(r.clone()), Some(media));
        assert_eq!(TextItem::from_ref(r), None);
        assert!(PluginItem::default().into_ref().is_none());
    }

    #[test]
    fn reload_keeps_attached_lists() {
        let mut before = ProductItem::default();
        before.lists.push(ListItem::default());
        let mut after = ProductItem::default();
        after.adopt_transient(before);
        assert_eq!(after.lists.len(), 1);
    }
}
