use super::{opt_int, opt_text, to_datetime, to_i64, to_int, to_map, to_text, unknown, Common, Record, RefItem};
use crate::attribute::DataType;
use crate::schema::Column;
use serde_json::{Map, Value};

/// Association of a parent item with an item of another domain.
#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    pub common: Common,
    pub parent_id: Option<i64>,
    pub type_id: Option<i64>,
    pub domain: String,
    pub ref_id: String,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub config: Map<String, Value>,
    pub position: i64,
    pub status: i64,
    /// The referenced item when loaded or attached; not stored in the list row.
    pub ref_item: Option<Box<RefItem>>,
}

impl Default for ListItem {
    fn default() -> Self {
        ListItem {
            common: Common::default(),
            parent_id: None,
            type_id: None,
            domain: String::new(),
            ref_id: String::new(),
            date_start: None,
            date_end: None,
            config: Map::new(),
            position: 0,
            status: 1,
            ref_item: None,
        }
    }
}

impl ListItem {
    pub fn ref_item(&self) -> Option<&RefItem> {
        self.ref_item.as_deref()
    }
}

impl Record for ListItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("parentid", DataType::Int).required(),
        Column::new("typeid", DataType::Int),
        Column::new("domain", DataType::String).required(),
        Column::new("refid", DataType::String).required(),
        Column::new("start", DataType::DateTime).key("datestart"),
        Column::new("end", DataType::DateTime).key("dateend"),
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
            "parentid" => opt_int(self.parent_id),
            "typeid" => opt_int(self.type_id),
            "domain" => Value::from(self.domain.as_str()),
            "refid" => Value::from(self.ref_id.as_str()),
            "datestart" => opt_text(&self.date_start),
            "dateend" => opt_text(&self.date_end),
            "config" => Value::Object(self.config.clone()),
            "position" => Value::from(self.position),
            "status" => Value::from(self.status),
            _ => Value::Null,
        }
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), String> {
        match key {
            "parentid" => self.parent_id = to_int(value)?,
            "typeid" => self.type_id = to_int(value)?,
            "domain" => self.domain = to_text(value)?,
            "refid" => self.ref_id = to_text(value)?,
            "datestart" => self.date_start = to_datetime(value)?,
            "dateend" => self.date_end = to_datetime(value)?,
            "config" => self.config = to_map(value)?,
            "position" => self.position = to_i64(value, 0)?,
            "status" => self.status = to_i64(value, 1)?,
            _ => return unknown(key),
        }
        Ok(())
    }

    fn adopt_transient(&mut self, previous: Self) {
        self.ref_item = previous.ref_item;
    }
}

/// Items owning list associations (products, catalog nodes).
pub trait ListRefs {
    /// Manager path of the owner's list items.
    const LIST_PATH: &'static str;

    fn lists(&self) -> &[ListItem];
    fn lists_mut(&mut self) -> &mut Vec<ListItem>;

    /// List items of `domain`, optionally restricted to one list type code,
    /// ordered by position.
    fn list_items(&self, domain: &str, type_code: Option<&str>) -> Vec<&ListItem> {
        let mut out: Vec<&ListItem> = self
            .lists()
            .iter()
            .filter(|li| li.domain == domain)
            .filter(|li| type_code.map_or(true, |t| li.common.type_code.as_deref() == Some(t)))
            .collect();
        out.sort_by_key(|li| li.position);
        out
    }

    /// Referenced items of `domain` in list position order.
    fn ref_items(&self, domain: &str, type_code: Option<&str>) -> Vec<&RefItem> {
        self.list_items(domain, type_code)
            .into_iter()
            .filter_map(ListItem::ref_item)
            .collect()
    }

    /// Attaches a list item for `domain`. A stored ref item sets the list item's
    /// ref id; an entry with the same list id is replaced.
    fn add_list_item(&mut self, domain: &str, mut list_item: ListItem, ref_item: Option<RefItem>) {
        list_item.domain = domain.to_string();
        if let Some(id) = ref_item.as_ref().and_then(RefItem::id) {
            list_item.ref_id = id.to_string();
        }
        if ref_item.is_some() {
            list_item.ref_item = ref_item.map(Box::new);
        }
        let lists = self.lists_mut();
        let existing = list_item
            .common
            .id
            .and_then(|id| lists.iter().position(|li| li.common.id == Some(id)));
        match existing {
            Some(idx) => lists[idx] = list_item,
            None => lists.push(list_item),
        }
    }

    /// Detaches and returns the list items of `domain` pointing to `ref_id`.
    fn remove_list_items(&mut self, domain: &str, ref_id: &str) -> Vec<ListItem> {
        let (removed, kept): (Vec<ListItem>, Vec<ListItem>) = std::mem::take(self.lists_mut())
            .into_iter()
            .partition(|li| li.domain == domain && li.ref_id == ref_id);
        *self.lists_mut() = kept;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ProductItem, TextItem};

    fn listed(position: i64, type_code: &str) -> ListItem {
        let mut li = ListItem {
            position,
            ..ListItem::default()
        };
        li.common.type_code = Some(type_code.into());
        li
    }

    #[test]
    fn list_items_filter_by_domain_and_type() {
        let mut product = ProductItem::default();
        product.add_list_item("text", listed(2, "default"), None);
        product.add_list_item("text", listed(0, "variant"), None);
        product.add_list_item("media", listed(1, "default"), None);

        let texts: Vec<i64> = product.list_items("text", None).iter().map(|li| li.position).collect();
        assert_eq!(texts, vec![0, 2]);
        assert_eq!(product.list_items("text", Some("default")).len(), 1);
        assert!(product.list_items("price", None).is_empty());
    }

    #[test]
    fn add_list_item_links_the_ref_and_replaces_by_id() {
        let mut product = ProductItem::default();
        let mut text = TextItem::default();
        text.common.id = Some(42);

        let mut li = ListItem::default();
        li.common.id = Some(5);
        product.add_list_item("text", li.clone(), Some(RefItem::Text(text)));
        assert_eq!(product.lists[0].ref_id, "42");
        assert_eq!(product.ref_items("text", None).len(), 1);

        li.position = 3;
        product.add_list_item("text", li, None);
        assert_eq!(product.lists.len(), 1);
        assert_eq!(product.lists[0].position, 3);

        let removed = product.remove_list_items("text", "");
        assert_eq!(removed.len(), 1);
        assert!(product.lists.is_empty());
    }
}
