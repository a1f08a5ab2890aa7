//! Entity manager: CRUD and search over one table, scoped to the context's site.

use crate::attribute::{AttributeDef, AttributeRegistry, DataType};
use crate::config::ValidationRule;
use crate::context::Context;
use crate::criteria::{Criteria, Operator, Search, UNBOUNDED};
use crate::error::{ConfigError, MShopError};
use crate::item::{self, opt_int, AttributeItem, Record, RefItem, TypeItem};
use crate::schema::Schema;
use crate::service::{ItemCache, RequestValidator};
use crate::sql::{self, BindValue, QueryBuf, Source, DATETIME_FORMAT};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::any::AnyRow;
use sqlx::Row;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::Instrument;

pub struct Manager<I: Record> {
    ctx: Context,
    schema: Schema,
    prefix: String,
    registry: Arc<AttributeRegistry>,
    select: Vec<String>,
    base_joins: Vec<String>,
    rules: HashMap<String, ValidationRule>,
    _item: PhantomData<fn() -> I>,
}

impl<I: Record> std::fmt::Debug for Manager<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager").field("path", &self.schema.path).finish_non_exhaustive()
    }
}

impl<I: Record> Manager<I> {
    pub fn new(ctx: Context, schema: Schema) -> Result<Self, MShopError> {
        if schema.columns != I::COLUMNS {
            return Err(ConfigError::ItemType(schema.path.clone()).into());
        }
        let registry = Arc::new(schema.registry()?);
        let rules = ctx.config().validation_rules(&schema.path)?;
        Ok(Manager {
            prefix: schema.prefix(),
            select: schema.select_columns(),
            base_joins: schema.base_joins(),
            registry,
            rules,
            ctx,
            schema,
            _item: PhantomData,
        })
    }

    pub fn path(&self) -> &str {
        &self.schema.path
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// Search code of one of this manager's fields, e.g. `code("refid")`.
    pub fn code(&self, key: &str) -> String {
        format!("{}.{}", self.prefix, key)
    }

    /// Public search attributes, optionally including those of the type manager.
    pub fn search_attributes(&self, with_sub: bool) -> Vec<&AttributeDef> {
        self.registry
            .all(with_sub)
            .into_iter()
            .filter(|d| d.public)
            .collect()
    }

    /// A new, unsaved item of the current site.
    pub fn create_item(&self) -> I {
        let mut item = I::default();
        item.common_mut().site_id = self.ctx.site_id();
        item
    }

    /// An empty search with the configured page size.
    pub fn create_search(&self) -> Search {
        Search::new().slice(0, self.ctx.settings().slice_size)
    }

    pub fn to_array(&self, item: &I) -> Map<String, Value> {
        item::to_array(item, &self.prefix, self.schema.type_schema.is_some())
    }

    pub fn from_array(&self, mut item: I, map: &Map<String, Value>) -> Result<I, MShopError> {
        item::from_array(&mut item, &self.prefix, map)?;
        Ok(item)
    }

    pub async fn begin(&self) -> Result<bool, MShopError> {
        self.ctx.db().begin().await
    }

    pub async fn commit(&self) -> Result<(), MShopError> {
        self.ctx.db().commit().await
    }

    pub async fn rollback(&self) -> Result<(), MShopError> {
        self.ctx.db().rollback().await
    }

    /// Inserts items without id, updates the others, and returns the stored state.
    pub async fn save(&self, item: I) -> Result<I, MShopError> {
        let fields: Map<String, Value> = I::COLUMNS
            .iter()
            .map(|c| (c.key.to_string(), item.get(c.key)))
            .collect();
        RequestValidator::validate(&self.prefix, &fields, I::COLUMNS, &self.rules)?;

        let mut values = Vec::with_capacity(I::COLUMNS.len() + 4);
        for col in I::COLUMNS {
            let v = fields.get(col.key).unwrap_or(&Value::Null);
            let bound = BindValue::from_json(v, col.kind)
                .map_err(|e| MShopError::Validation(format!("{}.{}: {}", self.prefix, col.key, e)))?;
            values.push((col.name, bound));
        }
        let now = chrono::Utc::now().format(DATETIME_FORMAT).to_string();
        let editor = BindValue::Text(self.ctx.editor().to_string());
        let site_id = self.ctx.site_id();

        let id = match item.id() {
            None => {
                let mut cols = vec![("siteid", BindValue::Int(site_id))];
                cols.extend(values);
                cols.push(("ctime", BindValue::Text(now.clone())));
                cols.push(("mtime", BindValue::Text(now)));
                cols.push(("editor", editor));
                let q = sql::insert(&self.schema.table, &cols);
                self.ctx.db().insert(&q).instrument(self.ctx.span().clone()).await?
            }
            Some(id) => {
                values.push(("mtime", BindValue::Text(now)));
                values.push(("editor", editor));
                let q = sql::update(&self.schema.table, &values, site_id, id);
                if self.execute(&q).await? == 0 {
                    return Err(MShopError::NotFound(format!(
                        "{} item with id {} in site {}",
                        self.schema.path, id, site_id
                    )));
                }
                id
            }
        };
        let mut stored = self.get(id).await?;
        stored.adopt_transient(item);
        Ok(stored)
    }

    /// Saves all items in one transaction (or the caller's).
    pub async fn save_all(&self, items: Vec<I>) -> Result<Vec<I>, MShopError> {
        self.ctx
            .db()
            .atomically(|| async move {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.save(item).await?);
                }
                Ok(out)
            })
            .await
    }

    /// Deletes by id within the current site; returns the number of removed rows.
    pub async fn delete(&self, ids: &[i64]) -> Result<u64, MShopError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let q = sql::delete(&self.schema.table, self.ctx.site_id(), ids);
        self.execute(&q).await
    }

    /// Removes every row of the given sites.
    pub async fn cleanup(&self, site_ids: &[i64]) -> Result<u64, MShopError> {
        if site_ids.is_empty() {
            return Ok(0);
        }
        let q = sql::delete_sites(&self.schema.table, site_ids);
        self.execute(&q).await
    }

    pub async fn get(&self, id: i64) -> Result<I, MShopError> {
        let search = Search::new()
            .with_criteria(Criteria::compare(Operator::Equal, self.code("id"), id))
            .slice(0, 1);
        let (mut items, _) = self.search(&search).await?;
        items
            .pop()
            .ok_or_else(|| MShopError::NotFound(format!("{} item with id {}", self.schema.path, id)))
    }

    /// Items in statement order and, when requested, the capped total.
    pub async fn search(&self, search: &Search) -> Result<(Vec<I>, Option<u64>), MShopError> {
        let scoped = self.scoped(search)?;
        let compiled = sql::compile(&scoped, &self.registry, &self.source(), self.ctx.settings().count_cap)?;
        let rows = self.fetch(&compiled.search).await?;
        let items = rows.iter().map(|r| self.hydrate(r)).collect::<Result<Vec<_>, _>>()?;
        let total = if search.need_total() {
            let rows = self.fetch(&compiled.count).await?;
            let count = match rows.first() {
                Some(row) => row.try_get::<i64, _>(0)?,
                None => 0,
            };
            Some(count.max(0) as u64)
        } else {
            None
        };
        Ok((items, total))
    }

    /// Number of matching items per distinct value of `key` (a search code).
    ///
    /// Only the rows inside the search slice are counted, so a default search
    /// undercounts once more rows match than its page size; pass
    /// `slice(0, UNBOUNDED)` for complete counts. A configured aggregate cap
    /// bounds each count separately.
    pub async fn aggregate(&self, search: &Search, key: &str) -> Result<BTreeMap<String, u64>, MShopError> {
        let scoped = self.scoped(search)?;
        let q = sql::aggregate(&scoped, &self.registry, &self.source(), key, self.ctx.settings().aggregate_cap)?;
        let mut out = BTreeMap::new();
        for row in self.fetch(&q).await? {
            let value: Option<String> = row.try_get(0)?;
            let count: i64 = row.try_get(1)?;
            out.insert(value.unwrap_or_default(), count.max(0) as u64);
        }
        Ok(out)
    }

    /// First item whose fields equal all given `(code, value)` pairs. A cache hit
    /// is returned as is; a miss queries storage and fills the cache.
    pub async fn find_by_key(
        &self,
        pairs: &[(&str, Value)],
        cache: Option<&ItemCache<I>>,
    ) -> Result<Option<I>, MShopError> {
        let key = cache_key(pairs);
        if let Some(hit) = cache.and_then(|c| c.get(&key)) {
            return Ok(Some(hit));
        }
        let mut conds: Vec<Criteria> = pairs
            .iter()
            .map(|(code, v)| Criteria::compare(Operator::Equal, *code, v.clone()))
            .collect();
        let criteria = if conds.len() == 1 {
            conds.remove(0)
        } else {
            Criteria::and(conds)?
        };
        let (items, _) = self.search(&Search::new().with_criteria(criteria).slice(0, 1)).await?;
        let found = items.into_iter().next();
        if let (Some(c), Some(item)) = (cache, &found) {
            c.set(key, item.clone());
        }
        Ok(found)
    }

    /// Items with the given ids (as strings, the way list items reference them).
    pub async fn search_by_ids(&self, ids: &[String]) -> Result<Vec<I>, MShopError> {
        let ids: Vec<i64> = ids.iter().filter_map(|id| id.trim().parse().ok()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let search = Search::new()
            .with_criteria(Criteria::compare(Operator::OneOf, self.code("id"), ids))
            .slice(0, UNBOUNDED);
        Ok(self.search(&search).await?.0)
    }

    fn source(&self) -> Source<'_> {
        Source {
            table: &self.schema.table,
            alias: &self.schema.alias,
            columns: &self.select,
            base_joins: &self.base_joins,
        }
    }

    fn scoped(&self, search: &Search) -> Result<Search, MShopError> {
        let site = Criteria::compare(Operator::Equal, self.code("siteid"), self.ctx.site_id());
        let criteria = match search.criteria() {
            Some(c) => Criteria::and(vec![site, c.clone()])?,
            None => site,
        };
        Ok(search.replace_criteria(criteria))
    }

    async fn fetch(&self, q: &QueryBuf) -> Result<Vec<AnyRow>, MShopError> {
        self.ctx.db().fetch_all(q).instrument(self.ctx.span().clone()).await
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, MShopError> {
        self.ctx.db().execute(q).instrument(self.ctx.span().clone()).await
    }

    /// Row layout follows `Schema::select_columns`.
    fn hydrate(&self, row: &AnyRow) -> Result<I, MShopError> {
        let mut item = I::default();
        item.common_mut().id = Some(row.try_get::<i64, _>(0)?);
        item.common_mut().site_id = row.try_get::<i64, _>(1)?;
        let mut idx = 2;
        for col in I::COLUMNS {
            let value = match col.kind {
                DataType::Int => opt_int(row.try_get::<Option<i64>, _>(idx)?),
                _ => row
                    .try_get::<Option<String>, _>(idx)?
                    .map_or(Value::Null, Value::String),
            };
            item.set(col.key, value)
                .map_err(|e| MShopError::Validation(format!("stored {}.{}: {}", self.prefix, col.key, e)))?;
            idx += 1;
        }
        let common = item.common_mut();
        common.ctime = row.try_get(idx)?;
        common.mtime = row.try_get(idx + 1)?;
        common.editor = row.try_get::<Option<String>, _>(idx + 2)?.unwrap_or_default();
        if self.schema.type_schema.is_some() {
            common.type_code = row.try_get(idx + 3)?;
        }
        Ok(item)
    }
}

fn cache_key(pairs: &[(&str, Value)]) -> String {
    pairs
        .iter()
        .map(|(_, v)| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("|")
}

impl Manager<TypeItem> {
    /// The type with the given code in `domain`.
    pub async fn find(&self, code: &str, domain: &str) -> Result<TypeItem, MShopError> {
        let (code_key, domain_key) = (self.code("code"), self.code("domain"));
        let pairs = [(domain_key.as_str(), Value::from(domain)), (code_key.as_str(), Value::from(code))];
        self.find_by_key(&pairs, None).await?.ok_or_else(|| {
            MShopError::NotFound(format!("{} '{}' for domain '{}'", self.schema.path, code, domain))
        })
    }
}

impl Manager<AttributeItem> {
    /// Looks the attribute up by (domain, type code, code) and creates it when
    /// missing. Two concurrent calls for the same key may both miss; the unique
    /// index on the attribute table then rejects the second insert.
    pub async fn find_or_create(
        &self,
        code: &str,
        type_code: &str,
        domain: &str,
        types: &Manager<TypeItem>,
        cache: Option<&ItemCache<AttributeItem>>,
    ) -> Result<AttributeItem, MShopError> {
        let keys = [self.code("domain"), self.code("type.code"), self.code("code")];
        let pairs = [
            (keys[0].as_str(), Value::from(domain)),
            (keys[1].as_str(), Value::from(type_code)),
            (keys[2].as_str(), Value::from(code)),
        ];
        if let Some(found) = self.find_by_key(&pairs, cache).await? {
            return Ok(found);
        }
        let ty = types.find(type_code, domain).await?;
        let mut item = self.create_item();
        item.type_id = ty.common.id;
        item.domain = domain.to_string();
        item.code = code.to_string();
        item.label = code.to_string();
        let saved = self.save(item).await?;
        if let Some(c) = cache {
            c.set(cache_key(&pairs), saved.clone());
        }
        Ok(saved)
    }
}

/// Manager operations independent of the item type, for dispatch by domain path.
#[async_trait]
pub trait DomainManager: Send + Sync {
    fn path(&self) -> &str;

    fn search_attributes(&self, with_sub: bool) -> Vec<AttributeDef>;

    /// Matching items as prefixed field maps.
    async fn search_arrays(&self, search: &Search) -> Result<(Vec<Map<String, Value>>, Option<u64>), MShopError>;

    /// Items with the given ids as ref items; empty for domains that cannot be referenced.
    async fn search_refs(&self, ids: &[String]) -> Result<Vec<RefItem>, MShopError>;

    async fn save_ref(&self, item: RefItem) -> Result<RefItem, MShopError>;

    async fn delete(&self, ids: &[i64]) -> Result<u64, MShopError>;

    async fn cleanup(&self, site_ids: &[i64]) -> Result<u64, MShopError>;
}

#[async_trait]
impl<I: Record> DomainManager for Manager<I> {
    fn path(&self) -> &str {
        &self.schema.path
    }

    fn search_attributes(&self, with_sub: bool) -> Vec<AttributeDef> {
        Manager::search_attributes(self, with_sub).into_iter().cloned().collect()
    }

    async fn search_arrays(&self, search: &Search) -> Result<(Vec<Map<String, Value>>, Option<u64>), MShopError> {
        let (items, total) = self.search(search).await?;
        Ok((items.iter().map(|i| self.to_array(i)).collect(), total))
    }

    async fn search_refs(&self, ids: &[String]) -> Result<Vec<RefItem>, MShopError> {
        let items = self.search_by_ids(ids).await?;
        Ok(items.into_iter().filter_map(Record::into_ref).collect())
    }

    async fn save_ref(&self, item: RefItem) -> Result<RefItem, MShopError> {
        let item = I::from_ref(item).ok_or_else(|| ConfigError::ItemType(self.schema.path.clone()))?;
        let saved = self.save(item).await?;
        saved
            .into_ref()
            .ok_or_else(|| ConfigError::ItemType(self.schema.path.clone()).into())
    }

    async fn delete(&self, ids: &[i64]) -> Result<u64, MShopError> {
        Manager::delete(self, ids).await
    }

    async fn cleanup(&self, site_ids: &[i64]) -> Result<u64, MShopError> {
        Manager::cleanup(self, site_ids).await
    }
}
