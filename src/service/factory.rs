//! Domain-path-keyed registry of managers, one instance per path and context.

use crate::context::Context;
use crate::error::{ConfigError, MShopError};
use crate::item::{
    AttributeItem, CatalogItem, ListItem, ListRefs, MediaItem, PluginItem, PriceItem, ProductItem, Record, TextItem,
    TypeItem,
};
use crate::schema::{self, Schema};
use crate::service::{DomainManager, ListManager, Manager};
use crate::store;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Build = dyn Fn(&Context, &Schema) -> Result<Entry, MShopError> + Send + Sync;

#[derive(Clone)]
struct Entry {
    typed: Arc<dyn Any + Send + Sync>,
    erased: Arc<dyn DomainManager>,
}

struct Registration {
    schema: Schema,
    build: Box<Build>,
}

pub struct ManagerFactory {
    ctx: Context,
    order: Vec<String>,
    registrations: HashMap<String, Registration>,
    instances: RwLock<HashMap<String, Entry>>,
}

impl ManagerFactory {
    pub fn new(ctx: Context) -> Self {
        ManagerFactory {
            ctx,
            order: Vec::new(),
            registrations: HashMap::new(),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Factory with the attribute, media, text, price, product, catalog and
    /// plugin domains plus their type and list managers.
    pub fn standard(ctx: Context) -> Result<Self, MShopError> {
        let mut factory = ManagerFactory::new(ctx);
        factory
            .register::<AttributeItem>(schema::attribute())?
            .register::<MediaItem>(schema::media())?
            .register::<TextItem>(schema::text())?
            .register::<PriceItem>(schema::price())?
            .register::<ProductItem>(schema::product())?
            .register::<ListItem>(schema::product_lists())?
            .register::<CatalogItem>(schema::catalog())?
            .register::<ListItem>(schema::catalog_lists())?
            .register::<PluginItem>(schema::plugin())?;
        Ok(factory)
    }

    /// Registers `schema` under its path, and its type schema (if any) under the
    /// type path. Re-registering a path replaces the earlier entry.
    pub fn register<I: Record>(&mut self, schema: Schema) -> Result<&mut Self, MShopError> {
        if schema.columns != I::COLUMNS {
            return Err(ConfigError::ItemType(schema.path.clone()).into());
        }
        if let Some(type_schema) = schema.type_schema.as_deref() {
            self.insert(type_schema.clone(), builder::<TypeItem>());
        }
        self.insert(schema, builder::<I>());
        Ok(self)
    }

    fn insert(&mut self, schema: Schema, build: Box<Build>) {
        let path = schema.path.clone();
        if !self.registrations.contains_key(&path) {
            self.order.push(path.clone());
        }
        self.registrations.insert(path.clone(), Registration { schema, build });
        self.instances
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&path);
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Registered schemas, type schemas before the schemas using them.
    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.order
            .iter()
            .filter_map(|p| self.registrations.get(p))
            .map(|r| &r.schema)
    }

    pub async fn ensure_tables(&self) -> Result<(), MShopError> {
        store::ensure_tables(self.ctx.db(), self.schemas()).await
    }

    fn entry(&self, path: &str) -> Result<Entry, MShopError> {
        if let Some(e) = self
            .instances
            .read()
            .map_err(|_| ConfigError::Load("manager registry lock".into()))?
            .get(path)
        {
            return Ok(e.clone());
        }
        let reg = self
            .registrations
            .get(path)
            .ok_or_else(|| ConfigError::UnknownDomain(path.to_string()))?;
        let built = (reg.build)(&self.ctx, &reg.schema)?;
        let mut guard = self
            .instances
            .write()
            .map_err(|_| ConfigError::Load("manager registry lock".into()))?;
        Ok(guard.entry(path.to_string()).or_insert(built).clone())
    }

    /// The typed manager for `path`; fails if it holds a different item type.
    pub fn manager<I: Record>(&self, path: &str) -> Result<Arc<Manager<I>>, MShopError> {
        self.entry(path)?
            .typed
            .downcast::<Manager<I>>()
            .map_err(|_| ConfigError::ItemType(path.to_string()).into())
    }

    /// The manager for `path` behind the item-type independent interface.
    pub fn domain(&self, path: &str) -> Result<Arc<dyn DomainManager>, MShopError> {
        Ok(self.entry(path)?.erased)
    }

    /// List-relation manager for a `<domain>/lists` path.
    pub fn lists(&self, path: &str) -> Result<ListManager<'_>, MShopError> {
        Ok(ListManager::new(self, self.manager::<ListItem>(path)?))
    }

    /// Loads the parent `path`/`id` with its list items of `domains` (all when
    /// empty) and their referenced items.
    pub async fn get_with_lists<P>(&self, path: &str, id: i64, domains: &[&str]) -> Result<P, MShopError>
    where
        P: Record + ListRefs,
    {
        let mut item = self.manager::<P>(path)?.get(id).await?;
        let lists = self.lists(P::LIST_PATH)?.for_parents(&[id], domains).await?;
        *item.lists_mut() = lists;
        Ok(item)
    }

    /// Deletes all rows of the given sites from every registered table.
    pub async fn cleanup(&self, site_ids: &[i64]) -> Result<u64, MShopError> {
        let paths = self.order.clone();
        self.ctx
            .db()
            .atomically(|| async move {
                let mut total = 0;
                for path in paths.iter().rev() {
                    total += self.domain(path)?.cleanup(site_ids).await?;
                }
                Ok(total)
            })
            .await
    }
}

fn builder<I: Record>() -> Box<Build> {
    Box::new(|ctx: &Context, schema: &Schema| {
        let manager = Arc::new(Manager::<I>::new(ctx.clone(), schema.clone())?);
        Ok(Entry {
            typed: manager.clone(),
            erased: manager,
        })
    })
}
