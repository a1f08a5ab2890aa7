#![allow(dead_code)]

use mshop::config::Config;
use mshop::item::{AttributeItem, TextItem, TypeItem};
use mshop::{Context, Db, ManagerFactory};

pub async fn db() -> Db {
    Db::connect("sqlite::memory:", 1).await.unwrap()
}

pub async fn factory_with(config: Config) -> ManagerFactory {
    let ctx = Context::new(db().await, config).unwrap();
    let factory = ManagerFactory::standard(ctx).unwrap();
    factory.ensure_tables().await.unwrap();
    factory
}

pub async fn factory() -> ManagerFactory {
    factory_with(Config::new()).await
}

pub async fn create_type(factory: &ManagerFactory, path: &str, domain: &str, code: &str) -> i64 {
    let types = factory.manager::<TypeItem>(path).unwrap();
    let mut item = types.create_item();
    item.code = code.into();
    item.domain = domain.into();
    item.label = code.into();
    types.save(item).await.unwrap().common.id.unwrap()
}

pub fn attribute(type_id: i64, code: &str, position: i64) -> AttributeItem {
    AttributeItem {
        type_id: Some(type_id),
        domain: "product".into(),
        code: code.into(),
        label: code.to_uppercase(),
        position,
        ..AttributeItem::default()
    }
}

pub fn text(type_id: i64, content: &str) -> TextItem {
    TextItem {
        type_id: Some(type_id),
        domain: "product".into(),
        content: content.into(),
        label: content.into(),
        ..TextItem::default()
    }
}
