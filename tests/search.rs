mod common;

use common::{attribute, create_type, factory, factory_with};
use mshop::config::{Config, COUNT_CAP_PATH};
use mshop::item::{AttributeItem, ProductItem, TypeItem};
use mshop::{Criteria, Direction, MShopError, Operator, Search};
use serde_json::json;

#[tokio::test]
async fn saved_items_are_found_with_type_code() {
    let factory = factory().await;
    let color = create_type(&factory, "attribute/type", "product", "color").await;
    let attributes = factory.manager::<AttributeItem>("attribute").unwrap();

    let saved = attributes.save(attribute(color, "red", 0)).await.unwrap();
    assert!(saved.common.id.is_some());
    assert_eq!(saved.common.editor, "core");
    assert!(saved.common.ctime.is_some());
    assert_eq!(saved.common.type_code.as_deref(), Some("color"));

    let search = Search::new()
        .with_criteria(Criteria::compare(Operator::Equal, "attribute.type.code", "color"))
        .with_total();
    let (items, total) = attributes.search(&search).await.unwrap();
    assert_eq!(items, vec![saved]);
    assert_eq!(total, Some(1));
}

#[tokio::test]
async fn empty_one_of_matches_nothing() {
    let factory = factory().await;
    let color = create_type(&factory, "attribute/type", "product", "color").await;
    let attributes = factory.manager::<AttributeItem>("attribute").unwrap();
    attributes.save(attribute(color, "red", 0)).await.unwrap();

    let none = Search::new().with_criteria(Criteria::compare(Operator::OneOf, "attribute.code", json!([])));
    assert!(attributes.search(&none).await.unwrap().0.is_empty());

    let all = Search::new().with_criteria(Criteria::not(Criteria::compare(
        Operator::OneOf,
        "attribute.code",
        json!([]),
    )));
    assert_eq!(attributes.search(&all).await.unwrap().0.len(), 1);
}

#[tokio::test]
async fn sorting_and_slicing() {
    let factory = factory().await;
    let color = create_type(&factory, "attribute/type", "product", "color").await;
    let attributes = factory.manager::<AttributeItem>("attribute").unwrap();
    attributes
        .save_all(vec![
            attribute(color, "blue", 2),
            attribute(color, "red", 0),
            attribute(color, "green", 1),
        ])
        .await
        .unwrap();

    let search = Search::new().sort(Direction::Asc, "attribute.position");
    let codes: Vec<String> = attributes.search(&search).await.unwrap().0.into_iter().map(|a| a.code).collect();
    assert_eq!(codes, ["red", "green", "blue"]);

    let search = Search::new()
        .sort(Direction::Desc, "attribute.code")
        .slice(1, 1)
        .with_total();
    let (items, total) = attributes.search(&search).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].code, "green");
    assert_eq!(total, Some(3));
}

#[tokio::test]
async fn totals_stop_at_the_count_cap() {
    let mut config = Config::new();
    config.set(COUNT_CAP_PATH, json!(2));
    let factory = factory_with(config).await;
    let products = factory.manager::<ProductItem>("product").unwrap();
    for code in ["a", "b", "c"] {
        let mut item = products.create_item();
        item.code = code.into();
        products.save(item).await.unwrap();
    }
    let (items, total) = products.search(&Search::new().with_total()).await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(total, Some(2));
}

#[tokio::test]
async fn unknown_codes_fail_to_compile() {
    let factory = factory().await;
    let products = factory.manager::<ProductItem>("product").unwrap();
    let search = Search::new().with_criteria(Criteria::compare(Operator::Equal, "product.nope", 1));
    let err = products.search(&search).await.unwrap_err();
    assert!(matches!(err, MShopError::Compile(_)));
}

#[tokio::test]
async fn criteria_from_json_run_against_storage() {
    let factory = factory().await;
    let products = factory.manager::<ProductItem>("product").unwrap();
    for (code, status) in [("a", 1), ("b", 0), ("c", 1)] {
        let mut item = products.create_item();
        item.code = code.into();
        item.status = status;
        products.save(item).await.unwrap();
    }
    let criteria = Criteria::from_json(&json!({
        "&&": [{"==": {"product.status": 1}}, {"!": {"==": {"product.code": "a"}}}]
    }))
    .unwrap();
    let (items, _) = products.search(&Search::new().with_criteria(criteria)).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].code, "c");
}

#[tokio::test]
async fn required_fields_and_configured_rules_reject_saves() {
    let mut config = Config::new();
    config.set("mshop/product/manager/validate", json!({"code": {"pattern": "^[a-z]+$"}}));
    let factory = factory_with(config).await;
    let products = factory.manager::<ProductItem>("product").unwrap();

    let err = products.save(products.create_item()).await.unwrap_err();
    assert!(matches!(err, MShopError::Validation(m) if m == "product.code is required"));

    let mut item = products.create_item();
    item.code = "ABC".into();
    assert!(matches!(products.save(item).await, Err(MShopError::Validation(_))));
    assert!(products.search(&Search::new()).await.unwrap().0.is_empty());
}

#[tokio::test]
async fn missing_items_are_not_found() {
    let factory = factory().await;
    let products = factory.manager::<ProductItem>("product").unwrap();
    assert!(matches!(products.get(42).await, Err(MShopError::NotFound(_))));

    let mut ghost = products.create_item();
    ghost.common.id = Some(42);
    ghost.code = "ghost".into();
    assert!(matches!(products.save(ghost).await, Err(MShopError::NotFound(_))));
}

#[tokio::test]
async fn sites_do_not_see_each_other() {
    let factory = factory().await;
    let products = factory.manager::<ProductItem>("product").unwrap();
    let mut item = products.create_item();
    item.code = "shared-code".into();
    let saved = products.save(item).await.unwrap();
    let id = saved.common.id.unwrap();

    let other = mshop::ManagerFactory::standard(factory.context().clone().with_site(2)).unwrap();
    let other_products = other.manager::<ProductItem>("product").unwrap();
    assert!(other_products.search(&Search::new()).await.unwrap().0.is_empty());
    assert!(matches!(other_products.get(id).await, Err(MShopError::NotFound(_))));
    assert_eq!(other_products.delete(&[id]).await.unwrap(), 0);

    let mut item = other_products.create_item();
    item.code = "shared-code".into();
    other_products.save(item).await.unwrap();

    assert!(factory.cleanup(&[1]).await.unwrap() >= 1);
    assert!(products.search(&Search::new()).await.unwrap().0.is_empty());
    assert_eq!(other_products.search(&Search::new()).await.unwrap().0.len(), 1);
}

#[tokio::test]
async fn types_are_found_by_code_and_domain() {
    let factory = factory().await;
    create_type(&factory, "attribute/type", "product", "color").await;
    let types = factory.manager::<TypeItem>("attribute/type").unwrap();
    assert_eq!(types.find("color", "product").await.unwrap().code, "color");
    assert!(matches!(types.find("color", "media").await, Err(MShopError::NotFound(_))));
}

#[tokio::test]
async fn find_or_create_reuses_cached_attributes() {
    let factory = factory().await;
    create_type(&factory, "attribute/type", "product", "color").await;
    let attributes = factory.manager::<AttributeItem>("attribute").unwrap();
    let types = factory.manager::<TypeItem>("attribute/type").unwrap();
    let cache = mshop::ItemCache::new();

    let first = attributes
        .find_or_create("red", "color", "product", &types, Some(&cache))
        .await
        .unwrap();
    let second = attributes
        .find_or_create("red", "color", "product", &types, Some(&cache))
        .await
        .unwrap();
    assert_eq!(first.common.id, second.common.id);
    assert_eq!(cache.len(), 1);

    let uncached = attributes
        .find_or_create("red", "color", "product", &types, None)
        .await
        .unwrap();
    assert_eq!(uncached.common.id, first.common.id);
    assert_eq!(attributes.search(&Search::new()).await.unwrap().0.len(), 1);

    let err = attributes
        .find_or_create("red", "size", "product", &types, None)
        .await
        .unwrap_err();
    assert!(matches!(err, MShopError::NotFound(_)));
}

#[tokio::test]
async fn arrays_round_trip_through_the_manager() {
    let factory = factory().await;
    let products = factory.manager::<ProductItem>("product").unwrap();
    let map = json!({
        "product.code": "shirt",
        "product.label": "Shirt",
        "product.status": "0",
        "product.siteid": 99,
        "text.content": "ignored",
    });
    let item = products
        .from_array(products.create_item(), map.as_object().unwrap())
        .unwrap();
    assert_eq!(item.code, "shirt");
    assert_eq!(item.status, 0);
    assert_eq!(item.common.site_id, 1);

    let saved = products.save(item).await.unwrap();
    let out = products.to_array(&saved);
    assert_eq!(out.get("product.code"), Some(&json!("shirt")));
    assert_eq!(out.get("product.siteid"), Some(&json!(1)));

    let bad = json!({"product.colour": "red"});
    assert!(matches!(
        products.from_array(products.create_item(), bad.as_object().unwrap()),
        Err(MShopError::Validation(_))
    ));
}

#[tokio::test]
async fn aggregate_counts_per_value() {
    let factory = factory().await;
    let color = create_type(&factory, "attribute/type", "product", "color").await;
    let size = create_type(&factory, "attribute/type", "product", "size").await;
    let attributes = factory.manager::<AttributeItem>("attribute").unwrap();
    attributes
        .save_all(vec![
            attribute(color, "red", 0),
            attribute(color, "blue", 1),
            attribute(size, "xl", 0),
        ])
        .await
        .unwrap();
    let counts = attributes
        .aggregate(&Search::new(), "attribute.type.code")
        .await
        .unwrap();
    assert_eq!(counts.get("color"), Some(&2));
    assert_eq!(counts.get("size"), Some(&1));
}

#[tokio::test]
async fn offsets_past_the_end_return_nothing() {
    let factory = factory().await;
    let products = factory.manager::<ProductItem>("product").unwrap();
    let mut item = products.create_item();
    item.code = "shirt".into();
    products.save(item).await.unwrap();

    let search = Search::new().slice(u64::MAX, 1);
    assert!(products.search(&search).await.unwrap().0.is_empty());
}

#[tokio::test]
async fn aggregate_cap_bounds_each_group() {
    let mut config = Config::new();
    config.set(mshop::config::AGGREGATE_CAP_PATH, json!(2));
    let factory = factory_with(config).await;
    let color = create_type(&factory, "attribute/type", "product", "color").await;
    let size = create_type(&factory, "attribute/type", "product", "size").await;
    let attributes = factory.manager::<AttributeItem>("attribute").unwrap();
    attributes
        .save_all(vec![
            attribute(color, "red", 0),
            attribute(color, "blue", 1),
            attribute(color, "green", 2),
            attribute(size, "xl", 0),
        ])
        .await
        .unwrap();
    let counts = attributes
        .aggregate(&Search::new(), "attribute.type.code")
        .await
        .unwrap();
    assert_eq!(counts.get("color"), Some(&2));
    assert_eq!(counts.get("size"), Some(&1));
}
