//! Seeds a small catalog: types, shared color attributes, then products with
//! texts and attribute links saved from parallel sessions. Reads DATABASE_URL
//! and MSHOP_CONFIG like any other consumer.

use mshop::config::Config;
use mshop::criteria::UNBOUNDED;
use mshop::item::{AttributeItem, ListItem, ListRefs, ProductItem, RefItem, TextItem, TypeItem};
use mshop::{Context, Db, ItemCache, ManagerFactory, Search};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

const COLORS: &[&str] = &["red", "green", "blue"];
const WORKERS: usize = 4;
const PRODUCTS_PER_WORKER: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mshop=info".parse()?))
        .init();

    let env = Config::from_env()?;
    let db = Db::connect(&env.database_url, env.max_connections).await?;
    let ctx = Context::new(db, env.config)?.with_editor("seed");
    let factory = ManagerFactory::standard(ctx.clone())?;
    factory.ensure_tables().await?;

    let text_type = ensure_type(&factory, "text/type", "product", "name").await?;
    ensure_type(&factory, "attribute/type", "product", "color").await?;

    let colors = Arc::new(ItemCache::<AttributeItem>::new());
    {
        let attributes = factory.manager::<AttributeItem>("attribute")?;
        let types = factory.manager::<TypeItem>("attribute/type")?;
        for color in COLORS {
            attributes
                .find_or_create(color, "color", "product", &types, Some(&colors))
                .await?;
        }
    }

    let mut workers = JoinSet::new();
    for worker in 0..WORKERS {
        let ctx = ctx.session();
        let colors = colors.clone();
        workers.spawn(async move { seed_products(ctx, worker, text_type, colors).await });
    }
    while let Some(joined) = workers.join_next().await {
        joined??;
    }

    let products = factory.manager::<ProductItem>("product")?;
    let (_, total) = products.search(&Search::new().slice(0, 1).with_total()).await?;
    let lists = factory.manager::<ListItem>("product/lists")?;
    let per_domain = lists
        .aggregate(&Search::new().slice(0, UNBOUNDED), "product.lists.domain")
        .await?;
    tracing::info!(products = ?total, lists = ?per_domain, "seeded");
    Ok(())
}

async fn ensure_type(
    factory: &ManagerFactory,
    path: &str,
    domain: &str,
    code: &str,
) -> Result<i64, mshop::MShopError> {
    let types = factory.manager::<TypeItem>(path)?;
    let item = match types.find(code, domain).await {
        Ok(found) => found,
        Err(mshop::MShopError::NotFound(_)) => {
            let mut item = types.create_item();
            item.code = code.into();
            item.domain = domain.into();
            item.label = code.into();
            types.save(item).await?
        }
        Err(err) => return Err(err),
    };
    item.common
        .id
        .ok_or_else(|| mshop::MShopError::NotFound(format!("{} '{}'", path, code)))
}

async fn seed_products(
    ctx: Context,
    worker: usize,
    text_type: i64,
    colors: Arc<ItemCache<AttributeItem>>,
) -> Result<(), mshop::MShopError> {
    let factory = ManagerFactory::standard(ctx)?;
    let products = factory.manager::<ProductItem>("product")?;
    let attributes = factory.manager::<AttributeItem>("attribute")?;
    let types = factory.manager::<TypeItem>("attribute/type")?;
    let lists = factory.lists("product/lists")?;

    for n in 0..PRODUCTS_PER_WORKER {
        let code = format!("demo-{}-{}", worker, n);
        let color = COLORS[(worker + n) % COLORS.len()];
        let attribute = attributes
            .find_or_create(color, "color", "product", &types, Some(&colors))
            .await?;

        let mut product = products.create_item();
        product.code = code.clone();
        product.label = format!("Demo product {}", code);
        let mut product = products.save(product).await?;

        let name = TextItem {
            type_id: Some(text_type),
            domain: "product".into(),
            label: code.clone(),
            content: product.label.clone(),
            ..TextItem::default()
        };
        product.add_list_item("text", ListItem::default(), Some(RefItem::Text(name)));
        product.add_list_item("attribute", ListItem::default(), Some(RefItem::Attribute(attribute)));
        lists.store_lists(&mut product).await?;
        tracing::debug!(code = %code, lists = product.lists().len(), "product stored");
    }
    Ok(())
}
