//! mshop: search criteria compiled to parameterized SQL, and the per-domain
//! managers storing shop items and their list relations.

pub mod attribute;
pub mod config;
pub mod context;
pub mod criteria;
pub mod error;
pub mod item;
pub mod schema;
pub mod service;
pub mod sql;
pub mod store;

pub use attribute::{AttributeDef, AttributeRegistry, DataType};
pub use config::{Config, EnvConfig, Settings};
pub use context::Context;
pub use criteria::{Combinator, Criteria, Direction, Operator, Search};
pub use error::{ConfigError, MShopError};
pub use schema::Schema;
pub use service::{CleanupReport, DomainManager, ItemCache, ListManager, Manager, ManagerFactory};
pub use store::{Backend, Db};
