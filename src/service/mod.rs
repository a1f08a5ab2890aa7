//! Managers: per-domain CRUD and search, list relations and the factory handing them out.

mod cache;
mod factory;
mod lists;
mod manager;
mod validation;
pub use cache::ItemCache;
pub use factory::ManagerFactory;
pub use lists::{CleanupReport, ListManager};
pub use manager::{DomainManager, Manager};
pub use validation::RequestValidator;
