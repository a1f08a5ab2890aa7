//! Connection pool, per-session transaction slot and table DDL.
//!
//! Statements go through sqlx's `Any` driver so the same compiled SQL runs on
//! PostgreSQL and SQLite. A [`Db`] carries at most one open transaction; every
//! manager built from the same context shares it.

use crate::error::{ConfigError, MShopError};
use crate::schema::Schema;
use crate::sql::QueryBuf;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Any, AnyPool, Row, Transaction};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else {
            Err(ConfigError::Load(format!(
                "unsupported database url (expected postgres:// or sqlite:): {}",
                url
            )))
        }
    }

    fn id_column(&self) -> &'static str {
        match self {
            Backend::Postgres => "\"id\" BIGSERIAL PRIMARY KEY",
            Backend::Sqlite => "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }
}

#[derive(Clone)]
pub struct Db {
    pool: AnyPool,
    backend: Backend,
    tx: Arc<Mutex<Option<Transaction<'static, Any>>>>,
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").field("backend", &self.backend).finish_non_exhaustive()
    }
}

impl Db {
    /// Connects a pool. In-memory SQLite keeps a single connection alive for
    /// the lifetime of the pool, otherwise each connection would see its own database.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Db, MShopError> {
        sqlx::any::install_default_drivers();
        let backend = Backend::from_url(url)?;
        let options = if backend == Backend::Sqlite && url.contains(":memory:") {
            AnyPoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            AnyPoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = options.connect(url).await?;
        Ok(Db {
            pool,
            backend,
            tx: Arc::new(Mutex::new(None)),
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Same pool, independent transaction slot.
    pub fn session(&self) -> Db {
        Db {
            pool: self.pool.clone(),
            backend: self.backend,
            tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Opens a transaction. Returns `false` without doing anything when one is already open.
    pub async fn begin(&self) -> Result<bool, MShopError> {
        let mut slot = self.tx.lock().await;
        if slot.is_some() {
            return Ok(false);
        }
        *slot = Some(self.pool.begin().await?);
        tracing::debug!("transaction started");
        Ok(true)
    }

    /// No-op without an open transaction.
    pub async fn commit(&self) -> Result<(), MShopError> {
        let tx = self.tx.lock().await.take();
        if let Some(tx) = tx {
            tx.commit().await?;
            tracing::debug!("transaction committed");
        }
        Ok(())
    }

    /// No-op without an open transaction.
    pub async fn rollback(&self) -> Result<(), MShopError> {
        let tx = self.tx.lock().await.take();
        if let Some(tx) = tx {
            tx.rollback().await?;
            tracing::debug!("transaction rolled back");
        }
        Ok(())
    }

    pub async fn in_transaction(&self) -> bool {
        self.tx.lock().await.is_some()
    }

    /// Runs `f` inside a transaction, committing on success and rolling back on error.
    /// Inside an already open transaction `f` simply joins it and the outer owner decides.
    pub async fn atomically<T, F, Fut>(&self, f: F) -> Result<T, MShopError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, MShopError>>,
    {
        let started = self.begin().await?;
        match f().await {
            Ok(value) => {
                if started {
                    self.commit().await?;
                }
                Ok(value)
            }
            Err(err) => {
                if started {
                    self.rollback().await?;
                }
                Err(err)
            }
        }
    }

    pub async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<AnyRow>, MShopError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = p.bind(query);
        }
        let mut slot = self.tx.lock().await;
        let rows = match slot.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        Ok(rows)
    }

    /// Returns the number of affected rows.
    pub async fn execute(&self, q: &QueryBuf) -> Result<u64, MShopError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = p.bind(query);
        }
        let mut slot = self.tx.lock().await;
        let result = match slot.as_mut() {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    /// Runs an `INSERT ... RETURNING "id"` and returns the new id.
    pub async fn insert(&self, q: &QueryBuf) -> Result<i64, MShopError> {
        let rows = self.fetch_all(q).await?;
        let row = rows.first().ok_or(sqlx::Error::RowNotFound)?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn execute_raw(&self, sql: &str) -> Result<(), MShopError> {
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }
}

/// CREATE TABLE / UNIQUE INDEX statements for one schema.
pub fn table_ddl(schema: &Schema, backend: Backend) -> Vec<String> {
    let mut cols = vec![backend.id_column().to_string(), "\"siteid\" BIGINT NOT NULL".to_string()];
    for c in schema.columns {
        let null = if c.required { " NOT NULL" } else { "" };
        cols.push(format!(
            "\"{}\" {}{}",
            c.name,
            crate::sql::column_type(c.kind),
            null
        ));
    }
    cols.push("\"ctime\" VARCHAR(19) NOT NULL".to_string());
    cols.push("\"mtime\" VARCHAR(19) NOT NULL".to_string());
    cols.push("\"editor\" VARCHAR(255) NOT NULL".to_string());

    let mut out = vec![format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" ( {} )",
        schema.table,
        cols.join(", ")
    )];
    if !schema.unique.is_empty() {
        let keys: Vec<String> = std::iter::once("siteid")
            .chain(schema.unique.iter().copied())
            .map(|c| format!("\"{}\"", c))
            .collect();
        out.push(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"unq_{}_key\" ON \"{}\" ({})",
            schema.alias,
            schema.table,
            keys.join(", ")
        ));
    }
    out
}

/// Creates every table (and its business-key index) if missing.
pub async fn ensure_tables<'a, S>(db: &Db, schemas: S) -> Result<(), MShopError>
where
    S: IntoIterator<Item = &'a Schema>,
{
    for schema in schemas {
        for stmt in table_ddl(schema, db.backend()) {
            db.execute_raw(&stmt).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn backend_follows_the_url_scheme() {
        assert_eq!(Backend::from_url("postgres://localhost/shop").unwrap(), Backend::Postgres);
        assert_eq!(Backend::from_url("sqlite::memory:").unwrap(), Backend::Sqlite);
        assert!(Backend::from_url("mysql://localhost/shop").is_err());
    }

    #[test]
    fn ddl_declares_business_key() {
        let stmts = table_ddl(&schema::attribute(), Backend::Postgres);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("CREATE TABLE IF NOT EXISTS \"mshop_attribute\" ( \"id\" BIGSERIAL PRIMARY KEY"));
        assert!(stmts[0].contains("\"code\" VARCHAR(255) NOT NULL"));
        assert!(stmts[1].contains("(\"siteid\", \"domain\", \"typeid\", \"code\")"));

        let lite = table_ddl(&schema::attribute(), Backend::Sqlite);
        assert!(lite[0].contains("INTEGER PRIMARY KEY AUTOINCREMENT"));
    }
}
