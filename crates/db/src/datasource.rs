//! Pooled connections to the source and history databases.

use std::collections::HashMap;
use std::str::FromStr;

use histable_core::{ColumnDefinition, Dialect, SqlValue};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::{mysql, sqlite};

/// A connection pool to one database, tagged with its backend.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub enum DataSource {
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

impl DataSource {
    /// Connect to a `mysql://`/`mariadb://` or `sqlite:` URL.
    ///
    /// In-memory SQLite databases live and die with their connection, so
    /// their pool is pinned to a single connection that is never recycled.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        if url.starts_with("mysql:") || url.starts_with("mariadb:") {
            let pool = MySqlPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await?;
            return Ok(DataSource::MySql(pool));
        }

        if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
            let in_memory = url.contains(":memory:") || url.contains("mode=memory");

            let pool_options = if in_memory {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
            } else {
                SqlitePoolOptions::new().max_connections(max_connections)
            };
            let pool = pool_options.connect_with(options).await?;
            return Ok(DataSource::Sqlite(pool));
        }

        let scheme = url.split(':').next().unwrap_or_default();
        Err(sqlx::Error::Configuration(
            format!("unsupported database URL scheme: {scheme}").into(),
        ))
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DataSource::MySql(_) => Dialect::MySql,
            DataSource::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Verify that the database is reachable.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        match self {
            DataSource::MySql(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
            DataSource::Sqlite(pool) => sqlx::query("SELECT 1").execute(pool).await.map(|_| ()),
        }
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, sqlx::Error> {
        match self {
            DataSource::MySql(pool) => mysql::table_exists(pool, table).await,
            DataSource::Sqlite(pool) => sqlite::table_exists(pool, table).await,
        }
    }

    /// Raw column metadata; see [`crate::introspect::columns`].
    pub async fn columns(&self, table: &str) -> Result<Vec<ColumnDefinition>, sqlx::Error> {
        match self {
            DataSource::MySql(pool) => mysql::columns(pool, table).await,
            DataSource::Sqlite(pool) => sqlite::columns(pool, table).await,
        }
    }

    /// Run a query and decode the named columns of every row, in that order.
    pub async fn fetch_rows(
        &self,
        sql: &str,
        params: &[SqlValue],
        columns: &[&str],
    ) -> Result<Vec<Vec<SqlValue>>, sqlx::Error> {
        match self {
            DataSource::MySql(pool) => mysql::fetch_rows(pool, sql, params, columns).await,
            DataSource::Sqlite(pool) => sqlite::fetch_rows(pool, sql, params, columns).await,
        }
    }

    /// Execute one statement; returns the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, sqlx::Error> {
        match self {
            DataSource::MySql(pool) => mysql::execute(pool, sql, params).await,
            DataSource::Sqlite(pool) => sqlite::execute(pool, sql, params).await,
        }
    }

    /// Execute statements in a single transaction.
    pub async fn execute_batch(
        &self,
        statements: &[(String, Vec<SqlValue>)],
    ) -> Result<u64, sqlx::Error> {
        match self {
            DataSource::MySql(pool) => mysql::execute_batch(pool, statements).await,
            DataSource::Sqlite(pool) => sqlite::execute_batch(pool, statements).await,
        }
    }
}

impl From<MySqlPool> for DataSource {
    fn from(pool: MySqlPool) -> Self {
        DataSource::MySql(pool)
    }
}

impl From<SqlitePool> for DataSource {
    fn from(pool: SqlitePool) -> Self {
        DataSource::Sqlite(pool)
    }
}

/// Data sources by the names a mapping document refers to.
#[derive(Debug, Clone, Default)]
pub struct DataSources {
    sources: HashMap<String, DataSource>,
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, source: impl Into<DataSource>) -> Self {
        self.insert(name, source);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<DataSource>) {
        self.sources.insert(name.into(), source.into());
    }

    pub fn get(&self, name: &str) -> Option<&DataSource> {
        self.sources.get(name)
    }
}
