//! Live-database side of the history table engine.
//!
//! [`DataSource`] wraps a sqlx pool per backend, [`introspect`] reads source
//! table columns, [`HistoryTableManager`] creates, backfills and appends to one
//! history table, and [`HistoryTables`] is the caller-owned registry that ties
//! a resolved [`histable_core::HistoryConfig`] to named data sources.

pub mod datasource;
pub mod error;
pub mod introspect;
pub mod manager;
pub mod mysql;
pub mod registry;
pub mod sqlite;

pub use datasource::{DataSource, DataSources};
pub use error::{HistoryError, IntrospectionError, ManagerError, ManagerErrorKind, Operation};
pub use manager::HistoryTableManager;
pub use registry::{EnsureOutcome, HistoryRecorder, HistoryTables};

/// Default pool size for data sources opened from a URL.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Open a data source from a database URL (`mysql://` or `sqlite:`).
pub async fn create_data_source(database_url: &str) -> Result<DataSource, sqlx::Error> {
    DataSource::connect(database_url, DEFAULT_MAX_CONNECTIONS).await
}
