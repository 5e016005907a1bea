use std::fmt;

use histable_core::ConfigError;
use sqlx::mysql::MySqlDatabaseError;

/// MySQL server error number for `ER_TABLE_EXISTS_ERROR`.
const MYSQL_TABLE_EXISTS: u16 = 1050;

/// Failure to read a source table's column metadata.
#[derive(Debug, thiserror::Error)]
pub enum IntrospectionError {
    #[error("Failed to read columns of {table}: {source}")]
    Query {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Table {0} not found or has no columns")]
    NotFound(String),
}

/// Manager operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Exists,
    Create,
    Populate,
    Insert,
    Drop,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Exists => "exists",
            Operation::Create => "create",
            Operation::Populate => "populate",
            Operation::Insert => "insert",
            Operation::Drop => "drop",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManagerErrorKind {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("source table has no columns to mirror")]
    EmptyColumnList,

    #[error("no source row with id {0}")]
    SourceRowMissing(String),
}

/// A history table operation failed.
///
/// Carries the entity and the operation so a caller can log or surface the
/// failure without further context; the underlying database error, when there
/// is one, is kept intact.
#[derive(Debug, thiserror::Error)]
#[error("History table {operation} failed for {entity_key}: {kind}")]
pub struct ManagerError {
    pub entity_key: String,
    pub operation: Operation,
    #[source]
    pub kind: ManagerErrorKind,
}

impl ManagerError {
    pub fn new(entity_key: impl Into<String>, operation: Operation, kind: impl Into<ManagerErrorKind>) -> Self {
        Self {
            entity_key: entity_key.into(),
            operation,
            kind: kind.into(),
        }
    }

    /// Vendor error code of the underlying database error, if any.
    pub fn database_code(&self) -> Option<String> {
        match &self.kind {
            ManagerErrorKind::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().map(|c| c.into_owned())
            }
            _ => None,
        }
    }

    /// Whether `CREATE TABLE` lost a race against another process.
    pub fn is_table_already_exists(&self) -> bool {
        let ManagerErrorKind::Database(sqlx::Error::Database(db_err)) = &self.kind else {
            return false;
        };

        if let Some(mysql) = db_err.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql.number() == MYSQL_TABLE_EXISTS;
        }

        // SQLite reports a generic SQLITE_ERROR; only the message tells.
        db_err.message().contains("already exists")
    }
}

/// Errors surfaced by the registry and the change-recording boundary.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    /// The backfill failed and the half-built history table could not be
    /// removed either; it has to be dropped by hand.
    #[error("{populate}; removing the unpopulated table also failed: {drop}")]
    Abandoned {
        populate: ManagerError,
        #[source]
        drop: ManagerError,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
