//! Database-independent building blocks of the history table engine.
//!
//! - [`naming`]: identifier to `snake_case` conversion used for defaults.
//! - [`mapping`]: mapping document parsing and [`EntityMapping`] resolution.
//! - [`column`]: introspected column metadata.
//! - [`sql`]: statement builder and the history DDL/DML generator.
//! - [`value`], [`record`], [`action`]: what gets written per audited change.
//!
//! Nothing in this crate opens a connection; the `histable-db` crate drives
//! these pieces against a live database.

pub mod action;
pub mod column;
pub mod error;
pub mod mapping;
pub mod naming;
pub mod record;
pub mod sql;
pub mod types;
pub mod value;

pub use action::Action;
pub use column::{ColumnDefinition, SqlType};
pub use error::ConfigError;
pub use mapping::{EntityMapping, HistoryConfig, MappingDocument, PropertyColumns};
pub use record::{AuditRow, IdentifiableRecord};
pub use sql::Dialect;
pub use types::Timestamp;
pub use value::SqlValue;
