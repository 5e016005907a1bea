//! SQLite backend: metadata queries, row decoding and parameter binding.
//!
//! SQLite has no column types to speak of; cells are decoded by the storage
//! class of the value actually stored and re-bound as such.

use histable_core::column::parse_declared_type;
use histable_core::{ColumnDefinition, SqlValue};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

const COLUMNS_QUERY: &str = "SELECT name, type FROM pragma_table_info(?) ORDER BY cid";

const TABLE_EXISTS_QUERY: &str =
    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?";

pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(TABLE_EXISTS_QUERY)
        .bind(table)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Columns of `table` from its declared types, in declaration order.
pub async fn columns(pool: &SqlitePool, table: &str) -> Result<Vec<ColumnDefinition>, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(COLUMNS_QUERY)
        .bind(table)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(name, declared)| {
            let declared = parse_declared_type(&declared);
            ColumnDefinition::from_raw_type(
                name,
                &declared.type_name,
                declared.size,
                declared.decimal_digits,
            )
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

pub async fn fetch_rows(
    pool: &SqlitePool,
    sql: &str,
    params: &[SqlValue],
    columns: &[&str],
) -> Result<Vec<Vec<SqlValue>>, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_value(query, value.clone());
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(|row| decode_row(row, columns)).collect()
}

pub async fn execute(pool: &SqlitePool, sql: &str, params: &[SqlValue]) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_value(query, value.clone());
    }
    Ok(query.execute(pool).await?.rows_affected())
}

/// Run every statement in one transaction; all or nothing.
pub async fn execute_batch(
    pool: &SqlitePool,
    statements: &[(String, Vec<SqlValue>)],
) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut affected = 0;

    for (sql, params) in statements {
        let mut query = sqlx::query(sql.as_str());
        for value in params {
            query = bind_value(query, value.clone());
        }
        affected += query.execute(&mut *tx).await?.rows_affected();
    }

    tx.commit().await?;
    Ok(affected)
}

fn decode_row(row: &SqliteRow, columns: &[&str]) -> Result<Vec<SqlValue>, sqlx::Error> {
    columns
        .iter()
        .map(|name| {
            let index = row.try_column(*name)?.ordinal();
            decode_cell(row, index)
        })
        .collect()
}

fn decode_cell(row: &SqliteRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match raw.type_info().name() {
        "INTEGER" => SqlValue::Int(row.try_get_unchecked(index)?),
        "REAL" => SqlValue::Double(row.try_get_unchecked(index)?),
        "BLOB" => SqlValue::Bytes(row.try_get_unchecked(index)?),
        _ => SqlValue::Text(row.try_get_unchecked(index)?),
    };

    Ok(value)
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::Int(v) => query.bind(v),
        // SQLite integers are signed 64-bit.
        SqlValue::UInt(v) => match i64::try_from(v) {
            Ok(v) => query.bind(v),
            Err(_) => query.bind(v.to_string()),
        },
        SqlValue::Double(v) => query.bind(v),
        SqlValue::Decimal(v) => query.bind(v.to_string()),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Bytes(v) => query.bind(v),
        SqlValue::Date(v) => query.bind(v),
        SqlValue::Time(v) => query.bind(v),
        SqlValue::DateTime(v) => query.bind(v),
        SqlValue::Timestamp(v) => query.bind(v),
    }
}
