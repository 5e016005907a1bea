//! MySQL backend: metadata queries, row decoding and parameter binding.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use histable_core::column::parse_declared_type;
use histable_core::{ColumnDefinition, SqlValue};
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo, ValueRef};

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Column metadata in `TYPE_NAME` shape: `UPPER(DATA_TYPE)` plus ` UNSIGNED`.
///
/// `information_schema` text columns are cast to `CHAR` because MySQL 8
/// reports several of them with a binary collation.
const COLUMNS_QUERY: &str = "\
    SELECT CAST(COLUMN_NAME AS CHAR), \
           CAST(CONCAT(UPPER(DATA_TYPE), IF(COLUMN_TYPE LIKE '%unsigned%', ' UNSIGNED', '')) AS CHAR), \
           CAST(COLUMN_TYPE AS CHAR) \
    FROM information_schema.COLUMNS \
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
    ORDER BY ORDINAL_POSITION";

const TABLE_EXISTS_QUERY: &str = "\
    SELECT COUNT(*) FROM information_schema.TABLES \
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

pub async fn table_exists(pool: &MySqlPool, table: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(TABLE_EXISTS_QUERY)
        .bind(table)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Columns of `table` in the current schema, in ordinal order.
pub async fn columns(pool: &MySqlPool, table: &str) -> Result<Vec<ColumnDefinition>, sqlx::Error> {
    let rows: Vec<(String, String, String)> = sqlx::query_as(COLUMNS_QUERY)
        .bind(table)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(name, type_name, column_type)| column_definition(name, &type_name, &column_type))
        .collect())
}

fn column_definition(name: String, type_name: &str, column_type: &str) -> ColumnDefinition {
    // ENUM and SET carry their value list as the type; there is no size.
    if matches!(type_name, "ENUM" | "SET") {
        return ColumnDefinition::from_raw_type(name, column_type, 0, 0);
    }

    let declared = parse_declared_type(column_type);
    ColumnDefinition::from_raw_type(name, type_name, declared.size, declared.decimal_digits)
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

pub async fn fetch_rows(
    pool: &MySqlPool,
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

pub async fn execute(pool: &MySqlPool, sql: &str, params: &[SqlValue]) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_value(query, value.clone());
    }
    Ok(query.execute(pool).await?.rows_affected())
}

/// Run every statement in one transaction; all or nothing.
pub async fn execute_batch(
    pool: &MySqlPool,
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

/// Decode the named columns of a row, in the order given.
fn decode_row(row: &MySqlRow, columns: &[&str]) -> Result<Vec<SqlValue>, sqlx::Error> {
    columns
        .iter()
        .map(|name| {
            let index = row.try_column(*name)?.ordinal();
            decode_cell(row, index)
        })
        .collect()
}

fn decode_cell(row: &MySqlRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match row.column(index).type_info().name() {
        "BOOLEAN" => SqlValue::Bool(row.try_get_unchecked(index)?),
        name if name.ends_with(" UNSIGNED") => SqlValue::UInt(row.try_get_unchecked(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            SqlValue::Int(row.try_get_unchecked(index)?)
        }
        "FLOAT" => SqlValue::Double(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        "DOUBLE" => SqlValue::Double(row.try_get_unchecked(index)?),
        "DECIMAL" => SqlValue::Decimal(row.try_get_unchecked::<Decimal, _>(index)?),
        "DATE" => SqlValue::Date(row.try_get_unchecked::<NaiveDate, _>(index)?),
        "TIME" => SqlValue::Time(row.try_get_unchecked::<NaiveTime, _>(index)?),
        "DATETIME" => SqlValue::DateTime(row.try_get_unchecked::<NaiveDateTime, _>(index)?),
        "TIMESTAMP" => SqlValue::Timestamp(row.try_get_unchecked::<DateTime<Utc>, _>(index)?),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => SqlValue::Bytes(row.try_get_unchecked(index)?),
        _ => SqlValue::Text(row.try_get_unchecked(index)?),
    };

    Ok(value)
}

fn bind_value(
    query: Query<'_, MySql, MySqlArguments>,
    value: SqlValue,
) -> Query<'_, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::Int(v) => query.bind(v),
        SqlValue::UInt(v) => query.bind(v),
        SqlValue::Double(v) => query.bind(v),
        SqlValue::Decimal(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Bytes(v) => query.bind(v),
        SqlValue::Date(v) => query.bind(v),
        SqlValue::Time(v) => query.bind(v),
        SqlValue::DateTime(v) => query.bind(v),
        SqlValue::Timestamp(v) => query.bind(v),
    }
}
