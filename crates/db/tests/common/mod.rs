#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use histable_core::{HistoryConfig, SqlValue, Timestamp};
use histable_db::{DataSource, DataSources};

/// Mapping used across the suites: one entity on defaults, one fully named.
pub const MAPPING: &str = "
source_data_source: app
history_data_source: audit
entities:
  - entity: com.example.Invoice
  - entity: com.example.Customer
    table: { name: customers, id: id }
    history_table: { name: customers_audit }
";

pub const INVOICE_DDL: &str = "\
    CREATE TABLE invoice (\
        invoice_id INTEGER PRIMARY KEY, \
        customer VARCHAR(40) NOT NULL, \
        amount DECIMAL(10,2), \
        quantity INT UNSIGNED, \
        issued_at TIMESTAMP)";

pub const INVOICE_COLUMNS: [&str; 5] = ["invoice_id", "customer", "amount", "quantity", "issued_at"];

pub fn config() -> HistoryConfig {
    HistoryConfig::from_yaml_str(MAPPING).unwrap()
}

/// A fresh, private in-memory database.
pub async fn memory_db() -> DataSource {
    histable_db::create_data_source("sqlite::memory:").await.unwrap()
}

/// An in-memory database holding an `invoice` table with `rows` rows.
pub async fn source_with_invoices(rows: i64) -> DataSource {
    let db = memory_db().await;
    db.execute(INVOICE_DDL, &[]).await.unwrap();
    for id in 1..=rows {
        db.execute(
            "INSERT INTO invoice (invoice_id, customer, amount, quantity, issued_at) \
             VALUES (?, ?, ?, ?, ?)",
            &[
                SqlValue::Int(id),
                SqlValue::Text(format!("customer {id}")),
                SqlValue::Double(12.5 * id as f64),
                SqlValue::Int(id * 3),
                SqlValue::Text(format!("2024-01-{:02} 10:00:00", id % 28 + 1)),
            ],
        )
        .await
        .unwrap();
    }
    db
}

pub fn data_sources(source: &DataSource, history: &DataSource) -> DataSources {
    DataSources::new()
        .with("app", source.clone())
        .with("audit", history.clone())
}

/// A fixed instant, `hour` o'clock on 2024-03-01 UTC.
pub fn at(hour: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

pub async fn count(db: &DataSource, table: &str) -> i64 {
    let rows = db
        .fetch_rows(&format!("SELECT COUNT(*) AS n FROM {table}"), &[], &["n"])
        .await
        .unwrap();
    match rows[0][0] {
        SqlValue::Int(n) => n,
        ref other => panic!("unexpected count value {other:?}"),
    }
}

/// `(action, action_by, action_time)` of every history row, in insertion order.
pub async fn audit_columns(db: &DataSource, history_table: &str) -> Vec<(String, String, String)> {
    let pool = match db {
        DataSource::Sqlite(pool) => pool,
        DataSource::MySql(_) => panic!("sqlite only"),
    };
    sqlx::query_as(&format!(
        "SELECT action, action_by, action_time FROM {history_table} ORDER BY rowid"
    ))
    .fetch_all(pool)
    .await
    .unwrap()
}
