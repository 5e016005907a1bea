//! One history table: existence check, creation, backfill and append.
//!
//! A [`HistoryTableManager`] introspects its source table once, when opened,
//! and renders every statement it will ever send from that column list. Source
//! reads go to the source data source, DDL and inserts to the history one; the
//! source table is never written.

use histable_core::sql::{insert_rows_sql, rows_per_statement, HistoryStatements, AUDIT_COLUMNS};
use histable_core::{Action, AuditRow, ColumnDefinition, EntityMapping, SqlValue, Timestamp};

use crate::datasource::DataSource;
use crate::error::{HistoryError, ManagerError, ManagerErrorKind, Operation};
use crate::introspect;

#[derive(Debug)]
pub struct HistoryTableManager {
    mapping: EntityMapping,
    columns: Vec<ColumnDefinition>,
    statements: HistoryStatements,
    source: DataSource,
    history: DataSource,
}

impl HistoryTableManager {
    /// Introspect the source table and prepare the history statements.
    ///
    /// Fails when the source table cannot be read, or when one of its columns
    /// would clash with a column the history table adds.
    pub async fn open(
        mapping: EntityMapping,
        source: DataSource,
        history: DataSource,
    ) -> Result<Self, HistoryError> {
        let columns = introspect::columns(&source, &mapping.source_table).await?;
        check_reserved_columns(&mapping, &columns)?;

        let statements = HistoryStatements::new(history.dialect(), &mapping, &columns);

        Ok(Self {
            mapping,
            columns,
            statements,
            source,
            history,
        })
    }

    pub fn mapping(&self) -> &EntityMapping {
        &self.mapping
    }

    /// Source columns, frozen at [`open`](Self::open).
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn statements(&self) -> &HistoryStatements {
        &self.statements
    }

    pub fn history_table(&self) -> &str {
        &self.mapping.history_table
    }

    /// Whether the history table exists on the history data source.
    pub async fn exists(&self) -> Result<bool, ManagerError> {
        self.history
            .table_exists(&self.mapping.history_table)
            .await
            .map_err(|e| self.error(Operation::Exists, e))
    }

    /// Create the history table.
    ///
    /// Fails if it already exists; [`ManagerError::is_table_already_exists`]
    /// tells that case apart.
    pub async fn create(&self) -> Result<(), ManagerError> {
        if self.statements.create_table.is_empty() {
            return Err(self.error(Operation::Create, ManagerErrorKind::EmptyColumnList));
        }

        tracing::debug!(sql = %self.statements.create_table, "Creating history table");
        self.history
            .execute(&self.statements.create_table, &[])
            .await
            .map_err(|e| self.error(Operation::Create, e))?;

        tracing::info!(
            entity = %self.mapping.entity_key,
            table = %self.mapping.history_table,
            "History table created",
        );
        Ok(())
    }

    /// Drop the history table.
    ///
    /// Only used to undo a [`create`](Self::create) whose backfill failed, so
    /// the next attempt finds no table and starts over.
    pub async fn drop_table(&self) -> Result<(), ManagerError> {
        tracing::debug!(sql = %self.statements.drop_table, "Dropping history table");
        self.history
            .execute(&self.statements.drop_table, &[])
            .await
            .map_err(|e| self.error(Operation::Drop, e))?;

        tracing::warn!(
            entity = %self.mapping.entity_key,
            table = %self.mapping.history_table,
            "Unpopulated history table dropped",
        );
        Ok(())
    }

    /// Copy every source row into the history table as `INITIAL`.
    ///
    /// All rows share `actor_id` and `timestamp` and are written in one
    /// transaction. Returns the number of history rows written.
    pub async fn populate(&self, actor_id: &str, timestamp: Timestamp) -> Result<u64, ManagerError> {
        let rows = self
            .source
            .fetch_rows(&self.statements.select_all, &[], &self.column_names())
            .await
            .map_err(|e| self.error(Operation::Populate, e))?;

        if rows.is_empty() {
            tracing::info!(table = %self.mapping.history_table, "Source table empty, nothing to backfill");
            return Ok(0);
        }

        let chunk_size = rows_per_statement(self.history.dialect(), self.columns.len());
        let statements: Vec<(String, Vec<SqlValue>)> = rows
            .chunks(chunk_size)
            .map(|chunk| {
                let sql = insert_rows_sql(&self.mapping.history_table, &self.columns, chunk.len());
                let params = chunk
                    .iter()
                    .flat_map(|values| {
                        AuditRow::new(values.clone(), Action::Initial, actor_id, timestamp).into_params()
                    })
                    .collect();
                (sql, params)
            })
            .collect();

        tracing::debug!(
            table = %self.mapping.history_table,
            rows = rows.len(),
            statements = statements.len(),
            "Backfilling history table",
        );

        let written = self
            .history
            .execute_batch(&statements)
            .await
            .map_err(|e| self.error(Operation::Populate, e))?;

        tracing::info!(
            entity = %self.mapping.entity_key,
            table = %self.mapping.history_table,
            rows = written,
            "History table backfilled",
        );
        Ok(written)
    }

    /// Append the current state of source row `row_id` with `action`.
    ///
    /// Only the first matching source row is recorded. A missing row is an
    /// error: a deletion has to be recorded before the row is removed.
    pub async fn insert(
        &self,
        row_id: &SqlValue,
        action: Action,
        actor_id: &str,
        timestamp: Timestamp,
    ) -> Result<(), ManagerError> {
        if self.statements.insert_row.is_empty() {
            return Err(self.error(Operation::Insert, ManagerErrorKind::EmptyColumnList));
        }

        let values = self
            .source
            .fetch_rows(
                &self.statements.select_by_id,
                std::slice::from_ref(row_id),
                &self.column_names(),
            )
            .await
            .map_err(|e| self.error(Operation::Insert, e))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                self.error(
                    Operation::Insert,
                    ManagerErrorKind::SourceRowMissing(row_id.to_string()),
                )
            })?;

        let params: Vec<SqlValue> = AuditRow::new(values, action, actor_id, timestamp)
            .into_params()
            .collect();

        tracing::debug!(sql = %self.statements.insert_row, id = %row_id, %action, "Recording change");
        self.history
            .execute(&self.statements.insert_row, &params)
            .await
            .map_err(|e| self.error(Operation::Insert, e))?;

        Ok(())
    }

    fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn error(&self, operation: Operation, kind: impl Into<ManagerErrorKind>) -> ManagerError {
        ManagerError::new(self.mapping.entity_key.clone(), operation, kind)
    }
}

/// Source columns may not reuse the names of the columns the history table adds.
fn check_reserved_columns(
    mapping: &EntityMapping,
    columns: &[ColumnDefinition],
) -> Result<(), HistoryError> {
    let reserved = AUDIT_COLUMNS
        .iter()
        .copied()
        .chain(std::iter::once(mapping.history_id_column.as_str()));

    for name in reserved {
        if columns.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
            return Err(HistoryError::InvalidArgument(format!(
                "source table {} has a column named {name}, which {} reserves",
                mapping.source_table, mapping.history_table
            )));
        }
    }
    Ok(())
}
