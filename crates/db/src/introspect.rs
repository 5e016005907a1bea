//! Source table introspection.

use histable_core::ColumnDefinition;

use crate::datasource::DataSource;
use crate::error::IntrospectionError;

/// Columns of `table`, in table order.
///
/// A table that does not exist has no readable columns and is reported as
/// [`IntrospectionError::NotFound`].
pub async fn columns(
    source: &DataSource,
    table: &str,
) -> Result<Vec<ColumnDefinition>, IntrospectionError> {
    let columns = source
        .columns(table)
        .await
        .map_err(|source| IntrospectionError::Query {
            table: table.to_string(),
            source,
        })?;

    if columns.is_empty() {
        return Err(IntrospectionError::NotFound(table.to_string()));
    }

    tracing::debug!(table, columns = columns.len(), "Source table introspected");
    Ok(columns)
}
