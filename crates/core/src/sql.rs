//! Statement builder and the history table DDL/DML generator.
//!
//! Every statement the engine sends is produced here from table names and the
//! introspected [`ColumnDefinition`]s. The `CREATE TABLE` column order and the
//! `INSERT` column order come from the same slice, so positional binds always
//! line up with the history table layout.

use crate::column::ColumnDefinition;

// ---------------------------------------------------------------------------
// Audit columns
// ---------------------------------------------------------------------------

pub const ACTION_COLUMN: &str = "action";
pub const ACTION_BY_COLUMN: &str = "action_by";
pub const ACTION_TIME_COLUMN: &str = "action_time";

/// Audit columns appended to every history table, in bind order.
pub const AUDIT_COLUMNS: [&str; 3] = [ACTION_COLUMN, ACTION_BY_COLUMN, ACTION_TIME_COLUMN];

const ACTION_TYPE: &str = "VARCHAR(255) NOT NULL";
const ACTION_BY_TYPE: &str = "VARCHAR(255) NOT NULL";
const ACTION_TIME_TYPE: &str = "DATETIME NOT NULL";

// ---------------------------------------------------------------------------
// Dialect
// ---------------------------------------------------------------------------

/// SQL dialect of the connection a statement is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Column definition of the history table's surrogate key.
    pub fn surrogate_key_type(self) -> &'static str {
        match self {
            Dialect::MySql => "BIGINT UNSIGNED NOT NULL AUTO_INCREMENT",
            // Only an `INTEGER PRIMARY KEY` column aliases the rowid and is
            // assigned automatically.
            Dialect::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// Whether the primary key is declared by a trailing `PRIMARY KEY (...)`.
    pub fn trailing_primary_key(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Maximum number of `?` parameters in one statement.
    pub fn max_bind_params(self) -> usize {
        match self {
            Dialect::MySql => 65_535,
            Dialect::Sqlite => 32_766,
        }
    }
}

// ---------------------------------------------------------------------------
// Statement builder
// ---------------------------------------------------------------------------

/// `CREATE TABLE` with an ordered column list.
#[derive(Debug, Clone, Default)]
pub struct CreateTable {
    table: String,
    columns: Vec<(String, String)>,
    primary_key: Option<String>,
}

impl CreateTable {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Append a column; `definition` is everything after the column name.
    pub fn column(mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.columns.push((name.into(), definition.into()));
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|(name, definition)| {
                if definition.is_empty() {
                    name.clone()
                } else {
                    format!("{name} {definition}")
                }
            })
            .collect();

        if let Some(pk) = &self.primary_key {
            parts.push(format!("PRIMARY KEY ({pk})"));
        }

        format!("CREATE TABLE {} ({})", self.table, parts.join(", "))
    }
}

/// `SELECT *`, optionally filtered by one equality parameter.
#[derive(Debug, Clone)]
pub struct Select {
    table: String,
    filter_column: Option<String>,
}

impl Select {
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter_column: None,
        }
    }

    pub fn where_eq(mut self, column: impl Into<String>) -> Self {
        self.filter_column = Some(column.into());
        self
    }

    pub fn render(&self) -> String {
        match &self.filter_column {
            Some(column) => format!("SELECT * FROM {} WHERE {column} = ?", self.table),
            None => format!("SELECT * FROM {}", self.table),
        }
    }
}

/// Parameterized `INSERT` with one or more value tuples.
#[derive(Debug, Clone)]
pub struct InsertInto {
    table: String,
    columns: Vec<String>,
    rows: usize,
}

impl InsertInto {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            rows: 1,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = rows.max(1);
        self
    }

    pub fn render(&self) -> String {
        let tuple = format!("({})", vec!["?"; self.columns.len()].join(", "));
        let values = vec![tuple.as_str(); self.rows].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES {values}",
            self.table,
            self.columns.join(", ")
        )
    }
}

// ---------------------------------------------------------------------------
// History table generator
// ---------------------------------------------------------------------------

/// Column type as it appears in the history table DDL.
///
/// `TYPE[(size[,digits])][ UNSIGNED]`; temporal types and types reported with
/// size 0 get no length/precision clause, temporal types never get `UNSIGNED`.
pub fn column_type_sql(column: &ColumnDefinition) -> String {
    let mut ty = column.type_name.clone();

    if column.sql_type.is_temporal() {
        return ty;
    }

    if column.size > 0 {
        if column.decimal_digits > 0 {
            ty.push_str(&format!("({},{})", column.size, column.decimal_digits));
        } else {
            ty.push_str(&format!("({})", column.size));
        }
    }

    if column.unsigned {
        ty.push_str(" UNSIGNED");
    }

    ty
}

/// `CREATE TABLE` for a history table.
///
/// Returns an empty string for an empty column list; there is nothing to
/// mirror and the caller must treat that as a configuration problem.
pub fn create_table_sql(
    dialect: Dialect,
    history_table: &str,
    history_id_column: &str,
    columns: &[ColumnDefinition],
) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let mut stmt =
        CreateTable::new(history_table).column(history_id_column, dialect.surrogate_key_type());

    for column in columns {
        stmt = stmt.column(&column.name, column_type_sql(column));
    }

    stmt = stmt
        .column(ACTION_COLUMN, ACTION_TYPE)
        .column(ACTION_BY_COLUMN, ACTION_BY_TYPE)
        .column(ACTION_TIME_COLUMN, ACTION_TIME_TYPE);

    if dialect.trailing_primary_key() {
        stmt = stmt.primary_key(history_id_column);
    }

    stmt.render()
}

/// Removes a history table that was created but could not be backfilled.
pub fn drop_table_sql(history_table: &str) -> String {
    format!("DROP TABLE {history_table}")
}

pub fn select_all_sql(source_table: &str) -> String {
    Select::all(source_table).render()
}

pub fn select_by_id_sql(source_table: &str, source_id_column: &str) -> String {
    Select::all(source_table).where_eq(source_id_column).render()
}

/// Single-row `INSERT` into a history table.
pub fn insert_row_sql(history_table: &str, columns: &[ColumnDefinition]) -> String {
    insert_rows_sql(history_table, columns, 1)
}

/// Multi-row `INSERT` into a history table, `rows` value tuples.
///
/// Empty for an empty column list, like [`create_table_sql`].
pub fn insert_rows_sql(history_table: &str, columns: &[ColumnDefinition], rows: usize) -> String {
    if columns.is_empty() {
        return String::new();
    }

    InsertInto::new(history_table)
        .columns(columns.iter().map(|c| c.name.as_str()))
        .columns(AUDIT_COLUMNS)
        .rows(rows)
        .render()
}

/// How many history rows fit in one `INSERT` without exceeding the
/// dialect's parameter limit.
pub fn rows_per_statement(dialect: Dialect, source_column_count: usize) -> usize {
    let width = source_column_count + AUDIT_COLUMNS.len();
    (dialect.max_bind_params() / width).max(1)
}

/// The statements one history table needs, rendered once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStatements {
    pub create_table: String,
    pub drop_table: String,
    pub select_all: String,
    pub select_by_id: String,
    pub insert_row: String,
}

impl HistoryStatements {
    pub fn new(
        dialect: Dialect,
        mapping: &crate::mapping::EntityMapping,
        columns: &[ColumnDefinition],
    ) -> Self {
        Self {
            create_table: create_table_sql(
                dialect,
                &mapping.history_table,
                &mapping.history_id_column,
                columns,
            ),
            drop_table: drop_table_sql(&mapping.history_table),
            select_all: select_all_sql(&mapping.source_table),
            select_by_id: select_by_id_sql(&mapping.source_table, &mapping.source_id_column),
            insert_row: insert_row_sql(&mapping.history_table, columns),
        }
    }
}
