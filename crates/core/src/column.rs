//! Column metadata read from a source table.
//!
//! Backends report a raw type name in the JDBC `TYPE_NAME` shape
//! (`INT UNSIGNED`, `DECIMAL`, `DATETIME`) plus a declared size and scale.
//! [`ColumnDefinition::from_raw_type`] turns that into the clean type name,
//! the unsigned flag, and the broad [`SqlType`] the DDL generator needs.

use serde::Serialize;

/// Token marking an unsigned numeric type in a raw type name.
pub const UNSIGNED_TOKEN: &str = " UNSIGNED";

/// JDBC-style type codes (`java.sql.Types`) reported for non-temporal columns.
pub mod type_codes {
    pub const BIT: i32 = -7;
    pub const TINYINT: i32 = -6;
    pub const BIGINT: i32 = -5;
    pub const LONGVARBINARY: i32 = -4;
    pub const VARBINARY: i32 = -3;
    pub const BINARY: i32 = -2;
    pub const LONGVARCHAR: i32 = -1;
    pub const CHAR: i32 = 1;
    pub const NUMERIC: i32 = 2;
    pub const DECIMAL: i32 = 3;
    pub const INTEGER: i32 = 4;
    pub const SMALLINT: i32 = 5;
    pub const REAL: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const VARCHAR: i32 = 12;
    pub const BOOLEAN: i32 = 16;
    pub const DATE: i32 = 91;
    pub const TIME: i32 = 92;
    pub const TIMESTAMP: i32 = 93;
    pub const OTHER: i32 = 1111;
}

/// Broad type classifier.
///
/// Only the temporal types matter to the generator: they never take a
/// length/precision clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SqlType {
    Date,
    Time,
    Timestamp,
    Other(i32),
}

impl SqlType {
    /// Classify a clean type name (no `UNSIGNED`, case-insensitive).
    pub fn classify(type_name: &str) -> Self {
        let base = type_name
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_uppercase();

        match base.as_str() {
            "DATE" | "YEAR" => SqlType::Date,
            "TIME" => SqlType::Time,
            "DATETIME" | "TIMESTAMP" => SqlType::Timestamp,
            other => SqlType::Other(other_code(other)),
        }
    }

    /// JDBC-style numeric code.
    pub fn code(self) -> i32 {
        match self {
            SqlType::Date => type_codes::DATE,
            SqlType::Time => type_codes::TIME,
            SqlType::Timestamp => type_codes::TIMESTAMP,
            SqlType::Other(code) => code,
        }
    }

    pub fn is_temporal(self) -> bool {
        !matches!(self, SqlType::Other(_))
    }
}

fn other_code(base: &str) -> i32 {
    use type_codes::*;

    match base {
        "BIT" => BIT,
        "TINYINT" => TINYINT,
        "BOOL" | "BOOLEAN" => BOOLEAN,
        "SMALLINT" => SMALLINT,
        "MEDIUMINT" | "INT" | "INTEGER" => INTEGER,
        "BIGINT" => BIGINT,
        "FLOAT" | "REAL" => REAL,
        "DOUBLE" | "DOUBLE PRECISION" => DOUBLE,
        "DECIMAL" | "DEC" => DECIMAL,
        "NUMERIC" => NUMERIC,
        "CHAR" | "CHARACTER" | "NCHAR" | "ENUM" | "SET" => CHAR,
        "VARCHAR" | "NVARCHAR" | "CHARACTER VARYING" => VARCHAR,
        "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "CLOB" | "JSON" => LONGVARCHAR,
        "BINARY" => BINARY,
        "VARBINARY" => VARBINARY,
        "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => LONGVARBINARY,
        _ => OTHER,
    }
}

/// One column of a source table, in table order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Declared length or precision; 0 when the type has none.
    pub size: u64,
    pub sql_type: SqlType,
    /// Declared scale; 0 when the type has none.
    pub decimal_digits: u32,
    /// Type name with the unsigned marker stripped.
    pub type_name: String,
    pub unsigned: bool,
}

impl ColumnDefinition {
    /// Build a definition from a raw, JDBC-shaped type name.
    ///
    /// The unsigned flag and the clean type name are both derived from
    /// `raw_type_name` via [`split_unsigned`].
    pub fn from_raw_type(
        name: impl Into<String>,
        raw_type_name: &str,
        size: u64,
        decimal_digits: u32,
    ) -> Self {
        let (type_name, unsigned) = split_unsigned(raw_type_name);
        let sql_type = SqlType::classify(&type_name);
        Self {
            name: name.into(),
            size,
            sql_type,
            decimal_digits,
            type_name,
            unsigned,
        }
    }
}

/// Detect and strip the unsigned marker.
///
/// The marker is the literal, case-sensitive token ` UNSIGNED` (with its
/// leading space). Returns the clean type name and whether it was present.
pub fn split_unsigned(raw_type_name: &str) -> (String, bool) {
    if raw_type_name.contains(UNSIGNED_TOKEN) {
        (raw_type_name.replace(UNSIGNED_TOKEN, ""), true)
    } else {
        (raw_type_name.to_string(), false)
    }
}

/// A column type declaration split into name and numeric arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    /// Upper-cased type name without arguments, e.g. `DECIMAL UNSIGNED`.
    /// Declarations with non-numeric arguments (`enum('a','b')`) are kept
    /// verbatim.
    pub type_name: String,
    pub size: u64,
    pub decimal_digits: u32,
}

/// Parse a declaration such as `decimal(10,2) unsigned` or `VARCHAR(40)`.
pub fn parse_declared_type(declared: &str) -> DeclaredType {
    let declared = declared.trim();

    let arguments = declared.find('(').and_then(|open| {
        declared[open..]
            .find(')')
            .map(|len| (open, open + len))
    });

    let Some((open, close)) = arguments else {
        return DeclaredType {
            type_name: normalize(declared),
            size: 0,
            decimal_digits: 0,
        };
    };

    let numbers: Option<Vec<u64>> = declared[open + 1..close]
        .split(',')
        .map(|part| part.trim().parse::<u64>().ok())
        .collect();

    match numbers.as_deref() {
        Some([size]) => DeclaredType {
            type_name: normalize(&format!("{} {}", &declared[..open], &declared[close + 1..])),
            size: *size,
            decimal_digits: 0,
        },
        Some([size, digits]) => DeclaredType {
            type_name: normalize(&format!("{} {}", &declared[..open], &declared[close + 1..])),
            size: *size,
            decimal_digits: u32::try_from(*digits).unwrap_or(u32::MAX),
        },
        _ => DeclaredType {
            type_name: declared.to_string(),
            size: 0,
            decimal_digits: 0,
        },
    }
}

/// Upper-case and collapse whitespace.
fn normalize(type_name: &str) -> String {
    type_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}
