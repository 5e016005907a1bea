//! Mapping document and entity mapping resolution.
//!
//! A mapping document lists the audited entities and, optionally, the table
//! and column names to use for each. Anything left out is derived from the
//! entity key with the [`naming`](crate::naming) convention:
//!
//! | Value               | Default                                  |
//! |---------------------|------------------------------------------|
//! | source table        | `snake_case(simple name of entity key)`  |
//! | source id column    | `<source table>_id`                      |
//! | history table       | `<source table><suffix>`                 |
//! | history id column   | `<history table>_id`                     |
//! | property columns    | `snake_case(property with . -> _)`       |
//!
//! The suffix is the entity's own override, else the document-level
//! `history_table_suffix`, else `_history`. Id-column defaults are derived from
//! the *resolved* table names, so overriding a table name also moves its id
//! column default.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::naming::{property_column, simple_name, to_snake_case};

pub const DEFAULT_HISTORY_TABLE_SUFFIX: &str = "_history";
pub const ID_COLUMN_SUFFIX: &str = "_id";

// ---------------------------------------------------------------------------
// Document (as written)
// ---------------------------------------------------------------------------

/// Parsed, unresolved mapping document.
///
/// Required elements are `Option`s so that their absence is reported as
/// [`ConfigError::MissingElement`] rather than a generic parse failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MappingDocument {
    pub source_data_source: Option<String>,
    pub history_data_source: Option<String>,
    #[serde(default)]
    pub history_table_suffix: Option<String>,
    pub entities: Option<Vec<EntityEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EntityEntry {
    pub entity: Option<String>,
    #[serde(default)]
    pub table: Option<TableRef>,
    #[serde(default)]
    pub history_table: Option<TableRef>,
    #[serde(default)]
    pub history_table_suffix: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyEntry>,
}

/// Optional table name and id column override.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TableRef {
    pub name: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyEntry {
    pub property: Option<String>,
    pub source_column: Option<String>,
    pub history_column: Option<String>,
}

impl MappingDocument {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read a document from disk; the format follows the file extension
    /// (`.yaml`, `.yml` or `.json`).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved mappings
// ---------------------------------------------------------------------------

/// Source and history column of one mapped property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyColumns {
    pub source_column: String,
    pub history_column: String,
}

/// Fully resolved table and column names for one audited entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityMapping {
    pub entity_key: String,
    pub source_table: String,
    pub source_id_column: String,
    pub history_table: String,
    pub history_id_column: String,
    pub property_columns: BTreeMap<String, PropertyColumns>,
}

impl EntityMapping {
    /// Source column for a property, falling back to the naming default.
    pub fn source_column(&self, property: &str) -> String {
        self.property_columns
            .get(property)
            .map_or_else(|| property_column(property), |p| p.source_column.clone())
    }

    /// History column for a property, falling back to the naming default.
    pub fn history_column(&self, property: &str) -> String {
        self.property_columns
            .get(property)
            .map_or_else(|| property_column(property), |p| p.history_column.clone())
    }
}

/// Resolved configuration: one [`EntityMapping`] per entity key plus the two
/// data-source references, which are passed through uninterpreted.
///
/// Build it once at startup and hand it to whatever drives the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryConfig {
    pub source_data_source: String,
    pub history_data_source: String,
    entities: BTreeMap<String, EntityMapping>,
}

impl HistoryConfig {
    /// Load and resolve a mapping document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        resolve(&MappingDocument::from_path(path)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        resolve(&MappingDocument::from_yaml_str(text)?)
    }

    pub fn get(&self, entity_key: &str) -> Option<&EntityMapping> {
        self.entities.get(entity_key)
    }

    /// Mappings ordered by entity key.
    pub fn entities(&self) -> impl Iterator<Item = &EntityMapping> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Resolve every entity entry of a document, applying naming defaults.
pub fn resolve(document: &MappingDocument) -> Result<HistoryConfig, ConfigError> {
    let source_data_source = given(&document.source_data_source)
        .ok_or(ConfigError::MissingElement("source_data_source"))?
        .to_string();
    let history_data_source = given(&document.history_data_source)
        .ok_or(ConfigError::MissingElement("history_data_source"))?
        .to_string();
    let entries = document
        .entities
        .as_deref()
        .filter(|entries| !entries.is_empty())
        .ok_or(ConfigError::MissingElement("entities"))?;

    let default_suffix = given(&document.history_table_suffix).unwrap_or(DEFAULT_HISTORY_TABLE_SUFFIX);

    let mut entities = BTreeMap::new();
    for entry in entries {
        let mapping = resolve_entity(entry, default_suffix)?;
        if entities.contains_key(&mapping.entity_key) {
            return Err(ConfigError::DuplicateEntity(mapping.entity_key));
        }
        entities.insert(mapping.entity_key.clone(), mapping);
    }

    Ok(HistoryConfig {
        source_data_source,
        history_data_source,
        entities,
    })
}

fn resolve_entity(entry: &EntityEntry, default_suffix: &str) -> Result<EntityMapping, ConfigError> {
    let entity_key = given(&entry.entity)
        .ok_or(ConfigError::MissingElement("entities[].entity"))?
        .to_string();

    let table = entry.table.clone().unwrap_or_default();
    let history = entry.history_table.clone().unwrap_or_default();
    let suffix = given(&entry.history_table_suffix).unwrap_or(default_suffix);

    // Table names first: the id-column defaults are derived from them.
    let source_table = given(&table.name)
        .map(str::to_string)
        .unwrap_or_else(|| to_snake_case(simple_name(&entity_key)));
    let history_table = given(&history.name)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{source_table}{suffix}"));

    let source_id_column = given(&table.id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{source_table}{ID_COLUMN_SUFFIX}"));
    let history_id_column = given(&history.id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{history_table}{ID_COLUMN_SUFFIX}"));

    if source_table.is_empty() {
        return Err(ConfigError::InvalidEntity {
            entity: entity_key,
            reason: "no source table name can be derived".to_string(),
        });
    }
    if history_table == source_table {
        return Err(ConfigError::InvalidEntity {
            entity: entity_key,
            reason: format!("history table and source table are both {source_table}"),
        });
    }

    let mut property_columns = BTreeMap::new();
    for property in &entry.properties {
        let name = given(&property.property)
            .ok_or(ConfigError::MissingElement("properties[].property"))?;
        let columns = PropertyColumns {
            source_column: given(&property.source_column)
                .map_or_else(|| property_column(name), str::to_string),
            history_column: given(&property.history_column)
                .map_or_else(|| property_column(name), str::to_string),
        };
        if property_columns.insert(name.to_string(), columns).is_some() {
            return Err(ConfigError::DuplicateProperty {
                entity: entity_key,
                property: name.to_string(),
            });
        }
    }

    Ok(EntityMapping {
        entity_key,
        source_table,
        source_id_column,
        history_table,
        history_id_column,
        property_columns,
    })
}

/// A present, non-blank value. Blank strings count as omitted.
fn given(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    const MINIMAL: &str = "
source_data_source: app
history_data_source: audit
entities:
  - entity: com.example.Invoice
";

    // -----------------------------------------------------------------------
    // Defaults
    // -----------------------------------------------------------------------

    #[test]
    fn defaults_from_entity_key() {
        let config = HistoryConfig::from_yaml_str(MINIMAL).unwrap();
        let m = config.get("com.example.Invoice").unwrap();
        assert_eq!(m.source_table, "invoice");
        assert_eq!(m.source_id_column, "invoice_id");
        assert_eq!(m.history_table, "invoice_history");
        assert_eq!(m.history_id_column, "invoice_history_id");
        assert!(m.property_columns.is_empty());
    }

    #[test]
    fn data_sources_pass_through() {
        let config = HistoryConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.source_data_source, "app");
        assert_eq!(config.history_data_source, "audit");
    }

    #[test]
    fn camel_case_entity_name() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities:
  - entity: shop.OrderLineItem
";
        let config = HistoryConfig::from_yaml_str(yaml).unwrap();
        let m = config.get("shop.OrderLineItem").unwrap();
        assert_eq!(m.source_table, "order_line_item");
        assert_eq!(m.history_id_column, "order_line_item_history_id");
    }

    #[test]
    fn id_defaults_follow_overridden_table_names() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities:
  - entity: com.example.Invoice
    table: { name: inv }
    history_table: { name: inv_log }
";
        let config = HistoryConfig::from_yaml_str(yaml).unwrap();
        let m = config.get("com.example.Invoice").unwrap();
        assert_eq!(m.source_id_column, "inv_id");
        assert_eq!(m.history_table, "inv_log");
        assert_eq!(m.history_id_column, "inv_log_id");
    }

    #[test]
    fn history_table_defaults_from_overridden_source_table() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities:
  - entity: com.example.Invoice
    table: { name: billing_invoice, id: id }
";
        let config = HistoryConfig::from_yaml_str(yaml).unwrap();
        let m = config.get("com.example.Invoice").unwrap();
        assert_eq!(m.source_id_column, "id");
        assert_eq!(m.history_table, "billing_invoice_history");
        assert_eq!(m.history_id_column, "billing_invoice_history_id");
    }

    #[test]
    fn suffix_precedence() {
        let yaml = "
source_data_source: app
history_data_source: audit
history_table_suffix: _audit
entities:
  - entity: a.Customer
  - entity: a.Order
    history_table_suffix: _log
";
        let config = HistoryConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.get("a.Customer").unwrap().history_table, "customer_audit");
        assert_eq!(config.get("a.Order").unwrap().history_table, "order_log");
    }

    #[test]
    fn blank_values_count_as_omitted() {
        let yaml = "
source_data_source: app
history_data_source: audit
history_table_suffix: ''
entities:
  - entity: a.Customer
    table: { name: '', id: '  ' }
";
        let config = HistoryConfig::from_yaml_str(yaml).unwrap();
        let m = config.get("a.Customer").unwrap();
        assert_eq!(m.source_table, "customer");
        assert_eq!(m.source_id_column, "customer_id");
        assert_eq!(m.history_table, "customer_history");
    }

    #[test]
    fn property_columns() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities:
  - entity: a.Invoice
    properties:
      - property: lineItem.unitPrice
      - property: total
        source_column: grand_total
      - property: customerName
        history_column: customer
";
        let config = HistoryConfig::from_yaml_str(yaml).unwrap();
        let m = config.get("a.Invoice").unwrap();

        let line = &m.property_columns["lineItem.unitPrice"];
        assert_eq!(line.source_column, "line_item_unit_price");
        assert_eq!(line.history_column, "line_item_unit_price");

        assert_eq!(m.source_column("total"), "grand_total");
        assert_eq!(m.history_column("total"), "total");
        assert_eq!(m.source_column("customerName"), "customer_name");
        assert_eq!(m.history_column("customerName"), "customer");
        assert_eq!(m.source_column("unmapped"), "unmapped");
    }

    // -----------------------------------------------------------------------
    // Structural errors
    // -----------------------------------------------------------------------

    #[test]
    fn missing_data_source_is_rejected() {
        let yaml = "
history_data_source: audit
entities:
  - entity: a.Customer
";
        assert_matches!(
            HistoryConfig::from_yaml_str(yaml),
            Err(ConfigError::MissingElement("source_data_source"))
        );
    }

    #[test]
    fn missing_entities_is_rejected() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities: []
";
        assert_matches!(
            HistoryConfig::from_yaml_str(yaml),
            Err(ConfigError::MissingElement("entities"))
        );
    }

    #[test]
    fn duplicate_entity_is_rejected() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities:
  - entity: a.Customer
  - entity: a.Customer
    table: { name: other }
";
        assert_matches!(
            HistoryConfig::from_yaml_str(yaml),
            Err(ConfigError::DuplicateEntity(key)) if key == "a.Customer"
        );
    }

    #[test]
    fn duplicate_property_is_rejected() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities:
  - entity: a.Customer
    properties:
      - property: name
      - property: name
";
        assert_matches!(
            HistoryConfig::from_yaml_str(yaml),
            Err(ConfigError::DuplicateProperty { .. })
        );
    }

    #[test]
    fn unknown_field_is_malformed_nesting() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities:
  - entity: a.Customer
    tabel: { name: customers }
";
        assert_matches!(HistoryConfig::from_yaml_str(yaml), Err(ConfigError::Yaml(_)));
    }

    #[test]
    fn entity_without_simple_name_is_rejected() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities:
  - entity: 'com.example.'
";
        assert_matches!(
            HistoryConfig::from_yaml_str(yaml),
            Err(ConfigError::InvalidEntity { .. })
        );
    }

    #[test]
    fn history_table_equal_to_source_is_rejected() {
        let yaml = "
source_data_source: app
history_data_source: audit
entities:
  - entity: a.Customer
    history_table: { name: customer }
";
        assert_matches!(
            HistoryConfig::from_yaml_str(yaml),
            Err(ConfigError::InvalidEntity { .. })
        );
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    #[test]
    fn json_document() {
        let json = r#"{
            "source_data_source": "app",
            "history_data_source": "audit",
            "entities": [{ "entity": "com.example.Invoice" }]
        }"#;
        let config = resolve(&MappingDocument::from_json_str(json).unwrap()).unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(
            config.get("com.example.Invoice").unwrap().history_table,
            "invoice_history"
        );
    }

    #[test]
    fn load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = HistoryConfig::load(file.path()).unwrap();
        assert!(config.get("com.example.Invoice").is_some());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".xml").tempfile().unwrap();
        file.write_all(b"<mappings/>").unwrap();

        assert_matches!(
            HistoryConfig::load(file.path()),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "xml"
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        assert_matches!(
            HistoryConfig::load("/nonexistent/histable/mappings.yaml"),
            Err(ConfigError::Io { .. })
        );
    }
}
