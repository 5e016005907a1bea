//! What callers hand in, and what gets written, per audited change.

use crate::action::Action;
use crate::types::Timestamp;
use crate::value::SqlValue;

/// A record whose changes are audited.
///
/// Replaces accessor lookup by name: the record states which mapping entry it
/// belongs to and what its source-table identifier is.
pub trait IdentifiableRecord {
    /// Entity key of the record's type in the mapping document.
    fn entity_key(&self) -> &str;

    /// Value of the source id column for this record.
    fn record_id(&self) -> SqlValue;
}

/// One history row before it is bound to an `INSERT`.
///
/// `source_values` are in source column order; the audit values follow them
/// in the order `action`, `action_by`, `action_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRow {
    pub source_values: Vec<SqlValue>,
    pub action: Action,
    pub actor_id: String,
    pub timestamp: Timestamp,
}

impl AuditRow {
    pub fn new(
        source_values: Vec<SqlValue>,
        action: Action,
        actor_id: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            source_values,
            action,
            actor_id: actor_id.into(),
            timestamp,
        }
    }

    /// Positional bind parameters, matching the generated `INSERT` column list.
    pub fn into_params(self) -> impl Iterator<Item = SqlValue> {
        self.source_values.into_iter().chain([
            SqlValue::Text(self.action.as_str().to_string()),
            SqlValue::Text(self.actor_id),
            SqlValue::Timestamp(self.timestamp),
        ])
    }
}
