//! The change kind recorded in every history row.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of change a history row records.
///
/// Persisted in the `action` column as its upper-case name (`"UPDATE"`), so
/// adding a variant never renumbers existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Baseline row written by the one-time backfill.
    Initial,
    Insert,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Initial,
        Action::Insert,
        Action::Update,
        Action::Delete,
    ];

    /// Column value for this action.
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Initial => "INITIAL",
            Action::Insert => "INSERT",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    /// Case-insensitive; `update` and `UPDATE` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}
