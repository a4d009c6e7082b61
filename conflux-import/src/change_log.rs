//! Append-only audit trail of reconciliation decisions
//!
//! Entries are recorded in execution order. Given identical inputs, identical
//! registry state and a deterministic id generator, the log is reproducible
//! entry for entry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of decision recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Insert,
    Update,
    Merge,
    Delete,
}

/// One audit-log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSummary {
    /// Table, or `Table.field` for field-level decisions
    pub location: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub description: String,
    /// Inputs the decision was made from
    pub import_data: Vec<Value>,
    /// Value produced by the decision
    pub new_data: Value,
}

/// Ordered change log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeLog {
    entries: Vec<ChangeSummary>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry built from its parts
    pub fn record(
        &mut self,
        location: impl Into<String>,
        change_type: ChangeType,
        description: impl Into<String>,
        import_data: Vec<Value>,
        new_data: Value,
    ) {
        self.entries.push(ChangeSummary {
            location: location.into(),
            change_type,
            description: description.into(),
            import_data,
            new_data,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ChangeSummary] {
        &self.entries
    }

    /// Entries appended after `mark` (a previous [`ChangeLog::len`])
    pub fn since(&self, mark: usize) -> &[ChangeSummary] {
        &self.entries[mark.min(self.entries.len())..]
    }

    /// Number of entries of the given kind
    pub fn count(&self, change_type: ChangeType) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.change_type == change_type)
            .count()
    }

    pub fn into_entries(self) -> Vec<ChangeSummary> {
        self.entries
    }
}
