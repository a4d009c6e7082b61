//! Error types for conflux-import
//!
//! Every error aborts the whole batch: no merged collections are returned
//! alongside an error.

use crate::types::Table;
use serde_json::Value;
use thiserror::Error;

/// Reconciliation error
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A name- or id-based reference could not be resolved against known records
    #[error("Unresolved {kind} reference '{reference}' in {table} record: {record}")]
    UnresolvedReference {
        table: Table,
        kind: &'static str,
        reference: String,
        record: Value,
    },

    /// An event's item source id matched no known content item
    #[error("Event item source id '{source_id}' matched no content item: {event}")]
    UnresolvedItemSource { source_id: String, event: Value },

    /// An event's item source id matched more than one content item
    #[error(
        "Event item source id '{source_id}' matched {} content items {:?}; resubmit with an explicit content group: {event}",
        candidates.len(),
        candidates
    )]
    AmbiguousItemSource {
        source_id: String,
        event: Value,
        candidates: Vec<ItemCandidate>,
    },

    /// Neither side of an id merge carried an identifier
    #[error("Cannot merge {table} identifiers: neither side carries an id")]
    MissingIdentifier { table: Table },

    /// An imported record lacks a field required by its canonical shape
    #[error("{table} record is missing required field '{field}': {record}")]
    MissingField {
        table: Table,
        field: &'static str,
        record: Value,
    },

    /// Record could not be rendered into the change log
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// conflux-common error
    #[error("Common error: {0}")]
    Common(#[from] conflux_common::Error),
}

/// Content item whose provenance claimed an event's source id
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCandidate {
    pub content_group_id: String,
    pub item_id: String,
    pub source_id: String,
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
