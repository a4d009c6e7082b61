//! Entity pipelines
//!
//! One module per entity kind. Each supplies:
//! - `MATCHERS`: the ordered find chain
//! - `find`, `convert`, `merge`: the triple the list reconciler runs
//! - a `reconcile_*` entry folding every import source into the running result
//!
//! Nested collections (a content group's items, a required item's uploaders)
//! are reconciled through their own entity's triple.

pub mod content_groups;
pub mod events;
pub mod group_hallways;
pub mod group_people;
pub mod hallways;
pub mod items;
pub mod originating_data;
pub mod people;
pub mod required_items;
pub mod rooms;
pub mod tags;
pub mod uploaders;

use crate::error::{ReconcileError, ReconcileResult};
use crate::reconcile::matching::{
    is_match_id, is_match_originating_data_id, is_match_string_edit_distance,
    is_match_string_exact,
};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{Descriptor, Incoming, Named, Record, Table};
use serde::Serialize;
use tracing::warn;

// ============================================================================
// Shared matchers
// ============================================================================

pub(crate) fn match_id<T: Record, D: Descriptor>(
    session: &ReconcileSession,
    existing: &D,
    candidate: &T,
) -> bool {
    is_match_id(session, D::TABLE, Some(existing.descriptor_id()), candidate.id())
}

pub(crate) fn match_provenance<T: Record, D: Record>(
    session: &ReconcileSession,
    existing: &D,
    candidate: &T,
) -> bool {
    is_match_originating_data_id(session, existing, candidate)
}

pub(crate) fn match_exact_name<T: Named, D: Named>(
    _: &ReconcileSession,
    existing: &D,
    candidate: &T,
) -> bool {
    is_match_string_exact(existing.name(), candidate.name())
}

pub(crate) fn match_fuzzy_name<T: Named, D: Named>(
    session: &ReconcileSession,
    existing: &D,
    candidate: &T,
) -> bool {
    is_match_string_edit_distance(session.config(), existing.name(), candidate.name())
}

// ============================================================================
// Conversion helpers
// ============================================================================

/// Supplied id, or a freshly minted one flagged new
pub(crate) fn identity(session: &mut ReconcileSession, id: Option<String>, is_new: bool) -> (String, bool) {
    match id {
        Some(id) => (id, is_new),
        None => (session.mint_id(), true),
    }
}

/// Imported value, else the matched record's, else `default`
///
/// Defaults only ever reach records that are about to be inserted, so an
/// import that omits a field never overwrites a stored value.
pub(crate) fn or_matched<T, D>(
    value: Option<T>,
    matched: Option<&D>,
    field: impl FnOnce(&D) -> T,
    default: impl FnOnce() -> T,
) -> T {
    value.or_else(|| matched.map(field)).unwrap_or_else(default)
}

/// Convert a parent's imported child records
///
/// Each child is first looked up among the matched parent's children, so it
/// converts against the record it will later merge with.
pub(crate) fn convert_nested<I, D, F, C>(
    session: &mut ReconcileSession,
    records: Vec<I>,
    matched: &[D],
    find: F,
    convert: C,
) -> ReconcileResult<Vec<D>>
where
    F: Fn(&ReconcileSession, &[D], &Incoming<I, D>) -> Option<usize>,
    C: Fn(&mut ReconcileSession, Incoming<I, D>, Option<&D>) -> ReconcileResult<D>,
{
    records
        .into_iter()
        .map(|record| {
            let incoming = Incoming::Imported(record);
            let prior = find(&*session, matched, &incoming).map(|index| &matched[index]);
            convert(&mut *session, incoming, prior)
        })
        .collect()
}

/// Value of a field the canonical shape requires
pub(crate) fn require<T>(
    table: Table,
    field: &'static str,
    value: Option<T>,
    record: &impl Serialize,
) -> ReconcileResult<T> {
    match value {
        Some(value) => Ok(value),
        None => Err(ReconcileError::MissingField {
            table,
            field,
            record: snapshot(record)?,
        }),
    }
}

/// Current provenance id for a record being converted
///
/// A direct id is followed through the registry to the record that absorbed
/// it. A raw source id is looked up by token set; when nothing is known for
/// it the reference is dropped.
pub(crate) fn resolve_originating_data(
    session: &ReconcileSession,
    table: Table,
    originating_data_id: Option<String>,
    originating_data_source_id: Option<&str>,
) -> Option<String> {
    if let Some(id) = originating_data_id {
        return Some(
            session
                .find_originating_data(&id)
                .map(|od| od.id.clone())
                .unwrap_or(id),
        );
    }

    let source_id = originating_data_source_id.filter(|s| !s.is_empty())?;
    match session.find_originating_data_by_source(source_id) {
        Some(od) => Some(od.id.clone()),
        None => {
            warn!(table = %table, source_id = %source_id, "No provenance record for source id; dropping reference");
            None
        }
    }
}

/// Find the single known record whose name equals `name` (case-insensitive)
pub(crate) fn resolve_name<'a, D: Named>(
    known: &'a [D],
    table: Table,
    kind: &'static str,
    name: &str,
    record: &impl Serialize,
) -> ReconcileResult<&'a D> {
    match known
        .iter()
        .find(|candidate| is_match_string_exact(candidate.name(), Some(name)))
    {
        Some(found) => Ok(found),
        None => Err(ReconcileError::UnresolvedReference {
            table,
            kind,
            reference: name.to_string(),
            record: snapshot(record)?,
        }),
    }
}
