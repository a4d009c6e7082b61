//! List Reconciler
//!
//! The generic match → merge/insert loop every entity pipeline runs on.
//!
//! For each incoming item, in order:
//! 1. `find` runs against the running result (items inserted or updated
//!    earlier in the same pass are visible)
//! 2. Hit at index `i`: `merge(result[i], convert(item, Some(&result[i])))`
//!    replaces `result[i]` in place, followed by an UPDATE entry
//! 3. Miss: `convert(item, None)` is appended, with an INSERT entry
//!
//! `convert` fills fields the import omitted from the matched record, and
//! only falls back to defaults when there is none.
//!
//! Nothing is ever removed.

use crate::change_log::ChangeType;
use crate::error::ReconcileResult;
use crate::session::{snapshot, ReconcileSession};
use crate::types::{Descriptor, Table};
use serde::Serialize;
use tracing::debug;

/// Reconcile `incoming` into `existing`
pub fn merge_lists<T, D, F, C, M>(
    session: &mut ReconcileSession,
    table: Table,
    existing: Vec<D>,
    incoming: Vec<T>,
    find: F,
    convert: C,
    merge: M,
) -> ReconcileResult<Vec<D>>
where
    T: Serialize,
    D: Descriptor,
    F: Fn(&ReconcileSession, &[D], &T) -> Option<usize>,
    C: Fn(&mut ReconcileSession, T, Option<&D>) -> ReconcileResult<D>,
    M: Fn(&mut ReconcileSession, D, D) -> ReconcileResult<D>,
{
    let mut result = existing;

    for item in incoming {
        match find(&*session, &result, &item) {
            Some(index) => {
                let prior = result[index].clone();
                let converted = convert(session, item, Some(&prior))?;
                let import_data = vec![snapshot(&prior)?, snapshot(&converted)?];
                let merged = merge(session, prior, converted)?;

                debug!(table = %table, index, id = %merged.descriptor_id(), "Matched existing record");
                session.record(
                    table.name(),
                    ChangeType::Update,
                    format!("Updated {} {}", table, merged.descriptor_id()),
                    import_data,
                    snapshot(&merged)?,
                );
                result[index] = merged;
            }
            None => {
                let import_data = vec![snapshot(&item)?];
                let converted = convert(session, item, None)?;

                debug!(table = %table, id = %converted.descriptor_id(), "Inserted new record");
                session.record(
                    table.name(),
                    ChangeType::Insert,
                    format!("Inserted {} {}", table, converted.descriptor_id()),
                    import_data,
                    snapshot(&converted)?,
                );
                result.push(converted);
            }
        }
    }

    Ok(result)
}

/// Fold each source's list into the running result, in order
///
/// Records of a later source can match records an earlier source inserted.
pub fn fold_sources<T, D, S>(
    session: &mut ReconcileSession,
    existing: Vec<D>,
    sources: impl IntoIterator<Item = Vec<T>>,
    mut step: S,
) -> ReconcileResult<Vec<D>>
where
    S: FnMut(&mut ReconcileSession, Vec<D>, Vec<T>) -> ReconcileResult<Vec<D>>,
{
    sources
        .into_iter()
        .try_fold(existing, |running, incoming| step(&mut *session, running, incoming))
}

/// Append the whole-record MERGE entry a pipeline's `merge` ends with
pub fn record_merge<D: Descriptor>(
    session: &mut ReconcileSession,
    import_data: Vec<serde_json::Value>,
    merged: &D,
) -> ReconcileResult<()> {
    session.record(
        D::TABLE.name(),
        ChangeType::Merge,
        format!("Merged {} records into {}", D::TABLE, merged.descriptor_id()),
        import_data,
        snapshot(merged)?,
    );
    Ok(())
}
