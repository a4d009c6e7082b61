//! Tags
//!
//! Tags are addressed by name from other records; [`convert_tag_name`] is the
//! only way a name becomes an id, and an unknown name aborts the batch.

use super::{
    identity, match_exact_name, match_fuzzy_name, match_id, match_provenance, or_matched,
    require, resolve_name, resolve_originating_data,
};
use crate::error::ReconcileResult;
use crate::reconcile::field::FieldMerge;
use crate::reconcile::lists::{fold_sources, merge_lists, record_merge};
use crate::reconcile::matching::{find_first_match, MatchRule};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{Incoming, IntermediaryTag, Table, TagDescriptor};
use serde::Serialize;
use std::collections::BTreeSet;

pub type IncomingTag = Incoming<IntermediaryTag, TagDescriptor>;

/// Colour given to imported tags that carry none
pub const DEFAULT_COLOUR: &str = "rgba(0,0,0,0)";

pub const MATCHERS: &[MatchRule<IncomingTag, TagDescriptor>] = &[
    MatchRule {
        name: "id",
        matches: match_id,
    },
    MatchRule {
        name: "provenance",
        matches: match_provenance,
    },
    MatchRule {
        name: "exact_name",
        matches: match_exact_name,
    },
    MatchRule {
        name: "fuzzy_name",
        matches: match_fuzzy_name,
    },
];

pub fn find(session: &ReconcileSession, items: &[TagDescriptor], candidate: &IncomingTag) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingTag,
    matched: Option<&TagDescriptor>,
) -> ReconcileResult<TagDescriptor> {
    match incoming {
        Incoming::Canonical(mut descriptor) => {
            descriptor.originating_data_id =
                resolve_originating_data(session, Table::Tag, descriptor.originating_data_id, None);
            Ok(descriptor)
        }
        Incoming::Imported(record) => {
            let name = require(Table::Tag, "name", record.name.clone(), &record)?;
            let originating_data_id = resolve_originating_data(
                session,
                Table::Tag,
                record.originating_data_id.clone(),
                record.originating_data_source_id.as_deref(),
            );
            let (id, is_new) = identity(session, record.id, record.is_new);
            Ok(TagDescriptor {
                id,
                is_new,
                name,
                colour: or_matched(record.colour, matched, |t| t.colour.clone(), || {
                    DEFAULT_COLOUR.to_string()
                }),
                originating_data_id,
            })
        }
    }
}

pub fn merge(
    session: &mut ReconcileSession,
    left: TagDescriptor,
    right: TagDescriptor,
) -> ReconcileResult<TagDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::Tag, left.is_new, right.is_new);

    let merged = TagDescriptor {
        id: fields.identity(&left.id, &right.id)?,
        is_new: fields.is_new(),
        name: fields.required("name", left.name, right.name)?,
        colour: fields.required("colour", left.colour, right.colour)?,
        originating_data_id: fields.optional(
            "originatingDataId",
            left.originating_data_id,
            right.originating_data_id,
        )?,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}

pub fn reconcile_tags(
    session: &mut ReconcileSession,
    existing: Vec<TagDescriptor>,
    sources: Vec<Vec<IntermediaryTag>>,
) -> ReconcileResult<Vec<TagDescriptor>> {
    fold_sources(session, existing, sources, |session, running, incoming| {
        let incoming = incoming.into_iter().map(Incoming::Imported).collect();
        merge_lists(session, Table::Tag, running, incoming, find, convert, merge)
    })
}

/// Id of the known tag named `name` (case-insensitive)
///
/// # Errors
/// [`ReconcileError::UnresolvedReference`](crate::error::ReconcileError::UnresolvedReference)
/// when no known tag carries the name.
pub fn convert_tag_name(
    session: &ReconcileSession,
    table: Table,
    name: &str,
    record: &impl Serialize,
) -> ReconcileResult<String> {
    let tag = resolve_name(&session.known().tags, table, "tag", name, record)?;
    Ok(tag.id.clone())
}

/// Explicit tag ids plus the ids of every named tag
pub fn convert_tag_names(
    session: &ReconcileSession,
    table: Table,
    tag_ids: Option<BTreeSet<String>>,
    tag_names: Option<&[String]>,
    record: &impl Serialize,
) -> ReconcileResult<BTreeSet<String>> {
    let mut ids: BTreeSet<String> = tag_ids
        .unwrap_or_default()
        .into_iter()
        .map(|id| session.registry().resolve(Table::Tag, &id).to_string())
        .collect();
    for name in tag_names.unwrap_or_default() {
        ids.insert(convert_tag_name(session, table, name, record)?);
    }
    Ok(ids)
}
