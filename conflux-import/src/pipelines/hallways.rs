//! Hallways

use super::{
    identity, match_exact_name, match_fuzzy_name, match_id, match_provenance, or_matched,
    require, resolve_name, resolve_originating_data,
};
use crate::error::ReconcileResult;
use crate::reconcile::field::FieldMerge;
use crate::reconcile::lists::{fold_sources, merge_lists, record_merge};
use crate::reconcile::matching::{find_first_match, MatchRule};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{HallwayDescriptor, Incoming, IntermediaryHallway, Table};
use serde::Serialize;

pub type IncomingHallway = Incoming<IntermediaryHallway, HallwayDescriptor>;

pub const DEFAULT_COLOUR: &str = "rgba(0,0,0,0)";

pub const MATCHERS: &[MatchRule<IncomingHallway, HallwayDescriptor>] = &[
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

pub fn find(
    session: &ReconcileSession,
    items: &[HallwayDescriptor],
    candidate: &IncomingHallway,
) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingHallway,
    matched: Option<&HallwayDescriptor>,
) -> ReconcileResult<HallwayDescriptor> {
    match incoming {
        Incoming::Canonical(mut descriptor) => {
            descriptor.originating_data_id = resolve_originating_data(
                session,
                Table::Hallway,
                descriptor.originating_data_id,
                None,
            );
            Ok(descriptor)
        }
        Incoming::Imported(record) => {
            let name = require(Table::Hallway, "name", record.name.clone(), &record)?;
            let originating_data_id = resolve_originating_data(
                session,
                Table::Hallway,
                record.originating_data_id.clone(),
                record.originating_data_source_id.as_deref(),
            );
            let (id, is_new) = identity(session, record.id, record.is_new);
            Ok(HallwayDescriptor {
                id,
                is_new,
                name,
                colour: or_matched(record.colour, matched, |h| h.colour.clone(), || {
                    DEFAULT_COLOUR.to_string()
                }),
                priority: or_matched(record.priority, matched, |h| h.priority, || 0),
                originating_data_id,
            })
        }
    }
}

pub fn merge(
    session: &mut ReconcileSession,
    left: HallwayDescriptor,
    right: HallwayDescriptor,
) -> ReconcileResult<HallwayDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::Hallway, left.is_new, right.is_new);

    let merged = HallwayDescriptor {
        id: fields.identity(&left.id, &right.id)?,
        is_new: fields.is_new(),
        name: fields.required("name", left.name, right.name)?,
        colour: fields.required("colour", left.colour, right.colour)?,
        priority: fields.required("priority", left.priority, right.priority)?,
        originating_data_id: fields.optional(
            "originatingDataId",
            left.originating_data_id,
            right.originating_data_id,
        )?,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}

pub fn reconcile_hallways(
    session: &mut ReconcileSession,
    existing: Vec<HallwayDescriptor>,
    sources: Vec<Vec<IntermediaryHallway>>,
) -> ReconcileResult<Vec<HallwayDescriptor>> {
    fold_sources(session, existing, sources, |session, running, incoming| {
        let incoming = incoming.into_iter().map(Incoming::Imported).collect();
        merge_lists(session, Table::Hallway, running, incoming, find, convert, merge)
    })
}

/// Id of the known hallway named `name`; unknown names abort the batch
pub fn convert_hallway_name(
    session: &ReconcileSession,
    table: Table,
    name: &str,
    record: &impl Serialize,
) -> ReconcileResult<String> {
    let hallway = resolve_name(&session.known().hallways, table, "hallway", name, record)?;
    Ok(hallway.id.clone())
}

/// Hallway id from an explicit id (absorption-aware) or a name
pub fn resolve_hallway(
    session: &ReconcileSession,
    table: Table,
    hallway_id: Option<String>,
    hallway_name: Option<&str>,
    record: &impl Serialize,
) -> ReconcileResult<Option<String>> {
    if let Some(id) = hallway_id {
        return Ok(Some(session.registry().resolve(Table::Hallway, &id).to_string()));
    }
    hallway_name
        .map(|name| convert_hallway_name(session, table, name, record))
        .transpose()
}
