//! Hallways a content group is exhibited in

use super::{hallways::resolve_hallway, identity, match_id, require};
use crate::error::ReconcileResult;
use crate::reconcile::field::FieldMerge;
use crate::reconcile::lists::record_merge;
use crate::reconcile::matching::{find_first_match, is_match_id, is_match_string_exact, MatchRule};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{GroupHallwayDescriptor, Incoming, IntermediaryGroupHallway, Table};

pub type IncomingGroupHallway = Incoming<IntermediaryGroupHallway, GroupHallwayDescriptor>;

pub const MATCHERS: &[MatchRule<IncomingGroupHallway, GroupHallwayDescriptor>] = &[
    MatchRule {
        name: "id",
        matches: match_id,
    },
    MatchRule {
        name: "hallway_id",
        matches: match_hallway_id,
    },
];

/// Same hallway, directly or through absorption
///
/// An imported link naming its hallway is compared after name resolution.
fn match_hallway_id(
    session: &ReconcileSession,
    existing: &GroupHallwayDescriptor,
    candidate: &IncomingGroupHallway,
) -> bool {
    let hallway_id = match candidate {
        Incoming::Imported(record) => match (&record.hallway_id, &record.hallway_name) {
            (Some(id), _) => Some(id.clone()),
            (None, Some(name)) => session
                .known()
                .hallways
                .iter()
                .find(|hallway| is_match_string_exact(Some(&hallway.name), Some(name)))
                .map(|hallway| hallway.id.clone()),
            (None, None) => None,
        },
        Incoming::Canonical(link) => Some(link.hallway_id.clone()),
    };
    is_match_id(
        session,
        Table::Hallway,
        Some(&existing.hallway_id),
        hallway_id.as_deref(),
    )
}

pub fn find(
    session: &ReconcileSession,
    items: &[GroupHallwayDescriptor],
    candidate: &IncomingGroupHallway,
) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingGroupHallway,
    _matched: Option<&GroupHallwayDescriptor>,
) -> ReconcileResult<GroupHallwayDescriptor> {
    match incoming {
        Incoming::Canonical(mut descriptor) => {
            descriptor.hallway_id = session
                .registry()
                .resolve(Table::Hallway, &descriptor.hallway_id)
                .to_string();
            Ok(descriptor)
        }
        Incoming::Imported(record) => {
            let hallway_id = resolve_hallway(
                session,
                Table::ContentGroupHallway,
                record.hallway_id.clone(),
                record.hallway_name.as_deref(),
                &record,
            )?;
            let hallway_id = require(Table::ContentGroupHallway, "hallwayId", hallway_id, &record)?;
            let (id, is_new) = identity(session, record.id, record.is_new);
            Ok(GroupHallwayDescriptor {
                id,
                is_new,
                hallway_id,
                priority: record.priority,
                layout: record.layout,
            })
        }
    }
}

pub fn merge(
    session: &mut ReconcileSession,
    left: GroupHallwayDescriptor,
    right: GroupHallwayDescriptor,
) -> ReconcileResult<GroupHallwayDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::ContentGroupHallway, left.is_new, right.is_new);

    let merged = GroupHallwayDescriptor {
        id: fields.identity(&left.id, &right.id)?,
        is_new: fields.is_new(),
        hallway_id: fields.required("hallwayId", left.hallway_id, right.hallway_id)?,
        priority: fields.optional("priority", left.priority, right.priority)?,
        layout: fields.optional("layout", left.layout, right.layout)?,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}
