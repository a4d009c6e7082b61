//! Rooms

use super::{
    identity, match_exact_name, match_fuzzy_name, match_id, match_provenance, or_matched,
    require, resolve_name, resolve_originating_data,
};
use crate::error::ReconcileResult;
use crate::reconcile::field::FieldMerge;
use crate::reconcile::lists::{fold_sources, merge_lists, record_merge};
use crate::reconcile::matching::{find_first_match, MatchRule};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{Incoming, IntermediaryRoom, RoomDescriptor, Table};
use serde::Serialize;

pub type IncomingRoom = Incoming<IntermediaryRoom, RoomDescriptor>;

pub const MATCHERS: &[MatchRule<IncomingRoom, RoomDescriptor>] = &[
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

pub fn find(session: &ReconcileSession, items: &[RoomDescriptor], candidate: &IncomingRoom) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingRoom,
    matched: Option<&RoomDescriptor>,
) -> ReconcileResult<RoomDescriptor> {
    match incoming {
        Incoming::Canonical(mut descriptor) => {
            descriptor.originating_data_id =
                resolve_originating_data(session, Table::Room, descriptor.originating_data_id, None);
            Ok(descriptor)
        }
        Incoming::Imported(record) => {
            let name = require(Table::Room, "name", record.name.clone(), &record)?;
            let originating_data_id = resolve_originating_data(
                session,
                Table::Room,
                record.originating_data_id.clone(),
                record.originating_data_source_id.as_deref(),
            );
            let (id, is_new) = identity(session, record.id, record.is_new);
            Ok(RoomDescriptor {
                id,
                is_new,
                name,
                capacity: record.capacity,
                priority: or_matched(record.priority, matched, |r| r.priority, || 0),
                originating_data_id,
            })
        }
    }
}

pub fn merge(
    session: &mut ReconcileSession,
    left: RoomDescriptor,
    right: RoomDescriptor,
) -> ReconcileResult<RoomDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::Room, left.is_new, right.is_new);

    let merged = RoomDescriptor {
        id: fields.identity(&left.id, &right.id)?,
        is_new: fields.is_new(),
        name: fields.required("name", left.name, right.name)?,
        capacity: fields.optional("capacity", left.capacity, right.capacity)?,
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

pub fn reconcile_rooms(
    session: &mut ReconcileSession,
    existing: Vec<RoomDescriptor>,
    sources: Vec<Vec<IntermediaryRoom>>,
) -> ReconcileResult<Vec<RoomDescriptor>> {
    fold_sources(session, existing, sources, |session, running, incoming| {
        let incoming = incoming.into_iter().map(Incoming::Imported).collect();
        merge_lists(session, Table::Room, running, incoming, find, convert, merge)
    })
}

/// Id of the known room named `name`; unknown names abort the batch
pub fn convert_room_name(
    session: &ReconcileSession,
    table: Table,
    name: &str,
    record: &impl Serialize,
) -> ReconcileResult<String> {
    let room = resolve_name(&session.known().rooms, table, "room", name, record)?;
    Ok(room.id.clone())
}
