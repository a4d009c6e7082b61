//! Schedule events
//!
//! Events reference rooms, hallways and tags by name, and their content group
//! either directly or through an item's origin-system source id. An item
//! source id must identify exactly one known content item; anything else
//! aborts the batch with the full candidate list.

use super::{
    hallways::resolve_hallway, identity, match_id, match_provenance, or_matched, require,
    resolve_originating_data, rooms::convert_room_name, tags::convert_tag_names,
};
use crate::error::{ItemCandidate, ReconcileError, ReconcileResult};
use crate::reconcile::field::{FieldMerge, Merger};
use crate::reconcile::lists::{fold_sources, merge_lists, record_merge};
use crate::reconcile::matching::{
    find_first_match, is_match_id, is_match_string_exact, source_id_tokens, MatchRule,
};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{EventDescriptor, Incoming, IntermediaryEvent, Named, Table};
use tracing::debug;

pub type IncomingEvent = Incoming<IntermediaryEvent, EventDescriptor>;

pub const DEFAULT_ROOM_MODE: &str = "PRERECORDED";

pub const MATCHERS: &[MatchRule<IncomingEvent, EventDescriptor>] = &[
    MatchRule {
        name: "id",
        matches: match_id,
    },
    MatchRule {
        name: "provenance",
        matches: match_provenance,
    },
    MatchRule {
        name: "same_slot",
        matches: match_same_slot,
    },
];

/// Same room, same start time, same name
fn match_same_slot(session: &ReconcileSession, existing: &EventDescriptor, candidate: &IncomingEvent) -> bool {
    let (room_id, start_time) = match candidate {
        Incoming::Imported(record) => {
            let room_id = record.room_id.clone().or_else(|| {
                let name = record.room_name.as_deref()?;
                session
                    .known()
                    .rooms
                    .iter()
                    .find(|room| is_match_string_exact(Some(&room.name), Some(name)))
                    .map(|room| room.id.clone())
            });
            (room_id, record.start_time)
        }
        Incoming::Canonical(event) => (Some(event.room_id.clone()), Some(event.start_time)),
    };

    start_time == Some(existing.start_time)
        && is_match_id(session, Table::Room, Some(&existing.room_id), room_id.as_deref())
        && is_match_string_exact(existing.name(), candidate.name())
}

pub fn find(session: &ReconcileSession, items: &[EventDescriptor], candidate: &IncomingEvent) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

/// Content group owning the single known item whose provenance lies within
/// `source_id`'s tokens
pub fn resolve_item_source(
    session: &ReconcileSession,
    source_id: &str,
    event: &IntermediaryEvent,
) -> ReconcileResult<String> {
    let claimed = source_id_tokens(source_id);
    let mut candidates = Vec::new();

    for group in &session.known().content_groups {
        for item in &group.items {
            let Some(od) = item
                .originating_data_id
                .as_deref()
                .and_then(|id| session.find_originating_data(id))
            else {
                continue;
            };
            let tokens = source_id_tokens(&od.source_id);
            if !tokens.is_empty() && tokens.is_subset(&claimed) {
                candidates.push(ItemCandidate {
                    content_group_id: group.id.clone(),
                    item_id: item.id.clone(),
                    source_id: od.source_id.clone(),
                });
            }
        }
    }

    match candidates.len() {
        1 => {
            debug!(source_id = %source_id, item = %candidates[0].item_id, "Resolved event item source");
            Ok(candidates.remove(0).content_group_id)
        }
        0 => Err(ReconcileError::UnresolvedItemSource {
            source_id: source_id.to_string(),
            event: snapshot(event)?,
        }),
        _ => Err(ReconcileError::AmbiguousItemSource {
            source_id: source_id.to_string(),
            event: snapshot(event)?,
            candidates,
        }),
    }
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingEvent,
    matched: Option<&EventDescriptor>,
) -> ReconcileResult<EventDescriptor> {
    let record = match incoming {
        Incoming::Canonical(mut descriptor) => {
            let registry = session.registry();
            descriptor.room_id = registry.resolve(Table::Room, &descriptor.room_id).to_string();
            descriptor.content_group_id = descriptor
                .content_group_id
                .map(|id| registry.resolve(Table::ContentGroup, &id).to_string());
            descriptor.hallway_id = descriptor
                .hallway_id
                .map(|id| registry.resolve(Table::Hallway, &id).to_string());
            descriptor.tag_ids = descriptor
                .tag_ids
                .iter()
                .map(|id| registry.resolve(Table::Tag, id).to_string())
                .collect();
            descriptor.originating_data_id =
                resolve_originating_data(session, Table::Event, descriptor.originating_data_id, None);
            return Ok(descriptor);
        }
        Incoming::Imported(record) => record,
    };

    let room_id = match (&record.room_id, &record.room_name) {
        (Some(id), _) => Some(session.registry().resolve(Table::Room, id).to_string()),
        (None, Some(name)) => Some(convert_room_name(session, Table::Event, name, &record)?),
        (None, None) => None,
    };
    let room_id = require(Table::Event, "roomId", room_id, &record)?;
    let name = require(Table::Event, "name", record.name.clone(), &record)?;
    let start_time = require(Table::Event, "startTime", record.start_time, &record)?;
    let duration_seconds = require(Table::Event, "durationSeconds", record.duration_seconds, &record)?;

    let content_group_id = match (&record.content_group_id, &record.item_source_id) {
        (Some(id), _) => Some(session.registry().resolve(Table::ContentGroup, id).to_string()),
        (None, Some(source_id)) => Some(resolve_item_source(session, source_id, &record)?),
        (None, None) => None,
    };
    let hallway_id = resolve_hallway(
        session,
        Table::Event,
        record.hallway_id.clone(),
        record.hallway_name.as_deref(),
        &record,
    )?;
    let tag_ids = convert_tag_names(
        session,
        Table::Event,
        record.tag_ids.clone(),
        record.tag_names.as_deref(),
        &record,
    )?;
    let originating_data_id = resolve_originating_data(
        session,
        Table::Event,
        record.originating_data_id.clone(),
        record.originating_data_source_id.as_deref(),
    );
    let (id, is_new) = identity(session, record.id, record.is_new);

    Ok(EventDescriptor {
        id,
        is_new,
        room_id,
        intended_room_mode: or_matched(
            record.intended_room_mode,
            matched,
            |e| e.intended_room_mode.clone(),
            || DEFAULT_ROOM_MODE.to_string(),
        ),
        name,
        start_time,
        duration_seconds,
        content_group_id,
        hallway_id,
        tag_ids,
        originating_data_id,
    })
}

pub fn merge(
    session: &mut ReconcileSession,
    left: EventDescriptor,
    right: EventDescriptor,
) -> ReconcileResult<EventDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::Event, left.is_new, right.is_new);

    let merged = EventDescriptor {
        id: fields.identity(&left.id, &right.id)?,
        is_new: fields.is_new(),
        room_id: fields.required("roomId", left.room_id, right.room_id)?,
        intended_room_mode: fields.required(
            "intendedRoomMode",
            left.intended_room_mode,
            right.intended_room_mode,
        )?,
        name: fields.required("name", left.name, right.name)?,
        start_time: fields.required("startTime", left.start_time, right.start_time)?,
        duration_seconds: fields.required(
            "durationSeconds",
            left.duration_seconds,
            right.duration_seconds,
        )?,
        content_group_id: fields.optional(
            "contentGroupId",
            left.content_group_id,
            right.content_group_id,
        )?,
        hallway_id: fields.optional("hallwayId", left.hallway_id, right.hallway_id)?,
        tag_ids: fields.required_with("tagIds", left.tag_ids, right.tag_ids, Merger::union())?,
        originating_data_id: fields.optional(
            "originatingDataId",
            left.originating_data_id,
            right.originating_data_id,
        )?,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}

pub fn reconcile_events(
    session: &mut ReconcileSession,
    existing: Vec<EventDescriptor>,
    sources: Vec<Vec<IntermediaryEvent>>,
) -> ReconcileResult<Vec<EventDescriptor>> {
    fold_sources(session, existing, sources, |session, running, incoming| {
        let incoming = incoming.into_iter().map(Incoming::Imported).collect();
        merge_lists(session, Table::Event, running, incoming, find, convert, merge)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::matching::rule_names;
    use crate::types::{
        ContentGroupDescriptor, ItemDescriptor, OriginatingDataDescriptor, RoomDescriptor,
    };
    use chrono::{TimeZone, Utc};
    use conflux_common::MatchingConfig;
    use serde_json::Value;
    use std::collections::BTreeSet;

    fn od(id: &str, source_id: &str) -> OriginatingDataDescriptor {
        OriginatingDataDescriptor {
            id: id.into(),
            is_new: false,
            source_id: source_id.into(),
            data: vec![],
        }
    }

    fn item(id: &str, od_id: &str) -> ItemDescriptor {
        ItemDescriptor {
            id: id.into(),
            is_new: false,
            name: "Abstract".into(),
            content_type_name: "ABSTRACT".into(),
            data: Value::Null,
            layout_data: None,
            is_hidden: false,
            required_content_id: None,
            originating_data_id: Some(od_id.into()),
        }
    }

    fn group(id: &str, items: Vec<ItemDescriptor>) -> ContentGroupDescriptor {
        ContentGroupDescriptor {
            id: id.into(),
            is_new: false,
            title: format!("Group {}", id),
            short_title: None,
            content_group_type_name: "PAPER".into(),
            originating_data_id: None,
            items,
            required_items: vec![],
            people: vec![],
            hallways: vec![],
            tag_ids: BTreeSet::new(),
        }
    }

    fn session() -> ReconcileSession {
        let mut session = ReconcileSession::new(MatchingConfig::default());
        let known = session.known_mut();
        known.originating_datas = vec![od("OD1", "src-77"), od("OD2", "src-78")];
        known.rooms = vec![RoomDescriptor {
            id: "R1".into(),
            is_new: false,
            name: "Main Hall".into(),
            capacity: None,
            priority: 0,
            originating_data_id: None,
        }];
        known.content_groups = vec![
            group("G1", vec![item("I1", "OD1")]),
            group("G2", vec![item("I2", "OD2")]),
        ];
        session
    }

    fn imported_event() -> IntermediaryEvent {
        IntermediaryEvent {
            name: Some("Opening".into()),
            room_name: Some("main hall".into()),
            start_time: Some(Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()),
            duration_seconds: Some(3600),
            item_source_id: Some("src-77".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_matcher_order() {
        assert_eq!(rule_names(MATCHERS), ["id", "provenance", "same_slot"]);
    }

    #[test]
    fn test_item_source_links_content_group() {
        let mut session = session();
        let event = convert(&mut session, Incoming::Imported(imported_event()), None).unwrap();

        assert_eq!(event.room_id, "R1");
        assert_eq!(event.content_group_id.as_deref(), Some("G1"));
        assert_eq!(event.intended_room_mode, DEFAULT_ROOM_MODE);
        assert!(event.is_new);
    }

    #[test]
    fn test_ambiguous_item_source_lists_candidates() {
        let mut session = session();
        session.known_mut().originating_datas.push(od("OD3", "src-77"));
        session.known_mut().content_groups[1].items.push(item("I3", "OD3"));

        let err = convert(&mut session, Incoming::Imported(imported_event()), None).unwrap_err();
        match err {
            ReconcileError::AmbiguousItemSource { candidates, .. } => {
                let items: Vec<_> = candidates.iter().map(|c| c.item_id.as_str()).collect();
                assert_eq!(items, ["I1", "I3"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unmatched_item_source_fails() {
        let mut session = session();
        let event = IntermediaryEvent {
            item_source_id: Some("src-99".into()),
            ..imported_event()
        };
        let err = convert(&mut session, Incoming::Imported(event), None).unwrap_err();
        assert!(matches!(err, ReconcileError::UnresolvedItemSource { .. }));
    }

    #[test]
    fn test_unknown_room_name_fails() {
        let mut session = session();
        let event = IntermediaryEvent {
            room_name: Some("Annex".into()),
            ..imported_event()
        };
        let err = convert(&mut session, Incoming::Imported(event), None).unwrap_err();
        assert!(matches!(err, ReconcileError::UnresolvedReference { kind: "room", .. }));
    }

    #[test]
    fn test_same_slot_matches_existing_event() {
        let mut session = session();
        let existing = vec![EventDescriptor {
            id: "E1".into(),
            is_new: false,
            room_id: "R1".into(),
            intended_room_mode: "LIVE".into(),
            name: "opening".into(),
            start_time: Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
            duration_seconds: 1800,
            content_group_id: None,
            hallway_id: None,
            tag_ids: BTreeSet::new(),
            originating_data_id: None,
        }];

        let result = reconcile_events(&mut session, existing, vec![vec![imported_event()]]).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "E1");
        assert_eq!(result[0].duration_seconds, 3600);
        assert_eq!(result[0].content_group_id.as_deref(), Some("G1"));
    }
}
