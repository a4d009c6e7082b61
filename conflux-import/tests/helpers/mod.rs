//! Fixture builders shared by the batch tests

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use conflux_common::MatchingConfig;
use conflux_import::types::*;
use conflux_import::{IdGenerator, ReconcileSession};
use serde_json::json;
use std::collections::BTreeSet;

/// Session minting `new-1`, `new-2`, ...
pub fn session() -> ReconcileSession {
    ReconcileSession::new(MatchingConfig::default()).with_id_generator(IdGenerator::sequential("new-"))
}

pub fn at(timestamp: &str) -> DateTime<Utc> {
    timestamp.parse().unwrap()
}

pub fn od(id: &str, source_id: &str) -> OriginatingDataDescriptor {
    OriginatingDataDescriptor {
        id: id.into(),
        is_new: false,
        source_id: source_id.into(),
        data: vec![json!({ "row": source_id })],
    }
}

pub fn tag(id: &str, name: &str) -> TagDescriptor {
    TagDescriptor {
        id: id.into(),
        is_new: false,
        name: name.into(),
        colour: "#336699".into(),
        originating_data_id: None,
    }
}

pub fn hallway(id: &str, name: &str) -> HallwayDescriptor {
    HallwayDescriptor {
        id: id.into(),
        is_new: false,
        name: name.into(),
        colour: "#ffcc00".into(),
        priority: 1,
        originating_data_id: None,
    }
}

pub fn person(id: &str, name: &str, affiliation: &str) -> PersonDescriptor {
    PersonDescriptor {
        id: id.into(),
        is_new: false,
        name: name.into(),
        affiliation: Some(affiliation.into()),
        email: None,
        originating_data_id: None,
    }
}

pub fn room(id: &str, name: &str) -> RoomDescriptor {
    RoomDescriptor {
        id: id.into(),
        is_new: false,
        name: name.into(),
        capacity: Some(200),
        priority: 0,
        originating_data_id: None,
    }
}

pub fn item(id: &str, name: &str, od_id: &str) -> ItemDescriptor {
    ItemDescriptor {
        id: id.into(),
        is_new: false,
        name: name.into(),
        content_type_name: "ABSTRACT".into(),
        data: json!({ "text": name }),
        layout_data: None,
        is_hidden: false,
        required_content_id: None,
        originating_data_id: Some(od_id.into()),
    }
}

pub fn group(id: &str, title: &str, items: Vec<ItemDescriptor>) -> ContentGroupDescriptor {
    ContentGroupDescriptor {
        id: id.into(),
        is_new: false,
        title: title.into(),
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

pub fn event(id: &str, name: &str, room_id: &str, start: &str) -> EventDescriptor {
    EventDescriptor {
        id: id.into(),
        is_new: false,
        room_id: room_id.into(),
        intended_room_mode: "PRESENTATION".into(),
        name: name.into(),
        start_time: at(start),
        duration_seconds: 1800,
        content_group_id: None,
        hallway_id: None,
        tag_ids: BTreeSet::new(),
        originating_data_id: None,
    }
}

/// A small but fully linked program
pub fn program() -> CanonicalCollections {
    let mut paper = group(
        "G1",
        "Distributed Consensus in Practice",
        vec![item("I1", "Abstract", "OD1")],
    );
    paper.originating_data_id = Some("OD1".into());
    paper.tag_ids = BTreeSet::from(["T1".to_string()]);
    paper.people = vec![GroupPersonDescriptor {
        id: "GP1".into(),
        is_new: false,
        person_id: "P1".into(),
        role_name: "AUTHOR".into(),
        priority: Some(0),
    }];
    paper.hallways = vec![GroupHallwayDescriptor {
        id: "GH1".into(),
        is_new: false,
        hallway_id: "H1".into(),
        priority: None,
        layout: None,
    }];

    let mut talk = event("E1", "Consensus Talk", "R1", "2026-03-02T10:00:00Z");
    talk.content_group_id = Some("G1".into());
    talk.hallway_id = Some("H1".into());
    talk.tag_ids = BTreeSet::from(["T1".to_string()]);

    CanonicalCollections {
        originating_datas: keyed(vec![od("OD1", "src-77")]),
        tags: keyed(vec![tag("T1", "Systems")]),
        hallways: keyed(vec![hallway("H1", "Systems Track")]),
        people: keyed(vec![person("P1", "Alex Kim", "Acme")]),
        content_groups: keyed(vec![paper]),
        rooms: keyed(vec![room("R1", "Main Hall")]),
        events: keyed(vec![talk]),
    }
}

/// Intermediary copies of every canonical record, ids kept and `isNew` unset
pub fn as_import(collections: &CanonicalCollections) -> IntermediaryBatch {
    IntermediaryBatch {
        originating_datas: collections
            .originating_datas
            .values()
            .map(|od| IntermediaryOriginatingData {
                id: Some(od.id.clone()),
                source_id: od.source_id.clone(),
                data: od.data.clone(),
                ..Default::default()
            })
            .collect(),
        tags: collections
            .tags
            .values()
            .map(|t| IntermediaryTag {
                id: Some(t.id.clone()),
                name: Some(t.name.clone()),
                colour: Some(t.colour.clone()),
                originating_data_id: t.originating_data_id.clone(),
                ..Default::default()
            })
            .collect(),
        hallways: collections
            .hallways
            .values()
            .map(|h| IntermediaryHallway {
                id: Some(h.id.clone()),
                name: Some(h.name.clone()),
                colour: Some(h.colour.clone()),
                priority: Some(h.priority),
                originating_data_id: h.originating_data_id.clone(),
                ..Default::default()
            })
            .collect(),
        people: collections
            .people
            .values()
            .map(|p| IntermediaryPerson {
                id: Some(p.id.clone()),
                name: Some(p.name.clone()),
                affiliation: p.affiliation.clone(),
                email: p.email.clone(),
                originating_data_id: p.originating_data_id.clone(),
                ..Default::default()
            })
            .collect(),
        content_groups: collections.content_groups.values().map(group_as_import).collect(),
        rooms: collections
            .rooms
            .values()
            .map(|r| IntermediaryRoom {
                id: Some(r.id.clone()),
                name: Some(r.name.clone()),
                capacity: r.capacity,
                priority: Some(r.priority),
                originating_data_id: r.originating_data_id.clone(),
                ..Default::default()
            })
            .collect(),
        events: collections
            .events
            .values()
            .map(|e| IntermediaryEvent {
                id: Some(e.id.clone()),
                room_id: Some(e.room_id.clone()),
                intended_room_mode: Some(e.intended_room_mode.clone()),
                name: Some(e.name.clone()),
                start_time: Some(e.start_time),
                duration_seconds: Some(e.duration_seconds),
                content_group_id: e.content_group_id.clone(),
                hallway_id: e.hallway_id.clone(),
                tag_ids: Some(e.tag_ids.clone()),
                originating_data_id: e.originating_data_id.clone(),
                ..Default::default()
            })
            .collect(),
    }
}

fn group_as_import(g: &ContentGroupDescriptor) -> IntermediaryContentGroup {
    IntermediaryContentGroup {
        id: Some(g.id.clone()),
        title: Some(g.title.clone()),
        short_title: g.short_title.clone(),
        content_group_type_name: Some(g.content_group_type_name.clone()),
        originating_data_id: g.originating_data_id.clone(),
        items: g
            .items
            .iter()
            .map(|i| IntermediaryItem {
                id: Some(i.id.clone()),
                name: Some(i.name.clone()),
                content_type_name: Some(i.content_type_name.clone()),
                data: Some(i.data.clone()),
                layout_data: i.layout_data.clone(),
                is_hidden: Some(i.is_hidden),
                required_content_id: i.required_content_id.clone(),
                originating_data_id: i.originating_data_id.clone(),
                ..Default::default()
            })
            .collect(),
        people: g
            .people
            .iter()
            .map(|p| IntermediaryGroupPerson {
                id: Some(p.id.clone()),
                person_id: Some(p.person_id.clone()),
                role_name: Some(p.role_name.clone()),
                priority: p.priority,
                ..Default::default()
            })
            .collect(),
        hallways: g
            .hallways
            .iter()
            .map(|h| IntermediaryGroupHallway {
                id: Some(h.id.clone()),
                hallway_id: Some(h.hallway_id.clone()),
                priority: h.priority,
                layout: h.layout.clone(),
                ..Default::default()
            })
            .collect(),
        tag_ids: Some(g.tag_ids.clone()),
        ..Default::default()
    }
}
