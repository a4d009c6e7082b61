//! End-to-end reconciliation of whole import batches

mod helpers;

use conflux_common::MatchingConfig;
use conflux_import::batch::{self, Scope};
use conflux_import::types::*;
use conflux_import::{
    reconcile_batch, ChangeType, IdRegistry, ImportBatch, ReconcileError, ReconcileOutput,
};
use helpers::*;
use pretty_assertions::assert_eq;

fn import(sources: Vec<(&str, IntermediaryBatch)>) -> ImportBatch {
    sources
        .into_iter()
        .map(|(name, batch)| (name.to_string(), batch))
        .collect()
}

fn run(canonical: CanonicalCollections, batch: ImportBatch) -> ReconcileOutput {
    batch::run(session(), canonical, batch, Scope::Full).unwrap()
}

#[test]
fn test_reimporting_canonical_copies_changes_nothing() {
    let canonical = program();
    let batch = import(vec![("copy", as_import(&canonical))]);

    let output = run(canonical.clone(), batch);

    assert_eq!(output.collections, canonical);
    assert_eq!(output.summary.inserted, 0);
    assert_eq!(output.summary.deleted, 0);
    assert!(output.summary.updated > 0);
    for entry in &output.changes {
        assert!(
            matches!(entry.change_type, ChangeType::Update | ChangeType::Merge),
            "unexpected {:?} at {}",
            entry.change_type,
            entry.location
        );
        if entry.change_type == ChangeType::Update {
            assert_eq!(entry.import_data[0], entry.new_data, "{}", entry.description);
        }
    }
}

#[test]
fn test_new_records_are_minted_and_logged_as_inserts() {
    let batch = import(vec![(
        "cfp",
        IntermediaryBatch {
            tags: vec![IntermediaryTag {
                name: Some("Keynote".into()),
                ..Default::default()
            }],
            ..Default::default()
        },
    )]);

    let output = run(CanonicalCollections::default(), batch);

    let tag = &output.collections.tags["new-1"];
    assert!(tag.is_new);
    assert_eq!(tag.name, "Keynote");
    assert_eq!(tag.colour, "rgba(0,0,0,0)");

    assert_eq!(output.changes.len(), 1);
    let insert = &output.changes[0];
    assert_eq!(insert.change_type, ChangeType::Insert);
    assert_eq!(insert.location, "Tag");
    assert_eq!(insert.import_data.len(), 1);
    assert_eq!(insert.import_data[0]["name"], "Keynote");
    assert_eq!(insert.new_data["id"], "new-1");
}

#[test]
fn test_existing_person_absorbs_differently_cased_import() {
    let canonical = CanonicalCollections {
        people: keyed(vec![person("P1", "jane doe", "Acme")]),
        ..Default::default()
    };
    let batch = import(vec![(
        "registrations",
        IntermediaryBatch {
            people: vec![IntermediaryPerson {
                name: Some("Jane Doe".into()),
                affiliation: Some("Acme".into()),
                ..Default::default()
            }],
            ..Default::default()
        },
    )]);

    let output = run(canonical, batch);

    assert_eq!(output.collections.people.len(), 1);
    let merged = &output.collections.people["P1"];
    assert!(!merged.is_new);
    // The imported side is new and preferred
    assert_eq!(merged.name, "Jane Doe");
    assert_eq!(output.registry.resolve(Table::ContentPerson, "new-1"), "P1");

    let locations: Vec<(&str, ChangeType)> = output
        .changes
        .iter()
        .map(|entry| (entry.location.as_str(), entry.change_type))
        .collect();
    assert!(locations.contains(&("ContentPerson.name", ChangeType::Merge)));
    assert!(locations.contains(&("ContentPerson", ChangeType::Merge)));
    assert_eq!(locations.last(), Some(&("ContentPerson", ChangeType::Update)));
}

#[test]
fn test_absorbed_id_still_resolves_after_chained_merges() {
    let canonical = CanonicalCollections {
        people: keyed(vec![person("P-A", "Morgan Lee", "Globex")]),
        ..Default::default()
    };
    let named = |id: &str, name: &str| IntermediaryPerson {
        id: Some(id.into()),
        name: Some(name.into()),
        affiliation: Some("Globex".into()),
        ..Default::default()
    };
    let batch = import(vec![
        ("1-speakers", IntermediaryBatch {
            people: vec![named("P-B", "Morgan Lee")],
            ..Default::default()
        }),
        ("2-reviewers", IntermediaryBatch {
            people: vec![named("P-C", "morgan lee")],
            ..Default::default()
        }),
        ("3-late", IntermediaryBatch {
            people: vec![named("P-B", "Morgan Lee-Smith")],
            ..Default::default()
        }),
    ]);

    let output = run(canonical, batch);

    assert_eq!(output.collections.people.len(), 1);
    let merged = &output.collections.people["P-A"];
    assert_eq!(merged.name, "Morgan Lee-Smith");
    assert_eq!(output.registry.resolve(Table::ContentPerson, "P-B"), "P-A");
    assert_eq!(output.registry.resolve(Table::ContentPerson, "P-C"), "P-A");
}

#[test]
fn test_provenance_widened_by_superset_import() {
    let mut canonical = CanonicalCollections {
        originating_datas: keyed(vec![od("OD1", "src-1")]),
        tags: keyed(vec![tag("T1", "Systems")]),
        ..Default::default()
    };
    canonical
        .tags
        .get_mut("T1")
        .unwrap()
        .originating_data_id = Some("OD1".into());

    let batch = import(vec![(
        "sheet",
        IntermediaryBatch {
            originating_datas: vec![IntermediaryOriginatingData {
                id: Some("OD1".into()),
                source_id: "src-1¬src-2".into(),
                data: vec![serde_json::json!({"row": 2})],
                ..Default::default()
            }],
            ..Default::default()
        },
    )]);

    let output = run(canonical, batch);

    let merged = &output.collections.originating_datas["OD1"];
    assert_eq!(merged.source_id, "src-1¬src-2");
    assert_eq!(merged.data, vec![serde_json::json!({"row": 2})]);
}

#[test]
fn test_event_links_to_group_owning_source_item() {
    let mut canonical = program();
    canonical.events.clear();

    let batch = import(vec![(
        "schedule",
        IntermediaryBatch {
            events: vec![IntermediaryEvent {
                name: Some("Consensus Talk".into()),
                room_name: Some("main hall".into()),
                start_time: Some(at("2026-03-02T14:00:00Z")),
                duration_seconds: Some(1200),
                item_source_id: Some("src-77".into()),
                tag_names: Some(vec!["systems".into()]),
                ..Default::default()
            }],
            ..Default::default()
        },
    )]);

    let output = run(canonical, batch);

    assert_eq!(output.collections.events.len(), 1);
    let event = &output.collections.events["new-1"];
    assert_eq!(event.content_group_id.as_deref(), Some("G1"));
    assert_eq!(event.room_id, "R1");
    assert_eq!(event.intended_room_mode, "PRERECORDED");
    assert!(event.tag_ids.contains("T1"));
}

#[test]
fn test_ambiguous_item_source_rejects_batch() {
    let mut canonical = program();
    canonical.events.clear();
    canonical
        .originating_datas
        .insert("OD2".into(), od("OD2", "src-77"));
    let second = group("G2", "Consensus Revisited", vec![item("I2", "Abstract", "OD2")]);
    canonical.content_groups.insert("G2".into(), second);

    let batch = import(vec![(
        "schedule",
        IntermediaryBatch {
            events: vec![IntermediaryEvent {
                name: Some("Consensus Talk".into()),
                room_id: Some("R1".into()),
                start_time: Some(at("2026-03-02T14:00:00Z")),
                duration_seconds: Some(1200),
                item_source_id: Some("src-77".into()),
                ..Default::default()
            }],
            ..Default::default()
        },
    )]);

    let err = batch::run(session(), canonical, batch, Scope::Full).unwrap_err();
    match err {
        ReconcileError::AmbiguousItemSource { candidates, .. } => {
            let items: Vec<&str> = candidates.iter().map(|c| c.item_id.as_str()).collect();
            assert_eq!(items, ["I1", "I2"]);
        }
        other => panic!("expected ambiguous item source, got {other}"),
    }
}

#[test]
fn test_unknown_tag_name_rejects_batch() {
    let batch = import(vec![(
        "cfp",
        IntermediaryBatch {
            content_groups: vec![IntermediaryContentGroup {
                title: Some("Tagged Paper".into()),
                tag_names: Some(vec!["Nonexistent".into()]),
                ..Default::default()
            }],
            ..Default::default()
        },
    )]);

    let err = reconcile_batch(
        MatchingConfig::default(),
        IdRegistry::new(),
        CanonicalCollections::default(),
        batch,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::UnresolvedReference { kind: "tag", .. }
    ));
}

#[test]
fn test_sources_fold_in_key_order() {
    let colour = |c: &str| IntermediaryTag {
        name: Some("Workshop".into()),
        colour: Some(c.into()),
        ..Default::default()
    };
    let batch = import(vec![
        ("b-second", IntermediaryBatch {
            tags: vec![colour("#222222")],
            ..Default::default()
        }),
        ("a-first", IntermediaryBatch {
            tags: vec![colour("#111111")],
            ..Default::default()
        }),
    ]);

    let output = run(CanonicalCollections::default(), batch);

    assert_eq!(output.collections.tags.len(), 1);
    let tag = &output.collections.tags["new-1"];
    assert_eq!(tag.colour, "#222222");
    assert_eq!(output.registry.resolve(Table::Tag, "new-2"), "new-1");
    assert_eq!(output.summary.sources, 2);
    assert_eq!(output.summary.inserted, 1);
    assert_eq!(output.summary.updated, 1);
}

#[test]
fn test_numbered_rooms_are_not_fuzzy_matched() {
    let canonical = CanonicalCollections {
        rooms: keyed(vec![room("R1", "Lecture Theatre 1")]),
        ..Default::default()
    };
    let batch = import(vec![(
        "venue",
        IntermediaryBatch {
            rooms: vec![IntermediaryRoom {
                name: Some("Lecture Theatre 2".into()),
                ..Default::default()
            }],
            ..Default::default()
        },
    )]);

    let output = batch::run(session(), canonical, batch, Scope::Schedule).unwrap();
    assert_eq!(output.collections.rooms.len(), 2);
}

#[test]
fn test_unreferenced_provenance_is_deleted() {
    let mut canonical = program();
    canonical
        .originating_datas
        .insert("OD-stale".into(), od("OD-stale", "src-0"));

    let output = run(canonical, ImportBatch::new());

    assert!(!output.collections.originating_datas.contains_key("OD-stale"));
    assert!(output.collections.originating_datas.contains_key("OD1"));
    assert_eq!(output.summary.deleted, 1);
    let delete = output
        .changes
        .iter()
        .find(|entry| entry.change_type == ChangeType::Delete)
        .unwrap();
    assert_eq!(delete.location, "OriginatingData");
    assert_eq!(delete.import_data[0]["id"], "OD-stale");
}

#[test]
fn test_reimport_without_optional_fields_keeps_stored_values() {
    let mut canonical = program();
    let paper = canonical.content_groups.get_mut("G1").unwrap();
    paper.content_group_type_name = "WORKSHOP".into();
    paper.items[0].is_hidden = true;
    paper.required_items = vec![RequiredItemDescriptor {
        id: "RI1".into(),
        is_new: false,
        name: "Slides".into(),
        content_type_name: "SLIDES".into(),
        is_hidden: true,
        uploads_remaining: None,
        uploaders: vec![UploaderDescriptor {
            id: "U1".into(),
            is_new: false,
            email: "alex@example.org".into(),
            name: "Alex Kim".into(),
            email_sent: true,
        }],
        originating_data_id: None,
    }];
    canonical.rooms.get_mut("R1").unwrap().priority = 4;

    let mut copy = as_import(&canonical);
    for tag in &mut copy.tags {
        tag.colour = None;
    }
    for hallway in &mut copy.hallways {
        hallway.colour = None;
        hallway.priority = None;
    }
    for room in &mut copy.rooms {
        room.priority = None;
    }
    for event in &mut copy.events {
        event.intended_room_mode = None;
    }
    let group = &mut copy.content_groups[0];
    group.content_group_type_name = None;
    group.items[0].is_hidden = None;
    group.items[0].data = None;
    group.people[0].role_name = None;
    group.required_items = vec![IntermediaryRequiredItem {
        id: Some("RI1".into()),
        name: Some("Slides".into()),
        content_type_name: Some("SLIDES".into()),
        uploaders: vec![IntermediaryUploader {
            id: Some("U1".into()),
            email: Some("alex@example.org".into()),
            ..Default::default()
        }],
        ..Default::default()
    }];

    let output = run(canonical.clone(), import(vec![("partial", copy)]));

    assert_eq!(output.collections, canonical);
    assert_eq!(output.summary.inserted, 0);
}

#[test]
fn test_content_scope_leaves_schedule_untouched() {
    let canonical = program();
    let mut copy = as_import(&canonical);
    copy.rooms[0].name = Some("Renamed Hall".into());

    let output =
        batch::reconcile_content(session(), canonical.clone(), import(vec![("copy", copy)])).unwrap();

    assert_eq!(output.collections.rooms, canonical.rooms);
    assert!(output.changes.iter().all(|entry| !entry.location.starts_with("Room")));
}
