//! Batch orchestration
//!
//! Runs the entity pipelines in dependency order over one import batch:
//!
//! 1. OriginatingData
//! 2. Tag, Hallway
//! 3. Person, ContentGroup (content scope)
//! 4. Room, Event (schedule scope)
//! 5. Provenance garbage collection
//!
//! Each pipeline folds every import source, in source-key order, into the
//! running result. After a pipeline completes its result becomes the lookup
//! collection later pipelines resolve references against.
//!
//! A batch is all-or-nothing: the first error aborts it and no collections
//! are returned.

use crate::change_log::{ChangeSummary, ChangeType};
use crate::error::ReconcileResult;
use crate::pipelines::{
    content_groups::reconcile_content_groups, events::reconcile_events,
    hallways::reconcile_hallways, originating_data::reconcile_originating_datas,
    people::reconcile_people, rooms::reconcile_rooms, tags::reconcile_tags,
};
use crate::reconcile::registry::IdRegistry;
use crate::session::{snapshot, KnownRecords, ReconcileSession};
use crate::types::{keyed, listed, CanonicalCollections, ImportBatch, IntermediaryBatch, Table};
use chrono::{DateTime, Utc};
use conflux_common::MatchingConfig;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Which pipelines a batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Content and schedule
    Full,
    /// People and content groups
    Content,
    /// Rooms and events
    Schedule,
}

impl Scope {
    fn includes_content(self) -> bool {
        matches!(self, Self::Full | Self::Content)
    }

    fn includes_schedule(self) -> bool {
        matches!(self, Self::Full | Self::Schedule)
    }
}

/// Counts over one batch's change log
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub sources: usize,
    pub inserted: usize,
    pub updated: usize,
    pub merged: usize,
    pub deleted: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Result of a successful batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutput {
    pub collections: CanonicalCollections,
    pub changes: Vec<ChangeSummary>,
    /// Registry state after the batch, for the caller to persist
    pub registry: IdRegistry,
    pub summary: BatchSummary,
}

/// Reconcile a whole batch starting from a persisted registry
pub fn reconcile_batch(
    config: MatchingConfig,
    registry: IdRegistry,
    canonical: CanonicalCollections,
    batch: ImportBatch,
) -> ReconcileResult<ReconcileOutput> {
    let session = ReconcileSession::new(config).with_registry(registry);
    run(session, canonical, batch, Scope::Full)
}

/// Reconcile only the content domain (people, content groups)
pub fn reconcile_content(
    session: ReconcileSession,
    canonical: CanonicalCollections,
    batch: ImportBatch,
) -> ReconcileResult<ReconcileOutput> {
    run(session, canonical, batch, Scope::Content)
}

/// Reconcile only the schedule domain (rooms, events)
pub fn reconcile_schedule(
    session: ReconcileSession,
    canonical: CanonicalCollections,
    batch: ImportBatch,
) -> ReconcileResult<ReconcileOutput> {
    run(session, canonical, batch, Scope::Schedule)
}

/// Run a batch in a caller-prepared session
pub fn run(
    mut session: ReconcileSession,
    canonical: CanonicalCollections,
    batch: ImportBatch,
    scope: Scope,
) -> ReconcileResult<ReconcileOutput> {
    let started_at = Utc::now();
    let source_names: Vec<String> = batch.keys().cloned().collect();
    info!(sources = ?source_names, scope = ?scope, "Starting reconciliation batch");

    let mut sources: Vec<IntermediaryBatch> = batch.into_values().collect();
    let mut collections = canonical;
    *session.known_mut() = KnownRecords {
        originating_datas: listed(&collections.originating_datas),
        tags: listed(&collections.tags),
        hallways: listed(&collections.hallways),
        people: listed(&collections.people),
        rooms: listed(&collections.rooms),
        content_groups: listed(&collections.content_groups),
    };

    let originating_datas = run_pipeline(
        &mut session,
        Table::OriginatingData,
        listed(&collections.originating_datas),
        take_sources(&mut sources, |s| &mut s.originating_datas),
        reconcile_originating_datas,
    )?;
    session.known_mut().originating_datas = originating_datas.clone();
    collections.originating_datas = keyed(originating_datas);

    let tags = run_pipeline(
        &mut session,
        Table::Tag,
        listed(&collections.tags),
        take_sources(&mut sources, |s| &mut s.tags),
        reconcile_tags,
    )?;
    session.known_mut().tags = tags.clone();
    collections.tags = keyed(tags);

    let hallways = run_pipeline(
        &mut session,
        Table::Hallway,
        listed(&collections.hallways),
        take_sources(&mut sources, |s| &mut s.hallways),
        reconcile_hallways,
    )?;
    session.known_mut().hallways = hallways.clone();
    collections.hallways = keyed(hallways);

    if scope.includes_content() {
        let people = run_pipeline(
            &mut session,
            Table::ContentPerson,
            listed(&collections.people),
            take_sources(&mut sources, |s| &mut s.people),
            reconcile_people,
        )?;
        session.known_mut().people = people.clone();
        collections.people = keyed(people);

        let content_groups = run_pipeline(
            &mut session,
            Table::ContentGroup,
            listed(&collections.content_groups),
            take_sources(&mut sources, |s| &mut s.content_groups),
            reconcile_content_groups,
        )?;
        session.known_mut().content_groups = content_groups.clone();
        collections.content_groups = keyed(content_groups);
    }

    if scope.includes_schedule() {
        let rooms = run_pipeline(
            &mut session,
            Table::Room,
            listed(&collections.rooms),
            take_sources(&mut sources, |s| &mut s.rooms),
            reconcile_rooms,
        )?;
        session.known_mut().rooms = rooms.clone();
        collections.rooms = keyed(rooms);

        let events = run_pipeline(
            &mut session,
            Table::Event,
            listed(&collections.events),
            take_sources(&mut sources, |s| &mut s.events),
            reconcile_events,
        )?;
        collections.events = keyed(events);
    }

    prune_provenance(&mut session, &mut collections)?;

    let (log, registry) = session.into_parts();
    let summary = BatchSummary {
        sources: source_names.len(),
        inserted: log.count(ChangeType::Insert),
        updated: log.count(ChangeType::Update),
        merged: log.count(ChangeType::Merge),
        deleted: log.count(ChangeType::Delete),
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        inserted = summary.inserted,
        updated = summary.updated,
        merged = summary.merged,
        deleted = summary.deleted,
        absorbed_ids = registry.len(),
        "Reconciliation batch complete"
    );

    Ok(ReconcileOutput {
        collections,
        changes: log.into_entries(),
        registry,
        summary,
    })
}

/// One entity kind's list from every source, in source order
fn take_sources<T>(
    sources: &mut [IntermediaryBatch],
    pick: impl Fn(&mut IntermediaryBatch) -> &mut Vec<T>,
) -> Vec<Vec<T>> {
    sources
        .iter_mut()
        .map(|source| std::mem::take(pick(source)))
        .collect()
}

type Pipeline<T, D> =
    fn(&mut ReconcileSession, Vec<D>, Vec<Vec<T>>) -> ReconcileResult<Vec<D>>;

fn run_pipeline<T, D>(
    session: &mut ReconcileSession,
    table: Table,
    existing: Vec<D>,
    sources: Vec<Vec<T>>,
    pipeline: Pipeline<T, D>,
) -> ReconcileResult<Vec<D>> {
    let mark = session.log().len();
    let incoming: usize = sources.iter().map(Vec::len).sum();
    let existing_count = existing.len();

    let result = pipeline(session, existing, sources)?;

    let own = |change_type: ChangeType| {
        session
            .log()
            .since(mark)
            .iter()
            .filter(|entry| entry.location == table.name() && entry.change_type == change_type)
            .count()
    };
    info!(
        table = %table,
        existing = existing_count,
        incoming,
        inserted = own(ChangeType::Insert),
        updated = own(ChangeType::Update),
        total = result.len(),
        "Pipeline complete"
    );

    Ok(result)
}

/// Provenance ids referenced anywhere in `collections`, resolved to survivors
fn referenced_provenance(session: &ReconcileSession, collections: &CanonicalCollections) -> BTreeSet<String> {
    let groups = collections.content_groups.values();
    let refs = collections
        .tags
        .values()
        .filter_map(|r| r.originating_data_id.as_deref())
        .chain(collections.hallways.values().filter_map(|r| r.originating_data_id.as_deref()))
        .chain(collections.people.values().filter_map(|r| r.originating_data_id.as_deref()))
        .chain(collections.rooms.values().filter_map(|r| r.originating_data_id.as_deref()))
        .chain(collections.events.values().filter_map(|r| r.originating_data_id.as_deref()))
        .chain(groups.clone().filter_map(|g| g.originating_data_id.as_deref()))
        .chain(
            groups
                .clone()
                .flat_map(|g| g.items.iter())
                .filter_map(|i| i.originating_data_id.as_deref()),
        )
        .chain(
            groups
                .flat_map(|g| g.required_items.iter())
                .filter_map(|i| i.originating_data_id.as_deref()),
        );

    refs.map(|id| {
        session
            .registry()
            .resolve(Table::OriginatingData, id)
            .to_string()
    })
    .collect()
}

/// Point every provenance reference at the surviving record
fn resolve_provenance_refs(session: &ReconcileSession, collections: &mut CanonicalCollections) {
    let resolve = |id: &mut Option<String>| {
        *id = id
            .as_deref()
            .map(|current| session.registry().resolve(Table::OriginatingData, current).to_string());
    };

    collections.tags.values_mut().for_each(|r| resolve(&mut r.originating_data_id));
    collections.hallways.values_mut().for_each(|r| resolve(&mut r.originating_data_id));
    collections.people.values_mut().for_each(|r| resolve(&mut r.originating_data_id));
    collections.rooms.values_mut().for_each(|r| resolve(&mut r.originating_data_id));
    collections.events.values_mut().for_each(|r| resolve(&mut r.originating_data_id));
    for group in collections.content_groups.values_mut() {
        resolve(&mut group.originating_data_id);
        group.items.iter_mut().for_each(|i| resolve(&mut i.originating_data_id));
        group.required_items.iter_mut().for_each(|i| resolve(&mut i.originating_data_id));
    }
}

/// Drop provenance records nothing references
fn prune_provenance(
    session: &mut ReconcileSession,
    collections: &mut CanonicalCollections,
) -> ReconcileResult<usize> {
    resolve_provenance_refs(session, collections);
    let referenced = referenced_provenance(session, collections);
    let dangling: Vec<String> = collections
        .originating_datas
        .keys()
        .filter(|id| !referenced.contains(*id))
        .cloned()
        .collect();

    for id in &dangling {
        if let Some(od) = collections.originating_datas.remove(id) {
            debug!(id = %id, source_id = %od.source_id, "Pruning unreferenced provenance record");
            let prior = snapshot(&od)?;
            session.record(
                Table::OriginatingData.name(),
                ChangeType::Delete,
                format!("Deleted unreferenced OriginatingData {}", id),
                vec![prior],
                serde_json::Value::Null,
            );
        }
    }

    if !dangling.is_empty() {
        info!(pruned = dangling.len(), "Provenance garbage collection complete");
    }
    Ok(dangling.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OriginatingDataDescriptor, TagDescriptor};

    fn od(id: &str) -> OriginatingDataDescriptor {
        OriginatingDataDescriptor {
            id: id.into(),
            is_new: false,
            source_id: format!("src-{}", id),
            data: vec![],
        }
    }

    #[test]
    fn test_prune_keeps_referenced_and_absorbed_references() {
        let mut session = ReconcileSession::new(MatchingConfig::default());
        session
            .registry_mut()
            .absorb(Table::OriginatingData, "OD2", "OD-old");

        let mut collections = CanonicalCollections {
            originating_datas: keyed(vec![od("OD1"), od("OD2"), od("OD3")]),
            tags: keyed(vec![
                TagDescriptor {
                    id: "T1".into(),
                    is_new: false,
                    name: "A".into(),
                    colour: "red".into(),
                    originating_data_id: Some("OD1".into()),
                },
                TagDescriptor {
                    id: "T2".into(),
                    is_new: false,
                    name: "B".into(),
                    colour: "red".into(),
                    originating_data_id: Some("OD-old".into()),
                },
            ]),
            ..Default::default()
        };

        let pruned = prune_provenance(&mut session, &mut collections).unwrap();

        assert_eq!(pruned, 1);
        assert!(collections.originating_datas.contains_key("OD1"));
        assert!(collections.originating_datas.contains_key("OD2"));
        assert!(!collections.originating_datas.contains_key("OD3"));
        assert_eq!(session.log().count(ChangeType::Delete), 1);
        assert_eq!(collections.tags["T2"].originating_data_id.as_deref(), Some("OD2"));
        assert_eq!(collections.tags["T1"].originating_data_id.as_deref(), Some("OD1"));
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let output = reconcile_batch(
            MatchingConfig::default(),
            IdRegistry::new(),
            CanonicalCollections::default(),
            ImportBatch::new(),
        )
        .unwrap();

        assert!(output.changes.is_empty());
        assert_eq!(output.summary.sources, 0);
        assert_eq!(output.collections, CanonicalCollections::default());
    }
}
