//! Content groups
//!
//! A content group owns four nested collections (items, required items,
//! people links, hallway links), each reconciled through its own entity
//! pipeline when two groups merge.

use super::{
    convert_nested, group_hallways, group_people, identity, items, match_exact_name,
    match_fuzzy_name, match_id, match_provenance, or_matched, require, required_items,
    resolve_originating_data, tags::convert_tag_names,
};
use crate::error::ReconcileResult;
use crate::reconcile::field::{FieldMerge, Merger};
use crate::reconcile::lists::{fold_sources, merge_lists, record_merge};
use crate::reconcile::matching::{find_first_match, MatchRule};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{ContentGroupDescriptor, Incoming, IntermediaryContentGroup, Table};

pub type IncomingContentGroup = Incoming<IntermediaryContentGroup, ContentGroupDescriptor>;

pub const DEFAULT_GROUP_TYPE: &str = "PAPER";

pub const MATCHERS: &[MatchRule<IncomingContentGroup, ContentGroupDescriptor>] = &[
    MatchRule {
        name: "id",
        matches: match_id,
    },
    MatchRule {
        name: "provenance",
        matches: match_provenance,
    },
    MatchRule {
        name: "exact_title",
        matches: match_exact_name,
    },
    MatchRule {
        name: "fuzzy_title",
        matches: match_fuzzy_name,
    },
];

pub fn find(
    session: &ReconcileSession,
    items: &[ContentGroupDescriptor],
    candidate: &IncomingContentGroup,
) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingContentGroup,
    matched: Option<&ContentGroupDescriptor>,
) -> ReconcileResult<ContentGroupDescriptor> {
    let record = match incoming {
        Incoming::Canonical(mut descriptor) => {
            descriptor.originating_data_id = resolve_originating_data(
                session,
                Table::ContentGroup,
                descriptor.originating_data_id,
                None,
            );
            descriptor.tag_ids = convert_tag_names(
                session,
                Table::ContentGroup,
                Some(std::mem::take(&mut descriptor.tag_ids)),
                None,
                &descriptor,
            )?;
            return Ok(descriptor);
        }
        Incoming::Imported(record) => record,
    };

    let title = require(Table::ContentGroup, "title", record.title.clone(), &record)?;
    let tag_ids = convert_tag_names(
        session,
        Table::ContentGroup,
        record.tag_ids.clone(),
        record.tag_names.as_deref(),
        &record,
    )?;
    let originating_data_id = resolve_originating_data(
        session,
        Table::ContentGroup,
        record.originating_data_id.clone(),
        record.originating_data_source_id.as_deref(),
    );
    let (id, is_new) = identity(session, record.id, record.is_new);

    // Nested records inherit omitted fields from the matching child of the matched group
    let required_items = convert_nested(
        session,
        record.required_items,
        matched.map_or(&[][..], |g| &g.required_items[..]),
        required_items::find,
        required_items::convert,
    )?;
    let items = convert_nested(
        session,
        record.items,
        matched.map_or(&[][..], |g| &g.items[..]),
        items::find,
        items::convert,
    )?;
    let people = convert_nested(
        session,
        record.people,
        matched.map_or(&[][..], |g| &g.people[..]),
        group_people::find,
        group_people::convert,
    )?;
    let hallways = convert_nested(
        session,
        record.hallways,
        matched.map_or(&[][..], |g| &g.hallways[..]),
        group_hallways::find,
        group_hallways::convert,
    )?;

    Ok(ContentGroupDescriptor {
        id,
        is_new,
        title,
        short_title: record.short_title,
        content_group_type_name: or_matched(
            record.content_group_type_name,
            matched,
            |g| g.content_group_type_name.clone(),
            || DEFAULT_GROUP_TYPE.to_string(),
        ),
        originating_data_id,
        items,
        required_items,
        people,
        hallways,
        tag_ids,
    })
}

pub fn merge(
    session: &mut ReconcileSession,
    left: ContentGroupDescriptor,
    right: ContentGroupDescriptor,
) -> ReconcileResult<ContentGroupDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::ContentGroup, left.is_new, right.is_new);

    let id = fields.identity(&left.id, &right.id)?;
    let is_new = fields.is_new();
    let title = fields.required("title", left.title, right.title)?;
    let short_title = fields.optional("shortTitle", left.short_title, right.short_title)?;
    let content_group_type_name = fields.required(
        "contentGroupTypeName",
        left.content_group_type_name,
        right.content_group_type_name,
    )?;
    let originating_data_id = fields.optional(
        "originatingDataId",
        left.originating_data_id,
        right.originating_data_id,
    )?;
    let tag_ids = fields.required_with("tagIds", left.tag_ids, right.tag_ids, Merger::union())?;

    let session = fields.session();
    // Required items first so items see absorbed required item ids
    let required_items = merge_lists(
        session,
        Table::RequiredContentItem,
        left.required_items,
        right.required_items.into_iter().map(Incoming::Canonical).collect(),
        required_items::find,
        required_items::convert,
        required_items::merge,
    )?;
    let items = merge_lists(
        session,
        Table::ContentItem,
        left.items,
        right.items.into_iter().map(Incoming::Canonical).collect(),
        items::find,
        items::convert,
        items::merge,
    )?;
    let people = merge_lists(
        session,
        Table::ContentGroupPerson,
        left.people,
        right.people.into_iter().map(Incoming::Canonical).collect(),
        group_people::find,
        group_people::convert,
        group_people::merge,
    )?;
    let hallways = merge_lists(
        session,
        Table::ContentGroupHallway,
        left.hallways,
        right.hallways.into_iter().map(Incoming::Canonical).collect(),
        group_hallways::find,
        group_hallways::convert,
        group_hallways::merge,
    )?;

    let merged = ContentGroupDescriptor {
        id,
        is_new,
        title,
        short_title,
        content_group_type_name,
        originating_data_id,
        items,
        required_items,
        people,
        hallways,
        tag_ids,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}

pub fn reconcile_content_groups(
    session: &mut ReconcileSession,
    existing: Vec<ContentGroupDescriptor>,
    sources: Vec<Vec<IntermediaryContentGroup>>,
) -> ReconcileResult<Vec<ContentGroupDescriptor>> {
    fold_sources(session, existing, sources, |session, running, incoming| {
        let incoming = incoming.into_iter().map(Incoming::Imported).collect();
        merge_lists(
            session,
            Table::ContentGroup,
            running,
            incoming,
            find,
            convert,
            merge,
        )
    })
}
