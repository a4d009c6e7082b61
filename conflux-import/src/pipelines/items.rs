//! Content items of a content group

use super::{
    identity, match_exact_name, match_fuzzy_name, match_id, match_provenance, or_matched,
    require, resolve_originating_data,
};
use crate::error::ReconcileResult;
use crate::reconcile::field::FieldMerge;
use crate::reconcile::lists::record_merge;
use crate::reconcile::matching::{find_first_match, MatchRule};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{Incoming, IntermediaryItem, ItemDescriptor, Table};
use serde_json::Value;

pub type IncomingItem = Incoming<IntermediaryItem, ItemDescriptor>;

pub const MATCHERS: &[MatchRule<IncomingItem, ItemDescriptor>] = &[
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

pub fn find(session: &ReconcileSession, items: &[ItemDescriptor], candidate: &IncomingItem) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

fn resolve_required_item(session: &ReconcileSession, id: Option<String>) -> Option<String> {
    id.map(|id| session.registry().resolve(Table::RequiredContentItem, &id).to_string())
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingItem,
    matched: Option<&ItemDescriptor>,
) -> ReconcileResult<ItemDescriptor> {
    match incoming {
        Incoming::Canonical(mut descriptor) => {
            descriptor.originating_data_id = resolve_originating_data(
                session,
                Table::ContentItem,
                descriptor.originating_data_id,
                None,
            );
            descriptor.required_content_id =
                resolve_required_item(session, descriptor.required_content_id);
            Ok(descriptor)
        }
        Incoming::Imported(record) => {
            let name = require(Table::ContentItem, "name", record.name.clone(), &record)?;
            let content_type_name = require(
                Table::ContentItem,
                "contentTypeName",
                record.content_type_name.clone(),
                &record,
            )?;
            let originating_data_id = resolve_originating_data(
                session,
                Table::ContentItem,
                record.originating_data_id.clone(),
                record.originating_data_source_id.as_deref(),
            );
            let required_content_id = resolve_required_item(session, record.required_content_id);
            let (id, is_new) = identity(session, record.id, record.is_new);
            Ok(ItemDescriptor {
                id,
                is_new,
                name,
                content_type_name,
                data: or_matched(record.data, matched, |i| i.data.clone(), || Value::Null),
                layout_data: record.layout_data,
                is_hidden: or_matched(record.is_hidden, matched, |i| i.is_hidden, || false),
                required_content_id,
                originating_data_id,
            })
        }
    }
}

pub fn merge(
    session: &mut ReconcileSession,
    left: ItemDescriptor,
    right: ItemDescriptor,
) -> ReconcileResult<ItemDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::ContentItem, left.is_new, right.is_new);

    let merged = ItemDescriptor {
        id: fields.identity(&left.id, &right.id)?,
        is_new: fields.is_new(),
        name: fields.required("name", left.name, right.name)?,
        content_type_name: fields.required(
            "contentTypeName",
            left.content_type_name,
            right.content_type_name,
        )?,
        data: fields.required("data", left.data, right.data)?,
        layout_data: fields.optional("layoutData", left.layout_data, right.layout_data)?,
        is_hidden: fields.required("isHidden", left.is_hidden, right.is_hidden)?,
        required_content_id: fields.optional(
            "requiredContentId",
            left.required_content_id,
            right.required_content_id,
        )?,
        originating_data_id: fields.optional(
            "originatingDataId",
            left.originating_data_id,
            right.originating_data_id,
        )?,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}
