//! Required content items and their uploaders
//!
//! `uploadsRemaining` merges to the larger of two values. Uploaders are a
//! nested collection reconciled through the uploader pipeline.

use super::{
    convert_nested, identity, match_exact_name, match_fuzzy_name, match_id, match_provenance,
    or_matched, require, resolve_originating_data, uploaders,
};
use crate::error::ReconcileResult;
use crate::reconcile::field::{FieldMerge, Merger};
use crate::reconcile::lists::{merge_lists, record_merge};
use crate::reconcile::matching::{find_first_match, MatchRule};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{Incoming, IntermediaryRequiredItem, RequiredItemDescriptor, Table};

pub type IncomingRequiredItem = Incoming<IntermediaryRequiredItem, RequiredItemDescriptor>;

pub const MATCHERS: &[MatchRule<IncomingRequiredItem, RequiredItemDescriptor>] = &[
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
    items: &[RequiredItemDescriptor],
    candidate: &IncomingRequiredItem,
) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingRequiredItem,
    matched: Option<&RequiredItemDescriptor>,
) -> ReconcileResult<RequiredItemDescriptor> {
    match incoming {
        Incoming::Canonical(mut descriptor) => {
            descriptor.originating_data_id = resolve_originating_data(
                session,
                Table::RequiredContentItem,
                descriptor.originating_data_id,
                None,
            );
            Ok(descriptor)
        }
        Incoming::Imported(record) => {
            let name = require(Table::RequiredContentItem, "name", record.name.clone(), &record)?;
            let content_type_name = require(
                Table::RequiredContentItem,
                "contentTypeName",
                record.content_type_name.clone(),
                &record,
            )?;
            let originating_data_id = resolve_originating_data(
                session,
                Table::RequiredContentItem,
                record.originating_data_id.clone(),
                record.originating_data_source_id.as_deref(),
            );
            let (id, is_new) = identity(session, record.id, record.is_new);
            let uploaders = convert_nested(
                session,
                record.uploaders,
                matched.map_or(&[][..], |m| &m.uploaders[..]),
                uploaders::find,
                uploaders::convert,
            )?;

            Ok(RequiredItemDescriptor {
                id,
                is_new,
                name,
                content_type_name,
                is_hidden: or_matched(record.is_hidden, matched, |r| r.is_hidden, || false),
                uploads_remaining: record.uploads_remaining,
                uploaders,
                originating_data_id,
            })
        }
    }
}

pub fn merge(
    session: &mut ReconcileSession,
    left: RequiredItemDescriptor,
    right: RequiredItemDescriptor,
) -> ReconcileResult<RequiredItemDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::RequiredContentItem, left.is_new, right.is_new);

    let id = fields.identity(&left.id, &right.id)?;
    let is_new = fields.is_new();
    let name = fields.required("name", left.name, right.name)?;
    let content_type_name = fields.required(
        "contentTypeName",
        left.content_type_name,
        right.content_type_name,
    )?;
    let is_hidden = fields.required("isHidden", left.is_hidden, right.is_hidden)?;
    let uploads_remaining = fields.optional_with(
        "uploadsRemaining",
        left.uploads_remaining,
        right.uploads_remaining,
        Merger::maximum(),
    )?;
    let originating_data_id = fields.optional(
        "originatingDataId",
        left.originating_data_id,
        right.originating_data_id,
    )?;
    let uploaders = merge_lists(
        fields.session(),
        Table::Uploader,
        left.uploaders,
        right.uploaders.into_iter().map(Incoming::Canonical).collect(),
        uploaders::find,
        uploaders::convert,
        uploaders::merge,
    )?;

    let merged = RequiredItemDescriptor {
        id,
        is_new,
        name,
        content_type_name,
        is_hidden,
        uploads_remaining,
        uploaders,
        originating_data_id,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}
