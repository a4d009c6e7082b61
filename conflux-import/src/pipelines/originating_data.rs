//! Provenance records
//!
//! Matched by id, then by source-id token set. Merging follows a three-way
//! precedence:
//! 1. One side's token set covers the other's: the covering side is adopted
//!    wholesale (equal sets keep the existing record)
//! 2. At least one side is persisted: the registry's id precedence picks the
//!    survivor, payload lists are concatenated and token sets unioned
//! 3. Both sides are new: a fresh id is minted, payloads concatenated and
//!    token sets unioned
//!
//! Every losing id is absorbed into the survivor.

use super::{identity, match_id, require};
use crate::error::ReconcileResult;
use crate::reconcile::field::{FieldMerge, Merger};
use crate::reconcile::lists::{fold_sources, merge_lists, record_merge};
use crate::reconcile::matching::{
    find_first_match, is_match_originating_data, source_id_tokens, union_source_ids, MatchRule,
};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{Incoming, IntermediaryOriginatingData, OriginatingDataDescriptor, Table};
use tracing::debug;

pub type IncomingOriginatingData = Incoming<IntermediaryOriginatingData, OriginatingDataDescriptor>;

pub const MATCHERS: &[MatchRule<IncomingOriginatingData, OriginatingDataDescriptor>] = &[
    MatchRule {
        name: "id",
        matches: match_id,
    },
    MatchRule {
        name: "source_id",
        matches: match_source_id,
    },
];

fn match_source_id(
    session: &ReconcileSession,
    existing: &OriginatingDataDescriptor,
    candidate: &IncomingOriginatingData,
) -> bool {
    is_match_originating_data(session, existing, candidate)
}

const SOURCE_ID_UNION: Merger<String> = Merger {
    name: "token union",
    apply: |left, right, _| union_source_ids(&left, &right),
};

pub fn find(
    session: &ReconcileSession,
    items: &[OriginatingDataDescriptor],
    candidate: &IncomingOriginatingData,
) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingOriginatingData,
    _matched: Option<&OriginatingDataDescriptor>,
) -> ReconcileResult<OriginatingDataDescriptor> {
    let record = match incoming {
        Incoming::Canonical(descriptor) => return Ok(descriptor),
        Incoming::Imported(record) => record,
    };

    let source_id = if source_id_tokens(&record.source_id).is_empty() {
        None
    } else {
        Some(record.source_id.clone())
    };
    let source_id = require(Table::OriginatingData, "sourceId", source_id, &record)?;
    let (id, is_new) = identity(session, record.id, record.is_new);

    Ok(OriginatingDataDescriptor {
        id,
        is_new,
        source_id,
        data: record.data,
    })
}

pub fn merge(
    session: &mut ReconcileSession,
    left: OriginatingDataDescriptor,
    right: OriginatingDataDescriptor,
) -> ReconcileResult<OriginatingDataDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let left_tokens = source_id_tokens(&left.source_id);
    let right_tokens = source_id_tokens(&right.source_id);

    let both_new = left.is_new && right.is_new;
    let merged = if right_tokens.is_subset(&left_tokens) {
        adopt(session, left, &right.id, both_new)
    } else if left_tokens.is_subset(&right_tokens) {
        adopt(session, right, &left.id, both_new)
    } else {
        let id = if both_new {
            let minted = session.mint_id();
            let registry = session.registry_mut();
            registry.absorb(Table::OriginatingData, &minted, &left.id);
            registry.absorb(Table::OriginatingData, &minted, &right.id);
            minted
        } else {
            FieldMerge::new(session, Table::OriginatingData, left.is_new, right.is_new)
                .identity(&left.id, &right.id)?
        };

        let mut fields = FieldMerge::new(session, Table::OriginatingData, left.is_new, right.is_new);
        let is_new = fields.is_new();
        let source_id =
            fields.required_with("sourceId", left.source_id, right.source_id, SOURCE_ID_UNION)?;
        let data = fields.required_with("data", left.data, right.data, Merger::concat())?;

        OriginatingDataDescriptor {
            id,
            is_new,
            source_id,
            data,
        }
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}

/// Keep `covering` wholesale, absorbing the other side's id
///
/// Only `is_new` is restamped: a merged record stays new only when both inputs were.
fn adopt(
    session: &mut ReconcileSession,
    mut covering: OriginatingDataDescriptor,
    covered_id: &str,
    both_new: bool,
) -> OriginatingDataDescriptor {
    debug!(kept = %covering.id, covered = %covered_id, "Provenance token set covers the other side");
    session
        .registry_mut()
        .absorb(Table::OriginatingData, &covering.id, covered_id);
    covering.is_new = both_new;
    covering
}

pub fn reconcile_originating_datas(
    session: &mut ReconcileSession,
    existing: Vec<OriginatingDataDescriptor>,
    sources: Vec<Vec<IntermediaryOriginatingData>>,
) -> ReconcileResult<Vec<OriginatingDataDescriptor>> {
    fold_sources(session, existing, sources, |session, running, incoming| {
        let incoming = incoming.into_iter().map(Incoming::Imported).collect();
        merge_lists(
            session,
            Table::OriginatingData,
            running,
            incoming,
            find,
            convert,
            merge,
        )
    })
}
