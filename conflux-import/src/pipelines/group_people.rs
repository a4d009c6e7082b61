//! People linked to a content group
//!
//! Links have no name of their own. After id, the find chain compares the
//! linked person (absorption-aware), then the linked person's
//! `"Name (Affiliation)"` against the incoming link's.

use super::{identity, match_id, or_matched, people::name_affiliation};
use crate::error::{ReconcileError, ReconcileResult};
use crate::reconcile::field::FieldMerge;
use crate::reconcile::lists::record_merge;
use crate::reconcile::matching::{find_first_match, is_match_id, is_match_name_affiliation, MatchRule};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{GroupPersonDescriptor, Incoming, IntermediaryGroupPerson, PersonDescriptor, Table};

pub type IncomingGroupPerson = Incoming<IntermediaryGroupPerson, GroupPersonDescriptor>;

pub const DEFAULT_ROLE: &str = "AUTHOR";

pub const MATCHERS: &[MatchRule<IncomingGroupPerson, GroupPersonDescriptor>] = &[
    MatchRule {
        name: "id",
        matches: match_id,
    },
    MatchRule {
        name: "person_id",
        matches: match_person_id,
    },
    MatchRule {
        name: "name_affiliation",
        matches: match_name_affiliation,
    },
];

fn candidate_person_id(candidate: &IncomingGroupPerson) -> Option<&str> {
    match candidate {
        Incoming::Imported(record) => record.person_id.as_deref(),
        Incoming::Canonical(link) => Some(&link.person_id),
    }
}

/// Known person `id` refers to, directly or through absorption
fn known_person<'a>(session: &'a ReconcileSession, id: &str) -> Option<&'a PersonDescriptor> {
    session
        .known()
        .people
        .iter()
        .find(|person| is_match_id(session, Table::ContentPerson, Some(&person.id), Some(id)))
}

fn match_person_id(
    session: &ReconcileSession,
    existing: &GroupPersonDescriptor,
    candidate: &IncomingGroupPerson,
) -> bool {
    is_match_id(
        session,
        Table::ContentPerson,
        Some(&existing.person_id),
        candidate_person_id(candidate),
    )
}

fn match_name_affiliation(
    session: &ReconcileSession,
    existing: &GroupPersonDescriptor,
    candidate: &IncomingGroupPerson,
) -> bool {
    let Some(existing) = known_person(session, &existing.person_id).map(name_affiliation) else {
        return false;
    };
    let candidate = match candidate {
        Incoming::Imported(IntermediaryGroupPerson {
            name_affiliation: Some(value),
            ..
        }) => Some(value.clone()),
        _ => candidate_person_id(candidate)
            .and_then(|id| known_person(session, id))
            .map(name_affiliation),
    };
    is_match_name_affiliation(session.config(), Some(&existing), candidate.as_deref())
}

pub fn find(
    session: &ReconcileSession,
    items: &[GroupPersonDescriptor],
    candidate: &IncomingGroupPerson,
) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

/// Person id of an imported link, by explicit id or by name-affiliation
fn resolve_person(session: &ReconcileSession, record: &IntermediaryGroupPerson) -> ReconcileResult<String> {
    if let Some(id) = &record.person_id {
        return Ok(session.registry().resolve(Table::ContentPerson, id).to_string());
    }
    let Some(wanted) = record.name_affiliation.as_deref() else {
        return Err(ReconcileError::MissingField {
            table: Table::ContentGroupPerson,
            field: "personId",
            record: snapshot(record)?,
        });
    };
    let found = session.known().people.iter().find(|person| {
        is_match_name_affiliation(session.config(), Some(&name_affiliation(person)), Some(wanted))
    });
    match found {
        Some(person) => Ok(person.id.clone()),
        None => Err(ReconcileError::UnresolvedReference {
            table: Table::ContentGroupPerson,
            kind: "person",
            reference: wanted.to_string(),
            record: snapshot(record)?,
        }),
    }
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingGroupPerson,
    matched: Option<&GroupPersonDescriptor>,
) -> ReconcileResult<GroupPersonDescriptor> {
    match incoming {
        Incoming::Canonical(mut descriptor) => {
            descriptor.person_id = session
                .registry()
                .resolve(Table::ContentPerson, &descriptor.person_id)
                .to_string();
            Ok(descriptor)
        }
        Incoming::Imported(record) => {
            let person_id = resolve_person(session, &record)?;
            let (id, is_new) = identity(session, record.id, record.is_new);
            Ok(GroupPersonDescriptor {
                id,
                is_new,
                person_id,
                role_name: or_matched(record.role_name, matched, |p| p.role_name.clone(), || {
                    DEFAULT_ROLE.to_string()
                }),
                priority: record.priority,
            })
        }
    }
}

pub fn merge(
    session: &mut ReconcileSession,
    left: GroupPersonDescriptor,
    right: GroupPersonDescriptor,
) -> ReconcileResult<GroupPersonDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::ContentGroupPerson, left.is_new, right.is_new);

    let merged = GroupPersonDescriptor {
        id: fields.identity(&left.id, &right.id)?,
        is_new: fields.is_new(),
        person_id: fields.required("personId", left.person_id, right.person_id)?,
        role_name: fields.required("roleName", left.role_name, right.role_name)?,
        priority: fields.optional("priority", left.priority, right.priority)?,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}
