//! People
//!
//! People carry no unique natural key, so after id and provenance the find
//! chain compares synthesized `"Name (Affiliation)"` strings, with the name
//! and affiliation parts validated separately.

use super::{identity, match_id, match_provenance, require, resolve_originating_data};
use crate::error::ReconcileResult;
use crate::reconcile::field::FieldMerge;
use crate::reconcile::lists::{fold_sources, merge_lists, record_merge};
use crate::reconcile::matching::{
    find_first_match, format_name_affiliation, is_match_name_affiliation, MatchRule,
};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{Incoming, IntermediaryPerson, PersonDescriptor, Table};

pub type IncomingPerson = Incoming<IntermediaryPerson, PersonDescriptor>;

pub const MATCHERS: &[MatchRule<IncomingPerson, PersonDescriptor>] = &[
    MatchRule {
        name: "id",
        matches: match_id,
    },
    MatchRule {
        name: "provenance",
        matches: match_provenance,
    },
    MatchRule {
        name: "name_affiliation",
        matches: match_name_affiliation,
    },
];

/// `"Name (Affiliation)"` of a canonical person
pub fn name_affiliation(person: &PersonDescriptor) -> String {
    format_name_affiliation(&person.name, person.affiliation.as_deref())
}

fn incoming_name_affiliation(candidate: &IncomingPerson) -> Option<String> {
    match candidate {
        Incoming::Imported(record) => record
            .name
            .as_deref()
            .map(|name| format_name_affiliation(name, record.affiliation.as_deref())),
        Incoming::Canonical(person) => Some(name_affiliation(person)),
    }
}

fn match_name_affiliation(
    session: &ReconcileSession,
    existing: &PersonDescriptor,
    candidate: &IncomingPerson,
) -> bool {
    let existing = name_affiliation(existing);
    is_match_name_affiliation(
        session.config(),
        Some(&existing),
        incoming_name_affiliation(candidate).as_deref(),
    )
}

pub fn find(
    session: &ReconcileSession,
    items: &[PersonDescriptor],
    candidate: &IncomingPerson,
) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingPerson,
    _matched: Option<&PersonDescriptor>,
) -> ReconcileResult<PersonDescriptor> {
    match incoming {
        Incoming::Canonical(mut descriptor) => {
            descriptor.originating_data_id = resolve_originating_data(
                session,
                Table::ContentPerson,
                descriptor.originating_data_id,
                None,
            );
            Ok(descriptor)
        }
        Incoming::Imported(record) => {
            let name = require(Table::ContentPerson, "name", record.name.clone(), &record)?;
            let originating_data_id = resolve_originating_data(
                session,
                Table::ContentPerson,
                record.originating_data_id.clone(),
                record.originating_data_source_id.as_deref(),
            );
            let (id, is_new) = identity(session, record.id, record.is_new);
            Ok(PersonDescriptor {
                id,
                is_new,
                name,
                affiliation: record.affiliation,
                email: record.email,
                originating_data_id,
            })
        }
    }
}

pub fn merge(
    session: &mut ReconcileSession,
    left: PersonDescriptor,
    right: PersonDescriptor,
) -> ReconcileResult<PersonDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::ContentPerson, left.is_new, right.is_new);

    let merged = PersonDescriptor {
        id: fields.identity(&left.id, &right.id)?,
        is_new: fields.is_new(),
        name: fields.required("name", left.name, right.name)?,
        affiliation: fields.optional("affiliation", left.affiliation, right.affiliation)?,
        email: fields.optional("email", left.email, right.email)?,
        originating_data_id: fields.optional(
            "originatingDataId",
            left.originating_data_id,
            right.originating_data_id,
        )?,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}

pub fn reconcile_people(
    session: &mut ReconcileSession,
    existing: Vec<PersonDescriptor>,
    sources: Vec<Vec<IntermediaryPerson>>,
) -> ReconcileResult<Vec<PersonDescriptor>> {
    fold_sources(session, existing, sources, |session, running, incoming| {
        let incoming = incoming.into_iter().map(Incoming::Imported).collect();
        merge_lists(
            session,
            Table::ContentPerson,
            running,
            incoming,
            find,
            convert,
            merge,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::matching::rule_names;
    use conflux_common::MatchingConfig;
    use pretty_assertions::assert_eq;

    fn person(id: &str, name: &str, affiliation: Option<&str>) -> PersonDescriptor {
        PersonDescriptor {
            id: id.into(),
            is_new: false,
            name: name.into(),
            affiliation: affiliation.map(str::to_string),
            email: None,
            originating_data_id: None,
        }
    }

    fn imported(name: &str, affiliation: Option<&str>) -> IntermediaryPerson {
        IntermediaryPerson {
            name: Some(name.into()),
            affiliation: affiliation.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_matcher_order() {
        assert_eq!(rule_names(MATCHERS), ["id", "provenance", "name_affiliation"]);
    }

    #[test]
    fn test_same_name_different_affiliation_is_new_person() {
        let mut session = ReconcileSession::new(MatchingConfig::default());
        let result = reconcile_people(
            &mut session,
            vec![person("P1", "Alex Kim", Some("Acme"))],
            vec![vec![imported("Alex Kim", Some("Globex"))]],
        )
        .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_missing_affiliation_matches_placeholder() {
        let mut session = ReconcileSession::new(MatchingConfig::default());
        let result = reconcile_people(
            &mut session,
            vec![person("P1", "Alex Kim", None)],
            vec![vec![IntermediaryPerson {
                email: Some("alex@example.org".into()),
                ..imported("alex kim", None)
            }]],
        )
        .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "P1");
        assert_eq!(result[0].email.as_deref(), Some("alex@example.org"));
    }

    #[test]
    fn test_sources_fold_sequentially() {
        let mut session = ReconcileSession::new(MatchingConfig::default());
        let result = reconcile_people(
            &mut session,
            vec![],
            vec![
                vec![imported("Maria Garcia", Some("University of Leeds"))],
                vec![imported("Maria Garcia", Some("University of Leeds"))],
            ],
        )
        .unwrap();

        assert_eq!(result.len(), 1);
        assert!(result[0].is_new);
    }
}
