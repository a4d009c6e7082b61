//! Uploaders of a required content item

use super::{identity, match_id, or_matched, require};
use crate::error::ReconcileResult;
use crate::reconcile::field::FieldMerge;
use crate::reconcile::lists::record_merge;
use crate::reconcile::matching::{find_first_match, is_match_string_exact, MatchRule};
use crate::session::{snapshot, ReconcileSession};
use crate::types::{Incoming, IntermediaryUploader, Table, UploaderDescriptor};

pub type IncomingUploader = Incoming<IntermediaryUploader, UploaderDescriptor>;

pub const MATCHERS: &[MatchRule<IncomingUploader, UploaderDescriptor>] = &[
    MatchRule {
        name: "id",
        matches: match_id,
    },
    MatchRule {
        name: "email",
        matches: match_email,
    },
];

fn match_email(_: &ReconcileSession, existing: &UploaderDescriptor, candidate: &IncomingUploader) -> bool {
    let email = match candidate {
        Incoming::Imported(record) => record.email.as_deref(),
        Incoming::Canonical(uploader) => Some(uploader.email.as_str()),
    };
    is_match_string_exact(Some(&existing.email), email)
}

pub fn find(
    session: &ReconcileSession,
    items: &[UploaderDescriptor],
    candidate: &IncomingUploader,
) -> Option<usize> {
    find_first_match(session, items, candidate, MATCHERS)
}

pub fn convert(
    session: &mut ReconcileSession,
    incoming: IncomingUploader,
    matched: Option<&UploaderDescriptor>,
) -> ReconcileResult<UploaderDescriptor> {
    let record = match incoming {
        Incoming::Canonical(descriptor) => return Ok(descriptor),
        Incoming::Imported(record) => record,
    };

    let email = require(Table::Uploader, "email", record.email.clone(), &record)?;
    let (id, is_new) = identity(session, record.id, record.is_new);
    Ok(UploaderDescriptor {
        id,
        is_new,
        name: or_matched(record.name, matched, |u| u.name.clone(), || email.clone()),
        email,
        email_sent: or_matched(record.email_sent, matched, |u| u.email_sent, || false),
    })
}

pub fn merge(
    session: &mut ReconcileSession,
    left: UploaderDescriptor,
    right: UploaderDescriptor,
) -> ReconcileResult<UploaderDescriptor> {
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];
    let mut fields = FieldMerge::new(session, Table::Uploader, left.is_new, right.is_new);

    let merged = UploaderDescriptor {
        id: fields.identity(&left.id, &right.id)?,
        is_new: fields.is_new(),
        email: fields.required("email", left.email, right.email)?,
        name: fields.required("name", left.name, right.name)?,
        email_sent: fields.required("emailSent", left.email_sent, right.email_sent)?,
    };

    record_merge(session, import_data, &merged)?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::matching::rule_names;
    use conflux_common::MatchingConfig;

    #[test]
    fn test_matcher_order() {
        assert_eq!(rule_names(MATCHERS), ["id", "email"]);
    }

    #[test]
    fn test_convert_defaults_name_to_email() {
        let mut session = ReconcileSession::new(MatchingConfig::default());
        let uploader = convert(
            &mut session,
            Incoming::Imported(IntermediaryUploader {
                email: Some("ada@example.org".into()),
                ..Default::default()
            }),
            None,
        )
        .unwrap();

        assert_eq!(uploader.name, "ada@example.org");
        assert!(uploader.is_new);
        assert!(!uploader.email_sent);
    }

    #[test]
    fn test_email_match_is_case_insensitive() {
        let session = ReconcileSession::new(MatchingConfig::default());
        let existing = vec![UploaderDescriptor {
            id: "U1".into(),
            is_new: false,
            email: "Ada@Example.org".into(),
            name: "Ada".into(),
            email_sent: true,
        }];
        let candidate = Incoming::Imported(IntermediaryUploader {
            email: Some("ada@example.org".into()),
            ..Default::default()
        });
        assert_eq!(find(&session, &existing, &candidate), Some(0));
    }
}
