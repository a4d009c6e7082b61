//! Field Merger
//!
//! Per-field conflict resolution between two versions of the same record.
//!
//! **Merge Strategy:**
//! - Value present on both sides: delegate to the field's [`Merger`]
//! - Value present on one side: take it verbatim ("only available value")
//! - Value present on neither side: the field stays absent
//!
//! Which side a merger prefers is derived from newness ([`preference_for`]).
//! Every decision is appended to the session's change log as a MERGE entry.

use crate::change_log::ChangeType;
use crate::error::{ReconcileError, ReconcileResult};
use crate::reconcile::registry::IdSide;
use crate::session::{snapshot, ReconcileSession};
use crate::types::Table;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Side a merger should favour when values conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    Left,
    Right,
}

impl Preference {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Preference derived from each side's newness
///
/// With `prefer_new` the new side wins over the non-new side; without it the
/// non-new side wins. Equal newness always prefers the right (incoming) side.
pub fn preference_for(left_is_new: bool, right_is_new: bool, prefer_new: bool) -> Preference {
    if left_is_new == right_is_new {
        return Preference::Right;
    }
    let new_side = if left_is_new {
        Preference::Left
    } else {
        Preference::Right
    };
    if prefer_new {
        new_side
    } else {
        new_side.opposite()
    }
}

/// Value type a field can hold
pub trait FieldValue: Clone + Serialize {
    /// Blank values lose to non-blank ones under the default merger
    fn is_blank(&self) -> bool {
        false
    }
}

impl FieldValue for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl FieldValue for i64 {}
impl FieldValue for bool {}
impl FieldValue for DateTime<Utc> {}
impl FieldValue for BTreeSet<String> {}
impl FieldValue for Vec<Value> {}

impl FieldValue for Value {
    fn is_blank(&self) -> bool {
        self.is_null()
    }
}

/// Named two-sided merge function
#[derive(Clone, Copy)]
pub struct Merger<T> {
    pub name: &'static str,
    pub apply: fn(T, T, Preference) -> T,
}

impl<T: FieldValue> Merger<T> {
    /// Non-blank beats blank, otherwise honour the preference
    pub fn preferred() -> Self {
        Self {
            name: "preferred",
            apply: merge_preferred::<T>,
        }
    }
}

impl Merger<i64> {
    /// Larger of the two values
    pub fn maximum() -> Self {
        Self {
            name: "maximum",
            apply: |left, right, _| left.max(right),
        }
    }
}

impl Merger<BTreeSet<String>> {
    /// Union of both sets
    pub fn union() -> Self {
        Self {
            name: "union",
            apply: |mut left, right, _| {
                left.extend(right);
                left
            },
        }
    }
}

impl Merger<Vec<Value>> {
    /// Left entries followed by right entries
    pub fn concat() -> Self {
        Self {
            name: "concat",
            apply: |mut left, right, _| {
                left.extend(right);
                left
            },
        }
    }
}

/// Default merge behaviour
pub fn merge_preferred<T: FieldValue>(left: T, right: T, preference: Preference) -> T {
    match (left.is_blank(), right.is_blank()) {
        (true, false) => right,
        (false, true) => left,
        _ => match preference {
            Preference::Left => left,
            Preference::Right => right,
        },
    }
}

/// Merge one field, logging the decision
///
/// Returns `None` when neither side carries a value.
pub fn merge_field<T: FieldValue>(
    session: &mut ReconcileSession,
    table: Table,
    key: &str,
    left: Option<T>,
    right: Option<T>,
    preference: Preference,
    merger: Merger<T>,
) -> ReconcileResult<Option<T>> {
    let location = format!("{}.{}", table, key);
    let import_data = vec![snapshot(&left)?, snapshot(&right)?];

    let (value, description) = match (left, right) {
        (Some(left), Some(right)) => (
            (merger.apply)(left, right, preference),
            format!(
                "Merged field `{}` ({}, preferring {})",
                key,
                merger.name,
                preference.label()
            ),
        ),
        (Some(only), None) | (None, Some(only)) => (
            only,
            format!("Merged field `{}` (only available value)", key),
        ),
        (None, None) => return Ok(None),
    };

    debug!(location = %location, decision = %description, "Field merged");
    session.record(
        location,
        ChangeType::Merge,
        description,
        import_data,
        snapshot(&value)?,
    );
    Ok(Some(value))
}

/// Field-merge context for one pair of records
///
/// Fixes the table and the newness-derived preference so each field of the
/// pair is merged with a single call.
pub struct FieldMerge<'s> {
    session: &'s mut ReconcileSession,
    table: Table,
    left_is_new: bool,
    right_is_new: bool,
}

impl<'s> FieldMerge<'s> {
    pub fn new(
        session: &'s mut ReconcileSession,
        table: Table,
        left_is_new: bool,
        right_is_new: bool,
    ) -> Self {
        Self {
            session,
            table,
            left_is_new,
            right_is_new,
        }
    }

    /// Preference under the session's `prefer_new` setting
    pub fn preference(&self) -> Preference {
        preference_for(
            self.left_is_new,
            self.right_is_new,
            self.session.config().prefer_new,
        )
    }

    /// Merged newness: new only when both sides are new
    pub fn is_new(&self) -> bool {
        self.left_is_new && self.right_is_new
    }

    /// Surviving identifier of the pair; the loser is absorbed
    pub fn identity(&mut self, left_id: &str, right_id: &str) -> ReconcileResult<String> {
        let merged = self.session.registry_mut().merge_ids(
            self.table,
            IdSide::of(left_id, self.left_is_new),
            IdSide::of(right_id, self.right_is_new),
            false,
        )?;
        merged.ok_or(ReconcileError::MissingIdentifier { table: self.table })
    }

    /// Session access for nested list reconciliation
    pub fn session(&mut self) -> &mut ReconcileSession {
        self.session
    }

    pub fn optional<T: FieldValue>(
        &mut self,
        key: &str,
        left: Option<T>,
        right: Option<T>,
    ) -> ReconcileResult<Option<T>> {
        self.optional_with(key, left, right, Merger::preferred())
    }

    pub fn optional_with<T: FieldValue>(
        &mut self,
        key: &str,
        left: Option<T>,
        right: Option<T>,
        merger: Merger<T>,
    ) -> ReconcileResult<Option<T>> {
        let preference = self.preference();
        merge_field(self.session, self.table, key, left, right, preference, merger)
    }

    pub fn required<T: FieldValue>(&mut self, key: &str, left: T, right: T) -> ReconcileResult<T> {
        self.required_with(key, left, right, Merger::preferred())
    }

    pub fn required_with<T: FieldValue>(
        &mut self,
        key: &str,
        left: T,
        right: T,
        merger: Merger<T>,
    ) -> ReconcileResult<T> {
        let fallback = right.clone();
        let merged = self.optional_with(key, Some(left), Some(right), merger)?;
        Ok(merged.unwrap_or(fallback))
    }
}
