//! Identifier Equivalence Registry
//!
//! Records, per table, which identifiers have been absorbed into which
//! surviving identifier across merges, so an id that lost a merge keeps
//! resolving to the record that absorbed it.
//!
//! **Invariant:** absorption is transitive. Absorbing `x` into `y` moves every id
//! previously absorbed into `x` over to `y` and deletes `x`'s own entry, so an id
//! appears in at most one absorbed set per table.

use crate::error::{ReconcileError, ReconcileResult};
use crate::types::Table;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One side of an identifier merge
#[derive(Debug, Clone, Copy)]
pub struct IdSide<'a> {
    pub id: Option<&'a str>,
    pub is_new: bool,
}

impl<'a> IdSide<'a> {
    pub fn new(id: Option<&'a str>, is_new: bool) -> Self {
        Self { id, is_new }
    }

    /// Side of a canonical record (id always present)
    pub fn of(id: &'a str, is_new: bool) -> Self {
        Self { id: Some(id), is_new }
    }
}

/// Per-table map from surviving id to the ids absorbed into it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdRegistry {
    tables: BTreeMap<Table, BTreeMap<String, BTreeSet<String>>>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids absorbed into `id`
    pub fn absorbed_ids(&self, table: Table, id: &str) -> Option<&BTreeSet<String>> {
        self.tables.get(&table).and_then(|entries| entries.get(id))
    }

    /// Equal, or one has absorbed the other
    pub fn are_equivalent(&self, table: Table, a: &str, b: &str) -> bool {
        a == b
            || self
                .absorbed_ids(table, a)
                .is_some_and(|absorbed| absorbed.contains(b))
            || self
                .absorbed_ids(table, b)
                .is_some_and(|absorbed| absorbed.contains(a))
    }

    /// Surviving id for `id` (itself when never absorbed)
    pub fn resolve<'a>(&'a self, table: Table, id: &'a str) -> &'a str {
        self.tables
            .get(&table)
            .and_then(|entries| {
                entries
                    .iter()
                    .find(|(_, absorbed)| absorbed.contains(id))
                    .map(|(winner, _)| winner.as_str())
            })
            .unwrap_or(id)
    }

    /// Absorb `loser` (and everything it absorbed) into `winner`
    pub fn absorb(&mut self, table: Table, winner: &str, loser: &str) {
        if winner == loser {
            return;
        }

        let entries = self.tables.entry(table).or_default();
        let mut carried = entries.remove(loser).unwrap_or_default();
        carried.insert(loser.to_string());
        carried.remove(winner);

        debug!(
            table = %table,
            winner = %winner,
            loser = %loser,
            carried = carried.len(),
            "Absorbed identifier"
        );

        entries.entry(winner.to_string()).or_default().extend(carried);
    }

    /// Choose the surviving id of a merge and absorb the losing one
    ///
    /// **Precedence:**
    /// 1. Both sides have ids and differ in newness: the non-new (persisted) side wins
    /// 2. Both sides have ids and tie on newness: the left (accumulated) side wins
    /// 3. Only one side has an id: that id is used
    /// 4. Neither side has an id: [`ReconcileError::MissingIdentifier`], or `Ok(None)`
    ///    when `allow_missing` is set
    pub fn merge_ids(
        &mut self,
        table: Table,
        left: IdSide<'_>,
        right: IdSide<'_>,
        allow_missing: bool,
    ) -> ReconcileResult<Option<String>> {
        let (winner, loser) = match (left.id, right.id) {
            (Some(l), Some(r)) => {
                if left.is_new != right.is_new && left.is_new {
                    (r, Some(l))
                } else {
                    (l, Some(r))
                }
            }
            (Some(l), None) => (l, None),
            (None, Some(r)) => (r, None),
            (None, None) => {
                return if allow_missing {
                    Ok(None)
                } else {
                    Err(ReconcileError::MissingIdentifier { table })
                };
            }
        };

        if let Some(loser) = loser {
            self.absorb(table, winner, loser);
        }

        Ok(Some(winner.to_string()))
    }

    /// Total number of absorbed ids across all tables
    pub fn len(&self) -> usize {
        self.tables
            .values()
            .flat_map(|entries| entries.values())
            .map(BTreeSet::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Table = Table::ContentPerson;

    #[test]
    fn test_non_new_side_wins() {
        let mut registry = IdRegistry::new();
        let id = registry
            .merge_ids(T, IdSide::of("fresh", true), IdSide::of("P1", false), false)
            .unwrap();
        assert_eq!(id.as_deref(), Some("P1"));
        assert!(registry.are_equivalent(T, "P1", "fresh"));
    }

    #[test]
    fn test_tie_prefers_left() {
        let mut registry = IdRegistry::new();
        let id = registry
            .merge_ids(T, IdSide::of("A", false), IdSide::of("B", false), false)
            .unwrap();
        assert_eq!(id.as_deref(), Some("A"));

        let id = registry
            .merge_ids(T, IdSide::of("C", true), IdSide::of("D", true), false)
            .unwrap();
        assert_eq!(id.as_deref(), Some("C"));
    }

    #[test]
    fn test_single_sided_id_is_used_without_absorption() {
        let mut registry = IdRegistry::new();
        let id = registry
            .merge_ids(T, IdSide::new(None, false), IdSide::of("B", true), false)
            .unwrap();
        assert_eq!(id.as_deref(), Some("B"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_ids() {
        let mut registry = IdRegistry::new();
        let none = IdSide::new(None, false);
        assert!(matches!(
            registry.merge_ids(T, none, none, false),
            Err(ReconcileError::MissingIdentifier { table: Table::ContentPerson })
        ));
        assert_eq!(registry.merge_ids(T, none, none, true).unwrap(), None);
    }

    #[test]
    fn test_absorption_is_transitive() {
        let mut registry = IdRegistry::new();
        registry.absorb(T, "B", "C");
        registry.absorb(T, "A", "B");

        assert_eq!(
            registry.absorbed_ids(T, "A").cloned().unwrap(),
            BTreeSet::from(["B".to_string(), "C".to_string()])
        );
        assert!(registry.absorbed_ids(T, "B").is_none());
        assert_eq!(registry.resolve(T, "C"), "A");
        assert_eq!(registry.resolve(T, "Z"), "Z");
    }

    #[test]
    fn test_absorbing_former_winner_does_not_self_reference() {
        let mut registry = IdRegistry::new();
        registry.absorb(T, "A", "B");
        registry.absorb(T, "B", "A");

        let absorbed = registry.absorbed_ids(T, "B").unwrap();
        assert!(absorbed.contains("A"));
        assert!(!absorbed.contains("B"));
        assert!(registry.absorbed_ids(T, "A").is_none());
    }

    #[test]
    fn test_tables_are_independent() {
        let mut registry = IdRegistry::new();
        registry.absorb(Table::Tag, "A", "B");
        assert!(registry.are_equivalent(Table::Tag, "B", "A"));
        assert!(!registry.are_equivalent(Table::Room, "A", "B"));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut registry = IdRegistry::new();
        registry.absorb(Table::Tag, "A", "B");
        let json = serde_json::to_string(&registry).unwrap();
        assert_eq!(json, r#"{"Tag":{"A":["B"]}}"#);
        let back: IdRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, registry);
    }
}
