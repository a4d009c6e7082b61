//! Matching Strategy Library
//!
//! Pure predicates answering "do these two records denote the same entity?",
//! one identity signal each:
//! - identifier equality up to known merge history ([`is_match_id`])
//! - provenance token-set equality ([`is_match_originating_data_id`])
//! - case-insensitive exact string equality ([`is_match_string_exact`])
//! - gated edit-distance similarity ([`is_match_string_edit_distance`])
//!
//! Entity pipelines chain these through [`find_first_match`], whose matcher order
//! is significant: the first matcher that finds any hit wins.

use crate::session::ReconcileSession;
use crate::types::{Record, Table, SOURCE_ID_SEPARATOR};
use conflux_common::MatchingConfig;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::trace;

/// Matcher over (existing canonical record, incoming candidate)
pub type Matcher<T, D> = fn(&ReconcileSession, &D, &T) -> bool;

/// One named entry of an entity's ordered matcher list
pub struct MatchRule<T, D> {
    pub name: &'static str,
    pub matches: Matcher<T, D>,
}

/// Names of `rules`, in evaluation order
pub fn rule_names<T, D>(rules: &[MatchRule<T, D>]) -> Vec<&'static str> {
    rules.iter().map(|rule| rule.name).collect()
}

/// Affiliation placeholder used when synthesizing `"Name (Affiliation)"`
pub const NO_AFFILIATION: &str = "No affiliation";

/// Index of the first item satisfying `predicate`
pub fn find_match<D>(items: &[D], predicate: impl FnMut(&D) -> bool) -> Option<usize> {
    items.iter().position(predicate)
}

/// Run `matchers` in order; the first matcher with any hit decides
///
/// Each matcher scans the whole list before the next one is tried, so a weak
/// signal on an early item never beats a strong signal on a later one.
pub fn find_first_match<T, D>(
    session: &ReconcileSession,
    items: &[D],
    candidate: &T,
    rules: &[MatchRule<T, D>],
) -> Option<usize> {
    rules.iter().find_map(|rule| {
        let index = find_match(items, |item| (rule.matches)(session, item, candidate))?;
        trace!(rule = rule.name, index, "Matcher hit");
        Some(index)
    })
}

// ============================================================================
// Identifier matching
// ============================================================================

/// Identifiers equal, or either absorbed the other in `table`
pub fn is_match_id(
    session: &ReconcileSession,
    table: Table,
    a: Option<&str>,
    b: Option<&str>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => session.registry().are_equivalent(table, a, b),
        _ => false,
    }
}

/// [`is_match_id`] over two records of the same table
pub fn is_match_record_id(
    session: &ReconcileSession,
    table: Table,
    a: &impl Record,
    b: &impl Record,
) -> bool {
    is_match_id(session, table, a.id(), b.id())
}

// ============================================================================
// Provenance matching
// ============================================================================

/// Token set of a composite source id (order and duplicates irrelevant)
pub fn source_id_tokens(source_id: &str) -> BTreeSet<String> {
    source_id
        .split(SOURCE_ID_SEPARATOR)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Union of two composite source ids, left tokens first, deduplicated
pub fn union_source_ids(left: &str, right: &str) -> String {
    let mut seen = BTreeSet::new();
    let tokens: Vec<&str> = left
        .split(SOURCE_ID_SEPARATOR)
        .chain(right.split(SOURCE_ID_SEPARATOR))
        .map(str::trim)
        .filter(|token| !token.is_empty() && seen.insert(*token))
        .collect();
    tokens.join(&SOURCE_ID_SEPARATOR.to_string())
}

/// Two composite source ids denote the same provenance
pub fn is_match_source_ids(a: &str, b: &str) -> bool {
    let a = source_id_tokens(a);
    !a.is_empty() && a == source_id_tokens(b)
}

/// Provenance tokens a record claims, through its provenance record when known
fn provenance_tokens(session: &ReconcileSession, record: &impl Record) -> Option<BTreeSet<String>> {
    if let Some(od) = record
        .originating_data_id()
        .and_then(|id| session.find_originating_data(id))
    {
        return Some(source_id_tokens(&od.source_id));
    }
    record
        .originating_data_source_id()
        .map(source_id_tokens)
        .filter(|tokens| !tokens.is_empty())
}

/// Both records reference the same provenance
///
/// Resolves each side to its provenance record (direct id, absorption-aware),
/// then compares token sets. Sides whose provenance record is unknown fall back
/// to their raw source id.
pub fn is_match_originating_data_id(
    session: &ReconcileSession,
    a: &impl Record,
    b: &impl Record,
) -> bool {
    if is_match_id(
        session,
        Table::OriginatingData,
        a.originating_data_id(),
        b.originating_data_id(),
    ) {
        return true;
    }
    match (provenance_tokens(session, a), provenance_tokens(session, b)) {
        (Some(a), Some(b)) => !a.is_empty() && a.is_superset(&b) && b.is_superset(&a),
        _ => false,
    }
}

/// Two provenance records denote the same provenance
pub fn is_match_originating_data(
    session: &ReconcileSession,
    a: &impl Record,
    b: &impl Record,
) -> bool {
    if is_match_record_id(session, Table::OriginatingData, a, b) {
        return true;
    }
    match (a.originating_data_source_id(), b.originating_data_source_id()) {
        (Some(a), Some(b)) => is_match_source_ids(a, b),
        _ => false,
    }
}

// ============================================================================
// String matching
// ============================================================================

/// Case-insensitive equality; absent or empty values never match
pub fn is_match_string_exact(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
            a.to_lowercase() == b.to_lowercase()
        }
        _ => false,
    }
}

/// Fuzzy string match gated by length and edit distance
///
/// **All of the following must hold** (case-insensitive):
/// 1. The shorter string is longer than `fuzzy_min_length` characters
/// 2. `|len(a) - len(b)| / min(len)` is below `max_length_ratio`
/// 3. `levenshtein(a, b) / max(len)` is below `max_edit_ratio`
///
/// Then a digit guard applies: `a` with every run of digits replaced by a digit
/// wildcard, anchored at both ends, must NOT match `b`. "Session 1" and
/// "Session 2" are different sessions however close their spelling.
pub fn is_match_string_edit_distance(
    config: &MatchingConfig,
    a: Option<&str>,
    b: Option<&str>,
) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    let shorter = len_a.min(len_b);
    let longer = len_a.max(len_b);

    if shorter <= config.fuzzy_min_length {
        return false;
    }

    let length_ratio = (longer - shorter) as f64 / shorter as f64;
    if length_ratio >= config.max_length_ratio {
        return false;
    }

    let edit_ratio = strsim::levenshtein(&a, &b) as f64 / longer as f64;
    if edit_ratio >= config.max_edit_ratio {
        return false;
    }

    !differs_only_in_digits(&a, &b)
}

/// Anchored regex from `a` with digit runs as wildcards
fn digit_wildcard_pattern(a: &str) -> String {
    let mut pattern = String::from("^");
    let mut in_digits = false;
    for ch in a.chars() {
        if ch.is_ascii_digit() {
            if !in_digits {
                pattern.push_str(r"\d+");
                in_digits = true;
            }
        } else {
            in_digits = false;
            pattern.push_str(&regex::escape(ch.encode_utf8(&mut [0u8; 4])));
        }
    }
    pattern.push('$');
    pattern
}

fn differs_only_in_digits(a: &str, b: &str) -> bool {
    Regex::new(&digit_wildcard_pattern(a))
        .map(|re| re.is_match(b))
        .unwrap_or(false)
}

// ============================================================================
// Name + affiliation matching
// ============================================================================

/// `"Name (Affiliation)"`, or `"Name (No affiliation)"`
pub fn format_name_affiliation(name: &str, affiliation: Option<&str>) -> String {
    let affiliation = affiliation
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(NO_AFFILIATION);
    format!("{} ({})", name.trim(), affiliation)
}

/// Split at the first `(` into trimmed name and affiliation parts
pub fn split_name_affiliation(value: &str) -> (&str, &str) {
    match value.split_once('(') {
        Some((name, affiliation)) => (name.trim(), affiliation.trim().trim_end_matches(')').trim()),
        None => (value.trim(), ""),
    }
}

fn is_match_part(config: &MatchingConfig, a: &str, b: &str) -> bool {
    is_match_string_exact(Some(a), Some(b))
        || is_match_string_edit_distance(config, Some(a), Some(b))
}

/// Synthesized name-affiliation strings denote the same person
///
/// Exact (case-insensitive) equality matches outright. Otherwise the whole
/// strings must fuzzy-match AND the name part and affiliation part must each
/// match on their own, so a long noisy affiliation cannot carry two different
/// names over the threshold.
pub fn is_match_name_affiliation(config: &MatchingConfig, a: Option<&str>, b: Option<&str>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };
    if is_match_string_exact(Some(a), Some(b)) {
        return true;
    }
    if !is_match_string_edit_distance(config, Some(a), Some(b)) {
        return false;
    }
    let (name_a, affiliation_a) = split_name_affiliation(a);
    let (name_b, affiliation_b) = split_name_affiliation(b);
    is_match_part(config, name_a, name_b) && is_match_part(config, affiliation_a, affiliation_b)
}
