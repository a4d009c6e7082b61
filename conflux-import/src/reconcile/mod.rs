//! Generic reconciliation primitives
//!
//! Leaves first: matching predicates, the identifier registry, the field
//! merger and the list reconciler. Entity pipelines compose these.

pub mod field;
pub mod lists;
pub mod matching;
pub mod registry;

pub use field::{preference_for, FieldMerge, Merger, Preference};
pub use lists::{fold_sources, merge_lists};
pub use registry::{IdRegistry, IdSide};
