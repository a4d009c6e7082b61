//! # Conflux Import
//!
//! Reconciles records parsed from conference-program import files into the
//! canonical collections of an event.
//!
//! A batch runs one pipeline per entity kind in dependency order. Every
//! pipeline matches incoming records against the running result, merges hits
//! field by field, inserts misses and records each decision in a change log.
//! Identifiers that lose a merge are absorbed into the survivor's registry
//! entry so later references to them still resolve.

pub mod batch;
pub mod change_log;
pub mod error;
pub mod pipelines;
pub mod reconcile;
pub mod session;
pub mod types;

pub use batch::{reconcile_batch, reconcile_content, reconcile_schedule, BatchSummary, ReconcileOutput, Scope};
pub use change_log::{ChangeLog, ChangeSummary, ChangeType};
pub use error::{ItemCandidate, ReconcileError, ReconcileResult};
pub use reconcile::registry::IdRegistry;
pub use session::{IdGenerator, KnownRecords, ReconcileSession};
pub use types::{CanonicalCollections, ImportBatch, Incoming, IntermediaryBatch, Table};
