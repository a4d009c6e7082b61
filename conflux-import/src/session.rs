//! Reconciliation session context
//!
//! One session per batch. The session owns every piece of mutable state a
//! pipeline touches: the identifier registry, the change log, the id generator
//! and the already-reconciled lookup collections later pipelines resolve
//! references against. It is passed by `&mut` to every pipeline call.

use crate::change_log::{ChangeLog, ChangeType};
use crate::error::ReconcileResult;
use crate::reconcile::matching::source_id_tokens;
use crate::reconcile::registry::IdRegistry;
use crate::types::{
    ContentGroupDescriptor, HallwayDescriptor, OriginatingDataDescriptor, PersonDescriptor,
    RoomDescriptor, Table, TagDescriptor,
};
use conflux_common::uuid_utils;
use conflux_common::MatchingConfig;
use serde::Serialize;
use serde_json::Value;

/// Source of fresh identifiers
#[derive(Debug, Clone, Default)]
pub enum IdGenerator {
    /// UUIDv4 strings
    #[default]
    Random,
    /// `"{prefix}{n}"` for n = 1, 2, ... (deterministic replay)
    Sequential { prefix: String, next: u64 },
}

impl IdGenerator {
    /// Deterministic generator; the prefix must not collide with existing ids
    pub fn sequential(prefix: impl Into<String>) -> Self {
        Self::Sequential {
            prefix: prefix.into(),
            next: 1,
        }
    }

    pub fn mint(&mut self) -> String {
        match self {
            Self::Random => uuid_utils::generate_string(),
            Self::Sequential { prefix, next } => {
                let id = format!("{}{}", prefix, next);
                *next += 1;
                id
            }
        }
    }
}

/// Collections already reconciled earlier in the batch
///
/// Later pipelines resolve provenance, names and source ids against these.
#[derive(Debug, Clone, Default)]
pub struct KnownRecords {
    pub originating_datas: Vec<OriginatingDataDescriptor>,
    pub tags: Vec<TagDescriptor>,
    pub hallways: Vec<HallwayDescriptor>,
    pub people: Vec<PersonDescriptor>,
    pub rooms: Vec<RoomDescriptor>,
    pub content_groups: Vec<ContentGroupDescriptor>,
}

/// Mutable state threaded through one batch
#[derive(Debug)]
pub struct ReconcileSession {
    config: MatchingConfig,
    registry: IdRegistry,
    log: ChangeLog,
    ids: IdGenerator,
    known: KnownRecords,
}

impl ReconcileSession {
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            config,
            registry: IdRegistry::default(),
            log: ChangeLog::new(),
            ids: IdGenerator::default(),
            known: KnownRecords::default(),
        }
    }

    /// Start from a registry persisted by a previous batch
    pub fn with_registry(mut self, registry: IdRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut IdRegistry {
        &mut self.registry
    }

    pub fn log(&self) -> &ChangeLog {
        &self.log
    }

    pub fn known(&self) -> &KnownRecords {
        &self.known
    }

    pub fn known_mut(&mut self) -> &mut KnownRecords {
        &mut self.known
    }

    /// Mint a fresh identifier
    pub fn mint_id(&mut self) -> String {
        self.ids.mint()
    }

    /// Append a change-log entry
    pub fn record(
        &mut self,
        location: impl Into<String>,
        change_type: ChangeType,
        description: impl Into<String>,
        import_data: Vec<Value>,
        new_data: Value,
    ) {
        self.log
            .record(location, change_type, description, import_data, new_data);
    }

    /// Provenance record with this id, or one that absorbed it
    pub fn find_originating_data(&self, id: &str) -> Option<&OriginatingDataDescriptor> {
        self.known
            .originating_datas
            .iter()
            .find(|od| od.id == id)
            .or_else(|| {
                self.known.originating_datas.iter().find(|od| {
                    self.registry
                        .are_equivalent(Table::OriginatingData, &od.id, id)
                })
            })
    }

    /// Provenance record whose source-id token set equals `source_id`'s
    pub fn find_originating_data_by_source(
        &self,
        source_id: &str,
    ) -> Option<&OriginatingDataDescriptor> {
        let tokens = source_id_tokens(source_id);
        if tokens.is_empty() {
            return None;
        }
        self.known
            .originating_datas
            .iter()
            .find(|od| source_id_tokens(&od.source_id) == tokens)
    }

    /// Consume the session, yielding the change log and final registry
    pub fn into_parts(self) -> (ChangeLog, IdRegistry) {
        (self.log, self.registry)
    }
}

/// Render a record for the change log
pub fn snapshot<T: Serialize + ?Sized>(value: &T) -> ReconcileResult<Value> {
    Ok(serde_json::to_value(value)?)
}
