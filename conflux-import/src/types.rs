//! Record shapes consumed and produced by the reconciliation engine
//!
//! Every entity kind has two shapes:
//! - a canonical `*Descriptor` (all required fields present, exactly one `id`)
//! - an `Intermediary*` record as produced by the import-file parser (fields
//!   optional, plus source-only reference fields such as `tag_names`)
//!
//! [`Incoming`] is the sum of both shapes. The per-entity `convert` function is
//! the single place where an `Incoming` value is normalized into a descriptor.
//!
//! All shapes (de)serialize as camelCase JSON. `isNew` is omitted when false.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Separator between origin-system record ids inside a composite `sourceId`
pub const SOURCE_ID_SEPARATOR: char = '¬';

/// Entity tables known to the engine
///
/// Used as change-log location and as the key space of the identifier registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Table {
    OriginatingData,
    Tag,
    Hallway,
    ContentPerson,
    Room,
    Event,
    ContentGroup,
    ContentItem,
    RequiredContentItem,
    Uploader,
    ContentGroupPerson,
    ContentGroupHallway,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::OriginatingData => "OriginatingData",
            Self::Tag => "Tag",
            Self::Hallway => "Hallway",
            Self::ContentPerson => "ContentPerson",
            Self::Room => "Room",
            Self::Event => "Event",
            Self::ContentGroup => "ContentGroup",
            Self::ContentItem => "ContentItem",
            Self::RequiredContentItem => "RequiredContentItem",
            Self::Uploader => "Uploader",
            Self::ContentGroupPerson => "ContentGroupPerson",
            Self::ContentGroupHallway => "ContentGroupHallway",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

// ============================================================================
// Record views (used by matchers)
// ============================================================================

/// Identity signals a matcher can read from either record shape
pub trait Record {
    /// Identifier, if the record carries one
    fn id(&self) -> Option<&str>;

    /// Direct reference to a provenance record
    fn originating_data_id(&self) -> Option<&str> {
        None
    }

    /// Raw composite source id (intermediary records only)
    fn originating_data_source_id(&self) -> Option<&str> {
        None
    }
}

/// Canonical record shape
pub trait Descriptor: Record + Clone + Serialize {
    /// Table this descriptor lives in
    const TABLE: Table;

    /// Identifier (always present on a descriptor)
    fn descriptor_id(&self) -> &str;

    /// Whether the record was minted during this batch
    fn is_new(&self) -> bool;
}

/// Display name a matcher can compare
pub trait Named {
    fn name(&self) -> Option<&str>;
}

/// Either a freshly imported record or an already-canonical one
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Incoming<I, D> {
    Imported(I),
    Canonical(D),
}

impl<I: Record, D: Record> Record for Incoming<I, D> {
    fn id(&self) -> Option<&str> {
        match self {
            Self::Imported(i) => i.id(),
            Self::Canonical(d) => d.id(),
        }
    }

    fn originating_data_id(&self) -> Option<&str> {
        match self {
            Self::Imported(i) => i.originating_data_id(),
            Self::Canonical(d) => d.originating_data_id(),
        }
    }

    fn originating_data_source_id(&self) -> Option<&str> {
        match self {
            Self::Imported(i) => i.originating_data_source_id(),
            Self::Canonical(d) => d.originating_data_source_id(),
        }
    }
}

impl<I: Named, D: Named> Named for Incoming<I, D> {
    fn name(&self) -> Option<&str> {
        match self {
            Self::Imported(i) => i.name(),
            Self::Canonical(d) => d.name(),
        }
    }
}

/// Implements [`Named`] over a required (descriptor) or optional field
macro_rules! named {
    ($ty:ty, $field:ident, required) => {
        impl Named for $ty {
            fn name(&self) -> Option<&str> {
                Some(&self.$field)
            }
        }
    };
    ($ty:ty, $field:ident, optional) => {
        impl Named for $ty {
            fn name(&self) -> Option<&str> {
                self.$field.as_deref()
            }
        }
    };
}

/// Implements [`Record`] and [`Descriptor`] for a canonical struct
macro_rules! descriptor {
    ($ty:ty, $table:expr) => {
        impl Record for $ty {
            fn id(&self) -> Option<&str> {
                Some(&self.id)
            }
        }

        impl Descriptor for $ty {
            const TABLE: Table = $table;

            fn descriptor_id(&self) -> &str {
                &self.id
            }

            fn is_new(&self) -> bool {
                self.is_new
            }
        }
    };
    ($ty:ty, $table:expr, provenance) => {
        impl Record for $ty {
            fn id(&self) -> Option<&str> {
                Some(&self.id)
            }

            fn originating_data_id(&self) -> Option<&str> {
                self.originating_data_id.as_deref()
            }
        }

        impl Descriptor for $ty {
            const TABLE: Table = $table;

            fn descriptor_id(&self) -> &str {
                &self.id
            }

            fn is_new(&self) -> bool {
                self.is_new
            }
        }
    };
}

/// Implements [`Record`] for an intermediary struct
macro_rules! intermediary {
    ($ty:ty) => {
        impl Record for $ty {
            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }
        }
    };
    ($ty:ty, provenance) => {
        impl Record for $ty {
            fn id(&self) -> Option<&str> {
                self.id.as_deref()
            }

            fn originating_data_id(&self) -> Option<&str> {
                self.originating_data_id.as_deref()
            }

            fn originating_data_source_id(&self) -> Option<&str> {
                self.originating_data_source_id.as_deref()
            }
        }
    };
}

// ============================================================================
// Provenance
// ============================================================================

/// Provenance record: which origin-system records contributed to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginatingDataDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    /// Composite key of origin-system record ids joined by [`SOURCE_ID_SEPARATOR`]
    pub source_id: String,
    /// One opaque payload fragment per contributing source record
    #[serde(default)]
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryOriginatingData {
    pub id: Option<String>,
    pub is_new: bool,
    pub source_id: String,
    pub data: Vec<Value>,
}

impl Record for OriginatingDataDescriptor {
    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn originating_data_source_id(&self) -> Option<&str> {
        Some(&self.source_id)
    }
}

impl Descriptor for OriginatingDataDescriptor {
    const TABLE: Table = Table::OriginatingData;

    fn descriptor_id(&self) -> &str {
        &self.id
    }

    fn is_new(&self) -> bool {
        self.is_new
    }
}

impl Record for IntermediaryOriginatingData {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn originating_data_source_id(&self) -> Option<&str> {
        Some(&self.source_id)
    }
}

// ============================================================================
// Lookup tables
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub name: String,
    pub colour: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_data_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryTag {
    pub id: Option<String>,
    pub is_new: bool,
    pub name: Option<String>,
    pub colour: Option<String>,
    pub originating_data_id: Option<String>,
    pub originating_data_source_id: Option<String>,
}

descriptor!(TagDescriptor, Table::Tag, provenance);
intermediary!(IntermediaryTag, provenance);
named!(TagDescriptor, name, required);
named!(IntermediaryTag, name, optional);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HallwayDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub name: String,
    pub colour: String,
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_data_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryHallway {
    pub id: Option<String>,
    pub is_new: bool,
    pub name: Option<String>,
    pub colour: Option<String>,
    pub priority: Option<i64>,
    pub originating_data_id: Option<String>,
    pub originating_data_source_id: Option<String>,
}

descriptor!(HallwayDescriptor, Table::Hallway, provenance);
intermediary!(IntermediaryHallway, provenance);
named!(HallwayDescriptor, name, required);
named!(IntermediaryHallway, name, optional);

// ============================================================================
// People
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_data_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryPerson {
    pub id: Option<String>,
    pub is_new: bool,
    pub name: Option<String>,
    pub affiliation: Option<String>,
    pub email: Option<String>,
    pub originating_data_id: Option<String>,
    pub originating_data_source_id: Option<String>,
}

descriptor!(PersonDescriptor, Table::ContentPerson, provenance);
intermediary!(IntermediaryPerson, provenance);
named!(PersonDescriptor, name, required);
named!(IntermediaryPerson, name, optional);

// ============================================================================
// Schedule
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_data_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryRoom {
    pub id: Option<String>,
    pub is_new: bool,
    pub name: Option<String>,
    pub capacity: Option<i64>,
    pub priority: Option<i64>,
    pub originating_data_id: Option<String>,
    pub originating_data_source_id: Option<String>,
}

descriptor!(RoomDescriptor, Table::Room, provenance);
intermediary!(IntermediaryRoom, provenance);
named!(RoomDescriptor, name, required);
named!(IntermediaryRoom, name, optional);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub room_id: String,
    pub intended_room_mode: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hallway_id: Option<String>,
    #[serde(default)]
    pub tag_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_data_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryEvent {
    pub id: Option<String>,
    pub is_new: bool,
    pub room_id: Option<String>,
    /// Resolved to `room_id` by exact name lookup
    pub room_name: Option<String>,
    pub intended_room_mode: Option<String>,
    pub name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub content_group_id: Option<String>,
    /// Resolved to `content_group_id` through the provenance of known items
    pub item_source_id: Option<String>,
    pub hallway_id: Option<String>,
    pub hallway_name: Option<String>,
    pub tag_ids: Option<BTreeSet<String>>,
    /// Resolved to tag ids by exact name lookup
    pub tag_names: Option<Vec<String>>,
    pub originating_data_id: Option<String>,
    pub originating_data_source_id: Option<String>,
}

descriptor!(EventDescriptor, Table::Event, provenance);
intermediary!(IntermediaryEvent, provenance);
named!(EventDescriptor, name, required);
named!(IntermediaryEvent, name, optional);

// ============================================================================
// Content
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub name: String,
    pub content_type_name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_data: Option<Value>,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_content_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_data_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryItem {
    pub id: Option<String>,
    pub is_new: bool,
    pub name: Option<String>,
    pub content_type_name: Option<String>,
    pub data: Option<Value>,
    pub layout_data: Option<Value>,
    pub is_hidden: Option<bool>,
    pub required_content_id: Option<String>,
    pub originating_data_id: Option<String>,
    pub originating_data_source_id: Option<String>,
}

descriptor!(ItemDescriptor, Table::ContentItem, provenance);
intermediary!(IntermediaryItem, provenance);
named!(ItemDescriptor, name, required);
named!(IntermediaryItem, name, optional);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploaderDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub email_sent: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryUploader {
    pub id: Option<String>,
    pub is_new: bool,
    pub email: Option<String>,
    pub name: Option<String>,
    pub email_sent: Option<bool>,
}

descriptor!(UploaderDescriptor, Table::Uploader);
intermediary!(IntermediaryUploader);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredItemDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub name: String,
    pub content_type_name: String,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads_remaining: Option<i64>,
    #[serde(default)]
    pub uploaders: Vec<UploaderDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_data_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryRequiredItem {
    pub id: Option<String>,
    pub is_new: bool,
    pub name: Option<String>,
    pub content_type_name: Option<String>,
    pub is_hidden: Option<bool>,
    pub uploads_remaining: Option<i64>,
    pub uploaders: Vec<IntermediaryUploader>,
    pub originating_data_id: Option<String>,
    pub originating_data_source_id: Option<String>,
}

descriptor!(RequiredItemDescriptor, Table::RequiredContentItem, provenance);
intermediary!(IntermediaryRequiredItem, provenance);
named!(RequiredItemDescriptor, name, required);
named!(IntermediaryRequiredItem, name, optional);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPersonDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub person_id: String,
    pub role_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryGroupPerson {
    pub id: Option<String>,
    pub is_new: bool,
    pub person_id: Option<String>,
    /// `"Name (Affiliation)"`, resolved to `person_id` against known people
    pub name_affiliation: Option<String>,
    pub role_name: Option<String>,
    pub priority: Option<i64>,
}

descriptor!(GroupPersonDescriptor, Table::ContentGroupPerson);
intermediary!(IntermediaryGroupPerson);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupHallwayDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub hallway_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryGroupHallway {
    pub id: Option<String>,
    pub is_new: bool,
    pub hallway_id: Option<String>,
    /// Resolved to `hallway_id` by exact name lookup
    pub hallway_name: Option<String>,
    pub priority: Option<i64>,
    pub layout: Option<Value>,
}

descriptor!(GroupHallwayDescriptor, Table::ContentGroupHallway);
intermediary!(IntermediaryGroupHallway);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentGroupDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_title: Option<String>,
    pub content_group_type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originating_data_id: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemDescriptor>,
    #[serde(default)]
    pub required_items: Vec<RequiredItemDescriptor>,
    #[serde(default)]
    pub people: Vec<GroupPersonDescriptor>,
    #[serde(default)]
    pub hallways: Vec<GroupHallwayDescriptor>,
    #[serde(default)]
    pub tag_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryContentGroup {
    pub id: Option<String>,
    pub is_new: bool,
    pub title: Option<String>,
    pub short_title: Option<String>,
    pub content_group_type_name: Option<String>,
    pub originating_data_id: Option<String>,
    pub originating_data_source_id: Option<String>,
    pub items: Vec<IntermediaryItem>,
    pub required_items: Vec<IntermediaryRequiredItem>,
    pub people: Vec<IntermediaryGroupPerson>,
    pub hallways: Vec<IntermediaryGroupHallway>,
    pub tag_ids: Option<BTreeSet<String>>,
    /// Resolved to tag ids by exact name lookup
    pub tag_names: Option<Vec<String>>,
}

descriptor!(ContentGroupDescriptor, Table::ContentGroup, provenance);
intermediary!(IntermediaryContentGroup, provenance);
named!(ContentGroupDescriptor, title, required);
named!(IntermediaryContentGroup, title, optional);

// ============================================================================
// Batches and collections
// ============================================================================

/// One named import source's records, per entity kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntermediaryBatch {
    pub originating_datas: Vec<IntermediaryOriginatingData>,
    pub tags: Vec<IntermediaryTag>,
    pub hallways: Vec<IntermediaryHallway>,
    pub people: Vec<IntermediaryPerson>,
    pub content_groups: Vec<IntermediaryContentGroup>,
    pub rooms: Vec<IntermediaryRoom>,
    pub events: Vec<IntermediaryEvent>,
}

/// Named import sources; folded into the running result in key order
pub type ImportBatch = BTreeMap<String, IntermediaryBatch>;

/// Canonical collections, keyed by identifier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanonicalCollections {
    pub originating_datas: BTreeMap<String, OriginatingDataDescriptor>,
    pub tags: BTreeMap<String, TagDescriptor>,
    pub hallways: BTreeMap<String, HallwayDescriptor>,
    pub people: BTreeMap<String, PersonDescriptor>,
    pub content_groups: BTreeMap<String, ContentGroupDescriptor>,
    pub rooms: BTreeMap<String, RoomDescriptor>,
    pub events: BTreeMap<String, EventDescriptor>,
}

/// Key a list of descriptors by identifier
pub fn keyed<D: Descriptor>(records: Vec<D>) -> BTreeMap<String, D> {
    records
        .into_iter()
        .map(|record| (record.descriptor_id().to_string(), record))
        .collect()
}

/// Ordered list view of keyed descriptors
pub fn listed<D: Clone>(records: &BTreeMap<String, D>) -> Vec<D> {
    records.values().cloned().collect()
}
