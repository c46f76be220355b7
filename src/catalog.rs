//! Ordered catalog of dataset entries.
//!
//! The catalog is the in-memory form of the container header: an ordered
//! list of `{name, metadata, codecMeta}` entries. Entry order is insertion
//! order and is also the order of the blocks in the data section.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::CodecMeta;
use crate::error::RabError;

/// Where the bytes of an entry live before the container is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedBlock {
    /// Encoded bytes written to a file in the private staging area
    Staged(PathBuf),
    /// A caller-owned file added by path
    External(PathBuf),
}

/// One named dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Unique dataset name
    pub name: String,

    /// User metadata (always a mapping)
    #[serde(default = "empty_mapping")]
    pub metadata: Value,

    /// How to locate and decode the block
    #[serde(rename = "codecMeta")]
    pub codec_meta: CodecMeta,

    /// Staged bytes; never persisted, absent for entries read from a file
    #[serde(skip)]
    pub block: Option<StagedBlock>,
}

fn empty_mapping() -> Value {
    Value::Object(Map::new())
}

impl DatasetEntry {
    /// Entry for freshly staged bytes
    pub fn new(name: impl Into<String>, metadata: Value, codec_meta: CodecMeta, block: StagedBlock) -> Self {
        Self {
            name: name.into(),
            metadata,
            codec_meta,
            block: Some(block),
        }
    }
}

/// Ordered, name-unique collection of entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<DatasetEntry>", into = "Vec<DatasetEntry>")]
pub struct Catalog {
    entries: Vec<DatasetEntry>,
    positions: HashMap<String, usize>,
}

impl From<Vec<DatasetEntry>> for Catalog {
    fn from(entries: Vec<DatasetEntry>) -> Self {
        Self::from_entries(entries)
    }
}

impl From<Catalog> for Vec<DatasetEntry> {
    fn from(catalog: Catalog) -> Self {
        catalog.entries
    }
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from entries read back from a header.
    ///
    /// Headers are not validated when read; if a name repeats, lookups
    /// resolve to its first occurrence.
    pub fn from_entries(entries: Vec<DatasetEntry>) -> Self {
        let mut positions = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            positions.entry(entry.name.clone()).or_insert(index);
        }
        Self { entries, positions }
    }

    /// Append an entry, rejecting duplicate names
    pub fn add_entry(&mut self, entry: DatasetEntry) -> Result<(), RabError> {
        self.ensure_available(&entry.name)?;
        self.positions.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Fail with a conflict if `name` is already taken
    pub fn ensure_available(&self, name: &str) -> Result<(), RabError> {
        if self.has_dataset(name) {
            return Err(RabError::ConflictError(name.to_string()));
        }
        Ok(())
    }

    /// Whether an entry named `name` exists
    pub fn has_dataset(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Names in catalog order
    pub fn list_datasets(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }

    /// Look up an entry
    pub fn get_entry(&self, name: &str) -> Option<&DatasetEntry> {
        self.positions.get(name).map(|&index| &self.entries[index])
    }

    /// Look up an entry, failing with `NotFoundError`
    pub fn entry(&self, name: &str) -> Result<&DatasetEntry, RabError> {
        self.get_entry(name)
            .ok_or_else(|| RabError::NotFoundError(format!("no dataset named '{}'", name)))
    }

    /// User metadata of an entry
    pub fn get_metadata(&self, name: &str) -> Result<&Value, RabError> {
        Ok(&self.entry(name)?.metadata)
    }

    /// `type` field of an entry
    pub fn get_dataset_type(&self, name: &str) -> Result<&str, RabError> {
        Ok(self.entry(name)?.codec_meta.type_name())
    }

    /// Assign every `byteOffset` as the running sum of the preceding `byteLength`s
    pub fn update_offsets(&mut self) {
        let mut offset = 0u64;
        for entry in &mut self.entries {
            entry.codec_meta.byte_offset = Some(offset);
            offset += entry.codec_meta.byte_length;
        }
    }

    /// Sum of all stored block sizes
    pub fn total_byte_size(&self) -> u64 {
        self.entries
            .iter()
            .map(|entry| entry.codec_meta.byte_length)
            .sum()
    }

    /// Entries in catalog order
    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop staging references, as done once the blocks live in a container file
    pub fn clear_blocks(&mut self) {
        for entry in &mut self.entries {
            entry.block = None;
        }
    }
}
