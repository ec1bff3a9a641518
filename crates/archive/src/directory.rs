//! Record directory
//!
//! Name → location index shared by writer and reader. Entries keep write
//! order for enumeration; lookups go through an FxHashMap.

use recordpack_core::{is_debug_record, ArchiveError, Result};
use rustc_hash::FxHashMap;

use crate::format::CentralHeader;

/// Location and integrity data for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// Record name
    pub name: String,
    /// Absolute offset of the record's local header
    pub header_offset: u64,
    /// Absolute offset of the first payload byte
    pub data_offset: u64,
    /// Payload size in bytes
    pub size: u64,
    /// CRC-32 of the payload
    pub crc32: u32,
}

impl RecordEntry {
    /// Returns true if this is a debug record
    pub fn is_debug(&self) -> bool {
        is_debug_record(&self.name)
    }

    /// Offset one past the last payload byte
    pub fn data_end(&self) -> u64 {
        self.data_offset + self.size
    }

    pub(crate) fn central_header(&self) -> CentralHeader {
        CentralHeader {
            name: self.name.clone(),
            crc32: self.crc32,
            size: self.size,
            header_offset: self.header_offset,
        }
    }
}

/// Ordered, name-unique set of records.
#[derive(Debug, Clone, Default)]
pub struct RecordDirectory {
    entries: Vec<RecordEntry>,
    index: FxHashMap<String, usize>,
}

impl RecordDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Fails with `DuplicateName` and leaves the directory
    /// unchanged if the name is taken.
    pub fn insert(&mut self, entry: RecordEntry) -> Result<()> {
        if self.index.contains_key(&entry.name) {
            return Err(ArchiveError::DuplicateName(entry.name));
        }
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Look up a record by name
    pub fn get(&self, name: &str) -> Option<&RecordEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Returns true if a record with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in write order
    pub fn iter(&self) -> impl Iterator<Item = &RecordEntry> {
        self.entries.iter()
    }

    /// Record names in write order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Sum of all payload sizes
    pub fn total_data_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

impl<'a> IntoIterator for &'a RecordDirectory {
    type Item = &'a RecordEntry;
    type IntoIter = std::slice::Iter<'a, RecordEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
