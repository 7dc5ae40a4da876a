use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::Builder;

use crate::domain::MetadataRecord;
use crate::error::SyncError;

/// Sync state keyed by resource URL. One record per URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    records: BTreeMap<String, MetadataRecord>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map from a record list. Later duplicates replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = MetadataRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.url.clone(), record))
            .collect();
        Self { records }
    }

    pub fn get(&self, url: &str) -> Option<&MetadataRecord> {
        self.records.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.records.contains_key(url)
    }

    /// Creates or fully overwrites the record for `record.url`.
    pub fn upsert(&mut self, record: MetadataRecord) -> Option<MetadataRecord> {
        self.records.insert(record.url.clone(), record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &MetadataRecord> {
        self.records.values()
    }
}

pub trait MetadataStore {
    fn load(&self) -> Result<MetadataMap, SyncError>;
    fn save(&self, metadata: &MetadataMap) -> Result<(), SyncError>;
}

/// Metadata persisted as a JSON array of records.
#[derive(Debug, Clone)]
pub struct JsonMetadataStore {
    path: Utf8PathBuf,
}

impl JsonMetadataStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn corrupt(&self, message: impl ToString) -> SyncError {
        SyncError::CorruptMetadata {
            path: self.path.clone().into_std_path_buf(),
            message: message.to_string(),
        }
    }
}

impl MetadataStore for JsonMetadataStore {
    fn load(&self) -> Result<MetadataMap, SyncError> {
        if !self.path.as_std_path().exists() {
            return Ok(MetadataMap::new());
        }
        let content = fs::read_to_string(self.path.as_std_path())
            .map_err(|err| SyncError::Filesystem(format!("read {}: {err}", self.path)))?;
        let records: Vec<MetadataRecord> =
            serde_json::from_str(&content).map_err(|err| self.corrupt(err))?;
        Ok(MetadataMap::from_records(records))
    }

    fn save(&self, metadata: &MetadataMap) -> Result<(), SyncError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;

        let content = to_json_array(metadata)?;
        let mut temp = Builder::new()
            .prefix(".metadata")
            .suffix(".json.tmp")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Store kept in memory, for running the engine without touching disk.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    metadata: Mutex<MetadataMap>,
    saves: Mutex<usize>,
}

impl MemoryMetadataStore {
    pub fn new(metadata: MetadataMap) -> Self {
        Self {
            metadata: Mutex::new(metadata),
            saves: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> MetadataMap {
        self.metadata
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|guard| *guard).unwrap_or_default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn load(&self) -> Result<MetadataMap, SyncError> {
        self.metadata
            .lock()
            .map(|guard| guard.clone())
            .map_err(|err| SyncError::Filesystem(err.to_string()))
    }

    fn save(&self, metadata: &MetadataMap) -> Result<(), SyncError> {
        let mut guard = self
            .metadata
            .lock()
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        *guard = metadata.clone();
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}

fn to_json_array(metadata: &MetadataMap) -> Result<Vec<u8>, SyncError> {
    let records: Vec<&MetadataRecord> = metadata.records().collect();
    let mut content = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut content, PrettyFormatter::with_indent(b"    "));
    records
        .serialize(&mut serializer)
        .map_err(|err| SyncError::Filesystem(err.to_string()))?;
    content.push(b'\n');
    Ok(content)
}
