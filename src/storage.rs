//! Durable and volatile persistence for serialized tables.
//!
//! Both backends implement [`StorageBackend`]. [`FileStorage`] keeps one file
//! per table plus a JSON metadata record in a data directory:
//!
//! ```text
//! data/
//! ├── database_metadata.json
//! ├── table_users.json      (or table_users.bin with the binary format)
//! └── table_orders.json
//! ```
//!
//! Every file is written to a temporary sibling first and then renamed into
//! place. The metadata mutex doubles as the engine-wide advisory lock: it
//! serializes file I/O and metadata updates, but not mutations of live
//! tables held by a `Database`.

use crate::config::ConfigError;
use crate::table::TableData;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use thiserror::Error;

pub const METADATA_FILE: &str = "database_metadata.json";
pub const METADATA_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Storage corrupted: {0}")]
    Corrupted(String),

    #[error("Backup not found at '{0}'")]
    BackupNotFound(String),

    #[error("{operation} is not supported by {backend} storage")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage is closed")]
    Closed,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Serialization format for table files. Metadata is always JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum StorageFormat {
    #[default]
    Json,
    Binary,
}

impl StorageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageFormat::Json => "json",
            StorageFormat::Binary => "binary",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            StorageFormat::Json => "json",
            StorageFormat::Binary => "bin",
        }
    }

    pub fn encode(&self, data: &TableData) -> StorageResult<Vec<u8>> {
        match self {
            StorageFormat::Json => serde_json::to_vec_pretty(data)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            StorageFormat::Binary => {
                bincode::serialize(data).map_err(|e| StorageError::Serialization(e.to_string()))
            }
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> StorageResult<TableData> {
        match self {
            StorageFormat::Json => serde_json::from_slice(bytes)
                .map_err(|e| StorageError::Deserialization(e.to_string())),
            StorageFormat::Binary => bincode::deserialize(bytes)
                .map_err(|e| StorageError::Deserialization(e.to_string())),
        }
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(StorageFormat::Json),
            "binary" | "bincode" | "bin" => Ok(StorageFormat::Binary),
            other => Err(ConfigError::InvalidFormat(other.to_string())),
        }
    }
}

impl TryFrom<String> for StorageFormat {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// `table_<name>.<ext>`
pub fn table_file_name(table_name: &str, format: StorageFormat) -> String {
    format!("table_{}.{}", table_name, format.extension())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub file: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub row_count: usize,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageMetadata {
    pub version: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub storage_format: String,
    pub tables: BTreeMap<String, TableMetadata>,
    pub table_count: usize,
}

impl StorageMetadata {
    pub fn new(storage_format: &str) -> Self {
        let now = Utc::now();
        Self {
            version: METADATA_VERSION.to_string(),
            created: now,
            last_modified: now,
            storage_format: storage_format.to_string(),
            tables: BTreeMap::new(),
            table_count: 0,
        }
    }

    /// Inserts or refreshes a table entry, keeping its creation time.
    fn record_table(&mut self, name: &str, file: String, row_count: usize, size_bytes: u64) {
        let now = Utc::now();
        let created = self.tables.get(name).map_or(now, |t| t.created);
        self.tables.insert(
            name.to_string(),
            TableMetadata {
                file,
                created,
                last_modified: now,
                row_count,
                size_bytes,
            },
        );
        self.touch();
    }

    fn remove_table(&mut self, name: &str) -> bool {
        let removed = self.tables.remove(name).is_some();
        self.touch();
        removed
    }

    fn touch(&mut self) {
        self.table_count = self.tables.len();
        self.last_modified = Utc::now();
    }

    fn total_rows(&self) -> usize {
        self.tables.values().map(|t| t.row_count).sum()
    }

    fn total_size_bytes(&self) -> u64 {
        self.tables.values().map(|t| t.size_bytes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub table_count: usize,
    pub total_rows: usize,
    pub total_size_bytes: u64,
    pub storage_format: String,
    pub data_directory: Option<String>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Filled in by the `Database`; backends report 0.
    pub tables_in_memory: usize,
}

impl DatabaseStats {
    fn from_metadata(metadata: &StorageMetadata, data_directory: Option<String>) -> Self {
        Self {
            table_count: metadata.table_count,
            total_rows: metadata.total_rows(),
            total_size_bytes: metadata.total_size_bytes(),
            storage_format: metadata.storage_format.clone(),
            data_directory,
            created: metadata.created,
            last_modified: metadata.last_modified,
            tables_in_memory: 0,
        }
    }
}

/// Persistence contract shared by the file and memory backends.
///
/// Implementations serialize their own I/O, but callers are still
/// responsible for serializing mutations of a single table.
pub trait StorageBackend: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend_name(&self) -> &'static str;

    fn save_table(&self, name: &str, data: &TableData) -> StorageResult<()>;

    fn load_table(&self, name: &str) -> StorageResult<Option<TableData>>;

    /// Returns whether the table was known.
    fn delete_table(&self, name: &str) -> StorageResult<bool>;

    fn list_tables(&self) -> StorageResult<Vec<String>>;

    fn table_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.list_tables()?.iter().any(|t| t == name))
    }

    fn get_table_info(&self, name: &str) -> StorageResult<Option<TableMetadata>>;

    fn get_database_stats(&self) -> StorageResult<DatabaseStats>;

    fn backup(&self, _path: &Path) -> StorageResult<()> {
        Err(StorageError::Unsupported {
            backend: self.backend_name(),
            operation: "backup",
        })
    }

    fn restore(&self, _path: &Path) -> StorageResult<()> {
        Err(StorageError::Unsupported {
            backend: self.backend_name(),
            operation: "restore",
        })
    }

    /// Rewrites every stored table.
    fn compact(&self) -> StorageResult<()> {
        Err(StorageError::Unsupported {
            backend: self.backend_name(),
            operation: "compact",
        })
    }

    fn close(&self) -> StorageResult<()>;

    fn is_closed(&self) -> bool;
}

/// File-backed storage rooted at a data directory.
pub struct FileStorage {
    data_dir: PathBuf,
    format: StorageFormat,
    metadata: Mutex<StorageMetadata>,
    closed: AtomicBool,
}

impl FileStorage {
    /// Opens (creating if needed) the data directory. A missing or corrupted
    /// metadata file starts an empty database instead of failing.
    pub fn new(data_dir: impl Into<PathBuf>, format: StorageFormat) -> StorageResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let metadata = Self::read_metadata(&data_dir, format);
        let storage = Self {
            data_dir,
            format,
            metadata: Mutex::new(metadata),
            closed: AtomicBool::new(false),
        };
        {
            let mut metadata = storage.lock()?;
            storage.write_metadata(&mut metadata)?;
        }

        info!(
            "Opened file storage at {} ({} format)",
            storage.data_dir.display(),
            format
        );
        Ok(storage)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn format(&self) -> StorageFormat {
        self.format
    }

    pub fn metadata(&self) -> StorageResult<StorageMetadata> {
        Ok(self.lock()?.clone())
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(table_file_name(name, self.format))
    }

    fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(METADATA_FILE)
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, StorageMetadata>> {
        self.metadata.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn check_closed(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn read_metadata(data_dir: &Path, format: StorageFormat) -> StorageMetadata {
        let path = data_dir.join(METADATA_FILE);
        if !path.exists() {
            return StorageMetadata::new(format.as_str());
        }

        let parsed = fs::read(&path)
            .map_err(StorageError::from)
            .and_then(|bytes| {
                serde_json::from_slice::<StorageMetadata>(&bytes)
                    .map_err(|e| StorageError::Corrupted(e.to_string()))
            });
        match parsed {
            Ok(mut metadata) => {
                metadata.table_count = metadata.tables.len();
                metadata
            }
            Err(e) => {
                warn!(
                    "Metadata at {} is unreadable ({}); starting with no tables",
                    path.display(),
                    e
                );
                StorageMetadata::new(format.as_str())
            }
        }
    }

    fn write_metadata(&self, metadata: &mut StorageMetadata) -> StorageResult<()> {
        metadata.touch();
        let bytes = serde_json::to_vec_pretty(&*metadata)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        write_atomic(&self.metadata_path(), &bytes)
    }

    // Callers hold the metadata lock.
    fn write_table_locked(
        &self,
        metadata: &mut StorageMetadata,
        name: &str,
        data: &TableData,
    ) -> StorageResult<()> {
        let bytes = self.format.encode(data)?;
        write_atomic(&self.table_path(name), &bytes)?;
        metadata.record_table(
            name,
            table_file_name(name, self.format),
            data.rows.len(),
            bytes.len() as u64,
        );
        self.write_metadata(metadata)
    }

    fn read_table_locked(&self, name: &str) -> StorageResult<Option<TableData>> {
        let path = self.table_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        self.format.decode(&bytes).map(Some)
    }
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("data_dir", &self.data_dir)
            .field("format", &self.format)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl StorageBackend for FileStorage {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn save_table(&self, name: &str, data: &TableData) -> StorageResult<()> {
        self.check_closed()?;
        let mut metadata = self.lock()?;
        self.write_table_locked(&mut metadata, name, data)?;
        debug!("Saved table '{}' ({} rows)", name, data.rows.len());
        Ok(())
    }

    fn load_table(&self, name: &str) -> StorageResult<Option<TableData>> {
        let _guard = self.lock()?;
        self.read_table_locked(name)
    }

    fn delete_table(&self, name: &str) -> StorageResult<bool> {
        self.check_closed()?;
        let mut metadata = self.lock()?;
        let path = self.table_path(name);
        let existed_on_disk = path.exists();
        if existed_on_disk {
            fs::remove_file(&path)?;
        }
        let known = metadata.remove_table(name);
        self.write_metadata(&mut metadata)?;
        debug!("Deleted table '{}'", name);
        Ok(known || existed_on_disk)
    }

    fn list_tables(&self) -> StorageResult<Vec<String>> {
        Ok(self.lock()?.tables.keys().cloned().collect())
    }

    fn table_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.lock()?.tables.contains_key(name))
    }

    fn get_table_info(&self, name: &str) -> StorageResult<Option<TableMetadata>> {
        Ok(self.lock()?.tables.get(name).cloned())
    }

    fn get_database_stats(&self) -> StorageResult<DatabaseStats> {
        let metadata = self.lock()?;
        Ok(DatabaseStats::from_metadata(
            &metadata,
            Some(self.data_dir.display().to_string()),
        ))
    }

    /// Copies every table file and the metadata file into `path`.
    fn backup(&self, path: &Path) -> StorageResult<()> {
        self.check_closed()?;
        let mut metadata = self.lock()?;
        self.write_metadata(&mut metadata)?;

        fs::create_dir_all(path)?;
        for entry in metadata.tables.values() {
            let source = self.data_dir.join(&entry.file);
            if source.exists() {
                fs::copy(&source, path.join(&entry.file))?;
            } else {
                warn!("Table file {} missing during backup", source.display());
            }
        }
        fs::copy(self.metadata_path(), path.join(METADATA_FILE))?;

        info!(
            "Backed up {} table(s) to {}",
            metadata.table_count,
            path.display()
        );
        Ok(())
    }

    /// Replaces the data directory's files with the backup's and reloads
    /// metadata. A path without a metadata file is rejected before anything
    /// is removed.
    fn restore(&self, path: &Path) -> StorageResult<()> {
        self.check_closed()?;
        if !path.is_dir() || !path.join(METADATA_FILE).is_file() {
            return Err(StorageError::BackupNotFound(path.display().to_string()));
        }

        let mut metadata = self.lock()?;
        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                fs::copy(entry.path(), self.data_dir.join(entry.file_name()))?;
            }
        }

        *metadata = Self::read_metadata(&self.data_dir, self.format);
        info!(
            "Restored {} table(s) from {}",
            metadata.table_count,
            path.display()
        );
        Ok(())
    }

    fn compact(&self) -> StorageResult<()> {
        self.check_closed()?;
        let mut metadata = self.lock()?;
        let names: Vec<String> = metadata.tables.keys().cloned().collect();
        for name in &names {
            match self.read_table_locked(name)? {
                Some(data) => self.write_table_locked(&mut metadata, name, &data)?,
                None => warn!("Table '{}' has metadata but no file; skipping", name),
            }
        }
        info!("Compacted {} table(s)", names.len());
        Ok(())
    }

    fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut metadata = self.lock()?;
        self.write_metadata(&mut metadata)?;
        debug!("Closed file storage at {}", self.data_dir.display());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Writes to `<path>.tmp` and renames over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[derive(Debug)]
struct MemoryState {
    tables: HashMap<String, TableData>,
    metadata: StorageMetadata,
}

/// Process-lifetime storage. Loads hand out independent copies.
#[derive(Debug)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState {
                tables: HashMap::new(),
                metadata: StorageMetadata::new("memory"),
            }),
            closed: AtomicBool::new(false),
        }
    }

    fn check_closed(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn save_table(&self, name: &str, data: &TableData) -> StorageResult<()> {
        self.check_closed()?;
        // Size is the JSON rendering, so both backends report comparable numbers.
        let size_bytes = serde_json::to_vec(data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?
            .len() as u64;
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        state.metadata.record_table(
            name,
            table_file_name(name, StorageFormat::Json),
            data.rows.len(),
            size_bytes,
        );
        state.tables.insert(name.to_string(), data.clone());
        Ok(())
    }

    fn load_table(&self, name: &str) -> StorageResult<Option<TableData>> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(state.tables.get(name).cloned())
    }

    fn delete_table(&self, name: &str) -> StorageResult<bool> {
        self.check_closed()?;
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        let removed = state.tables.remove(name).is_some();
        state.metadata.remove_table(name);
        Ok(removed)
    }

    fn list_tables(&self) -> StorageResult<Vec<String>> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut names: Vec<String> = state.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn table_exists(&self, name: &str) -> StorageResult<bool> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(state.tables.contains_key(name))
    }

    fn get_table_info(&self, name: &str) -> StorageResult<Option<TableMetadata>> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(state.metadata.tables.get(name).cloned())
    }

    fn get_database_stats(&self) -> StorageResult<DatabaseStats> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(DatabaseStats::from_metadata(&state.metadata, None))
    }

    // Nothing to rewrite in memory.
    fn compact(&self) -> StorageResult<()> {
        self.check_closed()
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
