//! Record sinks keyed by canonical target id

use crate::ids::CanonicalId;
use crate::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Key-value store for one record per target.
///
/// `put` overwrites any existing record under the same id.
pub trait RecordSink<T>: Send {
    /// Store a record
    fn put(&mut self, id: &CanonicalId, record: &T) -> Result<(), StorageError>;

    /// Fetch a record
    fn get(&self, id: &CanonicalId) -> Result<Option<T>, StorageError>;

    /// Number of stored records
    fn len(&self) -> Result<usize, StorageError>;

    /// Check if the sink holds no records
    fn is_empty(&self) -> Result<bool, StorageError> {
        self.len().map(|n| n == 0)
    }
}

/// One JSON file per target under a directory
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Open (or create) the sink directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of a target's record file
    pub fn path_for(&self, id: &CanonicalId) -> PathBuf {
        self.dir.join(format!("{}.json", id.slug()))
    }
}

impl<T: Serialize + DeserializeOwned> RecordSink<T> for DirectorySink {
    fn put(&mut self, id: &CanonicalId, record: &T) -> Result<(), StorageError> {
        let target = self.path_for(id);
        let temp = target.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp)?);
            serde_json::to_writer_pretty(&mut writer, record)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp, &target)?;
        debug!("Stored record for {} at {:?}", id, target);
        Ok(())
    }

    fn get(&self, id: &CanonicalId) -> Result<Option<T>, StorageError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let record = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        Ok(Some(record))
    }

    fn len(&self) -> Result<usize, StorageError> {
        let mut count = 0;
        for entry in fs::read_dir(&self.dir)? {
            if entry?.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[derive(Debug)]
struct MemoryInner<T> {
    records: BTreeMap<CanonicalId, T>,
    writes: usize,
}

/// In-memory sink; clones share the same storage
#[derive(Debug)]
pub struct MemorySink<T> {
    inner: Arc<Mutex<MemoryInner<T>>>,
}

impl<T> MemorySink<T> {
    /// Create an empty sink
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                records: BTreeMap::new(),
                writes: 0,
            })),
        }
    }

    /// Total `put` calls so far, including overwrites
    pub fn writes(&self) -> usize {
        self.inner.lock().map(|inner| inner.writes).unwrap_or(0)
    }

    /// Stored ids in order
    pub fn ids(&self) -> Vec<CanonicalId> {
        self.inner
            .lock()
            .map(|inner| inner.records.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl<T> Clone for MemorySink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> RecordSink<T> for MemorySink<T> {
    fn put(&mut self, id: &CanonicalId, record: &T) -> Result<(), StorageError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        inner.records.insert(id.clone(), record.clone());
        inner.writes += 1;
        Ok(())
    }

    fn get(&self, id: &CanonicalId) -> Result<Option<T>, StorageError> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(inner.records.get(id).cloned())
    }

    fn len(&self) -> Result<usize, StorageError> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(inner.records.len())
    }
}
