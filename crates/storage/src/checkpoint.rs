//! Durable completion ledger
//!
//! Layout inside the checkpoint directory:
//!
//! - `checkpoint.json`: full snapshot, replaced by write-temp-then-rename
//! - `checkpoint.journal`: one JSON entry per line, appended and fsynced
//!   before [`CheckpointStore::record`] returns
//!
//! Loading reads the snapshot and replays the journal over it. A torn final
//! journal line (kill mid-append) is ignored. Every `compact_every` journal
//! entries the map is written out as a new snapshot and the journal is
//! truncated; a crash between the two steps only replays entries the
//! snapshot already holds.

use crate::ids::CanonicalId;
use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SNAPSHOT_FILE: &str = "checkpoint.json";
const SNAPSHOT_TEMP: &str = "checkpoint.json.tmp";
const JOURNAL_FILE: &str = "checkpoint.journal";

/// Processing state of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    /// Dispatched, not yet settled
    Pending,
    /// Record persisted
    Done,
    /// Failed terminally or after exhausting retries
    Failed,
}

impl TargetStatus {
    /// Done or failed
    pub fn is_settled(&self) -> bool {
        !matches!(self, TargetStatus::Pending)
    }
}

/// Ledger entry for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub status: TargetStatus,
    pub timestamp: DateTime<Utc>,
}

/// One journal line
#[derive(Debug, Serialize, Deserialize)]
struct JournalLine {
    id: CanonicalId,
    #[serde(flatten)]
    entry: CheckpointEntry,
}

/// Entry counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CheckpointCounts {
    pub pending: usize,
    pub done: usize,
    pub failed: usize,
}

impl CheckpointCounts {
    /// Entries of any status
    pub fn total(&self) -> usize {
        self.pending + self.done + self.failed
    }
}

/// Durable key → status map for target completion
pub struct CheckpointStore {
    dir: PathBuf,
    entries: HashMap<CanonicalId, CheckpointEntry>,
    journal: File,
    journal_len: usize,
    compact_every: usize,
}

impl CheckpointStore {
    /// Open (or create) the store in `dir`
    pub fn open(dir: impl AsRef<Path>, compact_every: usize) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut entries: HashMap<CanonicalId, CheckpointEntry> = HashMap::new();
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        if snapshot_path.exists() {
            let file = File::open(&snapshot_path)?;
            let snapshot: BTreeMap<CanonicalId, CheckpointEntry> =
                serde_json::from_reader(BufReader::new(file))?;
            entries.extend(snapshot);
        }

        let journal_path = dir.join(JOURNAL_FILE);
        let mut journal_len = 0;
        if journal_path.exists() {
            let lines: Vec<String> = BufReader::new(File::open(&journal_path)?)
                .lines()
                .collect::<Result<_, _>>()?;
            let last = lines.len().saturating_sub(1);
            for (index, line) in lines.iter().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<JournalLine>(line) {
                    Ok(parsed) => {
                        entries.insert(parsed.id, parsed.entry);
                        journal_len += 1;
                    }
                    Err(e) if index == last => {
                        warn!("Ignoring torn final journal line: {}", e);
                    }
                    Err(e) => {
                        warn!("Skipping unreadable journal line {}: {}", index + 1, e);
                    }
                }
            }
        }

        let journal = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)?;

        info!(
            "Checkpoint opened at {:?}: {} entries ({} journaled)",
            dir,
            entries.len(),
            journal_len
        );
        let mut store = Self {
            dir,
            entries,
            journal,
            journal_len,
            compact_every: compact_every.max(1),
        };
        // Fold the journal into the snapshot so a torn tail never prefixes
        // the next appended entry
        if fs::metadata(&journal_path)?.len() > 0 {
            store.compact()?;
        }
        Ok(store)
    }

    /// Durably record `status` for a target.
    ///
    /// Returns only after the journal entry is on disk.
    pub fn record(&mut self, id: &CanonicalId, status: TargetStatus) -> Result<(), StorageError> {
        let entry = CheckpointEntry {
            status,
            timestamp: Utc::now(),
        };
        let line = JournalLine {
            id: id.clone(),
            entry: entry.clone(),
        };
        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');

        let path = self.dir.join(JOURNAL_FILE);
        self.journal
            .write_all(&bytes)
            .and_then(|_| self.journal.sync_data())
            .map_err(|source| StorageError::CheckpointWrite { path, source })?;

        debug!("Checkpoint {} -> {:?}", id, status);
        self.entries.insert(id.clone(), entry);
        self.journal_len += 1;
        if self.journal_len >= self.compact_every {
            self.compact()?;
        }
        Ok(())
    }

    /// Normalize a raw identifier and record it
    pub fn record_raw(&mut self, raw_id: &str, status: TargetStatus) -> Result<CanonicalId, StorageError> {
        let id = CanonicalId::parse(raw_id)?;
        self.record(&id, status)?;
        Ok(id)
    }

    /// Write the full map as a new snapshot and truncate the journal
    pub fn compact(&mut self) -> Result<(), StorageError> {
        let snapshot: BTreeMap<&CanonicalId, &CheckpointEntry> = self.entries.iter().collect();
        let temp = self.dir.join(SNAPSHOT_TEMP);
        let target = self.dir.join(SNAPSHOT_FILE);

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&temp)?;
            serde_json::to_writer(&mut file, &snapshot)?;
            file.sync_all()?;
            fs::rename(&temp, &target)?;
            sync_dir(&self.dir)
        };
        write().map_err(|source| StorageError::CheckpointWrite {
            path: target.clone(),
            source,
        })?;

        let journal_path = self.dir.join(JOURNAL_FILE);
        let journal = File::create(&journal_path)
            .and_then(|f| f.sync_all().map(|_| f))
            .and_then(|_| OpenOptions::new().append(true).open(&journal_path))
            .map_err(|source| StorageError::CheckpointWrite {
                path: journal_path.clone(),
                source,
            })?;
        self.journal = journal;
        self.journal_len = 0;
        debug!("Checkpoint compacted: {} entries", self.entries.len());
        Ok(())
    }

    /// Whether the target's record has been persisted
    pub fn is_done(&self, id: &CanonicalId) -> bool {
        self.status(id) == Some(TargetStatus::Done)
    }

    /// Current status of a target, if it has an entry
    pub fn status(&self, id: &CanonicalId) -> Option<TargetStatus> {
        self.entries.get(id).map(|e| e.status)
    }

    /// Full entry of a target
    pub fn entry(&self, id: &CanonicalId) -> Option<&CheckpointEntry> {
        self.entries.get(id)
    }

    /// Entry counts by status
    pub fn counts(&self) -> CheckpointCounts {
        let mut counts = CheckpointCounts::default();
        for entry in self.entries.values() {
            match entry.status {
                TargetStatus::Pending => counts.pending += 1,
                TargetStatus::Done => counts.done += 1,
                TargetStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// All entries sorted by id
    pub fn entries(&self) -> Vec<(CanonicalId, CheckpointEntry)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry, on disk and in memory
    pub fn reset(&mut self) -> Result<(), StorageError> {
        info!("Resetting checkpoint at {:?} ({} entries)", self.dir, self.entries.len());
        self.entries.clear();
        self.compact()
    }

    /// Directory holding the store files
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
