//! Raw-sample sources
//!
//! A source returns every observation segment of one target, or says why it
//! could not: [`AcquisitionError::Transient`] is worth retrying,
//! [`AcquisitionError::NotFound`] and [`AcquisitionError::Corrupt`] are not.

use serde::{Deserialize, Serialize};
use signal_conditioner::RawSegment;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use storage::CanonicalId;
use thiserror::Error;
use tracing::debug;

/// Metadata file name inside a target directory
const METADATA_FILE: &str = "target.json";

/// Acquisition failures
#[derive(Debug, Clone, Error)]
pub enum AcquisitionError {
    /// Retryable failure (I/O hiccup, archive unavailable)
    #[error("Transient acquisition failure for {id}: {reason}")]
    Transient { id: String, reason: String },
    /// The source has no data for this target
    #[error("No samples found for {0}")]
    NotFound(String),
    /// Stored samples exist but cannot be decoded
    #[error("Corrupt samples for {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

impl AcquisitionError {
    /// Whether retrying may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AcquisitionError::Transient { .. })
    }
}

/// Everything a source knows about one target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTarget {
    /// Observation segments, in any order
    pub segments: Vec<RawSegment>,
    /// Primary radius (solar radii), when catalogued
    pub stellar_radius: Option<f64>,
}

/// Optional per-target metadata stored next to the segments
#[derive(Debug, Default, Deserialize)]
struct TargetMetadata {
    #[serde(default)]
    stellar_radius: Option<f64>,
}

/// Provider of raw samples for a target
pub trait RawSampleSource: Send + Sync {
    /// Fetch all segments of a target
    fn fetch(&self, id: &CanonicalId) -> Result<RawTarget, AcquisitionError>;
}

/// Segments stored as JSON files under `<root>/<id slug>/`.
///
/// Every `*.json` file other than `target.json` holds one [`RawSegment`].
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Source rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding a target's files
    pub fn target_dir(&self, id: &CanonicalId) -> PathBuf {
        self.root.join(id.slug())
    }

    fn transient(id: &CanonicalId, path: &Path, e: impl std::fmt::Display) -> AcquisitionError {
        AcquisitionError::Transient {
            id: id.to_string(),
            reason: format!("{}: {}", path.display(), e),
        }
    }

    /// I/O errors are transient; undecodable contents are not
    fn read_json<T: serde::de::DeserializeOwned>(
        id: &CanonicalId,
        path: &Path,
    ) -> Result<T, AcquisitionError> {
        let file = File::open(path).map_err(|e| Self::transient(id, path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            if e.is_io() {
                Self::transient(id, path, e)
            } else {
                AcquisitionError::Corrupt {
                    id: id.to_string(),
                    reason: format!("{}: {}", path.display(), e),
                }
            }
        })
    }
}

impl RawSampleSource for DirectorySource {
    fn fetch(&self, id: &CanonicalId) -> Result<RawTarget, AcquisitionError> {
        let dir = self.target_dir(id);
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AcquisitionError::NotFound(id.to_string()))
            }
            Err(e) => return Err(Self::transient(id, &dir, e)),
        };

        let mut paths = Vec::new();
        for entry in listing {
            let path = entry.map_err(|e| Self::transient(id, &dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut target = RawTarget::default();
        for path in paths {
            if path.file_name().is_some_and(|name| name == METADATA_FILE) {
                let metadata: TargetMetadata = Self::read_json(id, &path)?;
                target.stellar_radius = metadata.stellar_radius;
            } else {
                target.segments.push(Self::read_json(id, &path)?);
            }
        }
        debug!(
            "Fetched {} segments for {} from {:?}",
            target.segments.len(),
            id,
            dir
        );
        Ok(target)
    }
}

/// In-memory source, mainly for tests and single-target tooling
#[derive(Default)]
pub struct MemorySource {
    targets: HashMap<CanonicalId, RawTarget>,
    /// Remaining transient failures to inject per target
    flaky: Mutex<HashMap<CanonicalId, usize>>,
}

impl MemorySource {
    /// Empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target
    pub fn insert(&mut self, id: CanonicalId, target: RawTarget) {
        self.targets.insert(id, target);
    }

    /// Make the next `failures` fetches of `id` fail transiently
    pub fn fail_transiently(&mut self, id: CanonicalId, failures: usize) {
        if let Ok(mut flaky) = self.flaky.lock() {
            flaky.insert(id, failures);
        }
    }
}

impl RawSampleSource for MemorySource {
    fn fetch(&self, id: &CanonicalId) -> Result<RawTarget, AcquisitionError> {
        if let Ok(mut flaky) = self.flaky.lock() {
            if let Some(remaining) = flaky.get_mut(id).filter(|r| **r > 0) {
                *remaining -= 1;
                return Err(AcquisitionError::Transient {
                    id: id.to_string(),
                    reason: "injected failure".to_string(),
                });
            }
        }
        self.targets
            .get(id)
            .cloned()
            .ok_or_else(|| AcquisitionError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(raw: &str) -> CanonicalId {
        CanonicalId::parse(raw).unwrap()
    }

    #[test]
    fn test_directory_source_reads_segments_and_metadata() {
        let root = TempDir::new().unwrap();
        let source = DirectorySource::new(root.path());
        let dir = source.target_dir(&id("KIC 12"));
        fs::create_dir_all(&dir).unwrap();

        let segment = RawSegment::new(vec![0.0, 1.0], vec![1.0, 1.1]);
        fs::write(dir.join("q01.json"), serde_json::to_vec(&segment).unwrap()).unwrap();
        fs::write(dir.join("q02.json"), serde_json::to_vec(&segment).unwrap()).unwrap();
        fs::write(dir.join(METADATA_FILE), br#"{"stellar_radius": 0.9}"#).unwrap();

        let target = source.fetch(&id("kic 12")).unwrap();
        assert_eq!(target.segments.len(), 2);
        assert_eq!(target.stellar_radius, Some(0.9));
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let root = TempDir::new().unwrap();
        let err = DirectorySource::new(root.path()).fetch(&id("KIC 1")).unwrap_err();
        assert!(matches!(err, AcquisitionError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_corrupt_segment_is_terminal() {
        let root = TempDir::new().unwrap();
        let source = DirectorySource::new(root.path());
        let dir = source.target_dir(&id("KIC 3"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("q01.json"), b"{not json").unwrap();
        let err = source.fetch(&id("KIC 3")).unwrap_err();
        assert!(matches!(err, AcquisitionError::Corrupt { .. }));
        assert!(!err.is_transient());

        // Valid JSON of the wrong shape is corrupt too
        fs::write(dir.join("q01.json"), br#"{"flux": "none"}"#).unwrap();
        assert!(matches!(
            source.fetch(&id("KIC 3")).unwrap_err(),
            AcquisitionError::Corrupt { .. }
        ));
    }

    #[test]
    fn test_memory_source_injected_failures() {
        let mut source = MemorySource::new();
        source.insert(id("TIC 5"), RawTarget::default());
        source.fail_transiently(id("TIC 5"), 2);
        assert!(source.fetch(&id("TIC 5")).unwrap_err().is_transient());
        assert!(source.fetch(&id("TIC 5")).unwrap_err().is_transient());
        assert!(source.fetch(&id("TIC 5")).is_ok());
    }
}
