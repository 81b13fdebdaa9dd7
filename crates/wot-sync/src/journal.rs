//! Rebuild journal.
//!
//! Every rebuild attempt can be recorded as a JSON file carrying a BLAKE3
//! hash of its own content, so a tampered record is detected on read.
//! Records are laid out by date:
//!
//! ```text
//! {root}/
//!   2026/
//!     10/
//!       17/
//!         {record_id}.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Rebuild record not found: {0}")]
    NotFound(Uuid),

    #[error("Integrity check failed for rebuild record {0}: stored hash does not match content")]
    IntegrityViolation(Uuid),

    #[error("Rebuild record has no content hash (not finalized)")]
    NotFinalized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RebuildOutcome {
    Published { generation: u64, fingerprint: String },
    Failed { error: String },
}

/// One rebuild attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub identities: usize,
    pub certifications: usize,
    pub skipped_edges: usize,
    pub sentries: usize,
    pub d_sen: Option<u64>,
    pub outcome: RebuildOutcome,
    pub content_hash: Option<String>,
}

/// Fields covered by the content hash.
#[derive(Serialize)]
struct HashableRecord<'a> {
    id: &'a Uuid,
    started_at: &'a DateTime<Utc>,
    completed_at: &'a DateTime<Utc>,
    identities: usize,
    certifications: usize,
    skipped_edges: usize,
    sentries: usize,
    d_sen: &'a Option<u64>,
    outcome: &'a RebuildOutcome,
}

impl RebuildRecord {
    /// Start a record for a rebuild beginning at `started_at`.
    pub fn new(started_at: DateTime<Utc>, outcome: RebuildOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            completed_at: Utc::now(),
            identities: 0,
            certifications: 0,
            skipped_edges: 0,
            sentries: 0,
            d_sen: None,
            outcome,
            content_hash: None,
        }
    }

    pub fn compute_hash(&self) -> Result<String, JournalError> {
        let hashable = HashableRecord {
            id: &self.id,
            started_at: &self.started_at,
            completed_at: &self.completed_at,
            identities: self.identities,
            certifications: self.certifications,
            skipped_edges: self.skipped_edges,
            sentries: self.sentries,
            d_sen: &self.d_sen,
            outcome: &self.outcome,
        };
        let json = serde_json::to_vec(&hashable)?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    /// Seal the record with its content hash.
    pub fn finalize(mut self) -> Result<Self, JournalError> {
        self.content_hash = Some(self.compute_hash()?);
        Ok(self)
    }

    pub fn verify_integrity(&self) -> bool {
        match (&self.content_hash, self.compute_hash()) {
            (Some(stored), Ok(actual)) => *stored == actual,
            _ => false,
        }
    }
}

/// File-system backed journal.
#[derive(Debug, Clone)]
pub struct RebuildJournal {
    root: PathBuf,
}

impl RebuildJournal {
    /// Open a journal rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn record_path(&self, record: &RebuildRecord) -> PathBuf {
        let date = record.started_at.format("%Y/%m/%d");
        self.root.join(format!("{}/{}.json", date, record.id))
    }

    /// Write a finalized record. Returns the file path.
    pub fn append(&self, record: &RebuildRecord) -> Result<PathBuf, JournalError> {
        if record.content_hash.is_none() {
            return Err(JournalError::NotFinalized);
        }

        let path = self.record_path(record);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(record)?)?;

        tracing::debug!(record_id = %record.id, path = %path.display(), "Rebuild recorded");
        Ok(path)
    }

    /// Load a record by id, verifying its hash.
    pub fn get(&self, id: Uuid) -> Result<RebuildRecord, JournalError> {
        let filename = format!("{id}.json");
        let path = find_file(&self.root, &filename).ok_or(JournalError::NotFound(id))?;
        let record: RebuildRecord = serde_json::from_str(&fs::read_to_string(&path)?)?;

        if !record.verify_integrity() {
            return Err(JournalError::IntegrityViolation(id));
        }
        Ok(record)
    }

    /// Every readable record, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<RebuildRecord>, JournalError> {
        let mut records = Vec::new();
        collect_records(&self.root, &mut records)?;
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(records)
    }
}

fn find_file(dir: &Path, filename: &str) -> Option<PathBuf> {
    for entry in fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file(&path, filename) {
                return Some(found);
            }
        } else if path.file_name().and_then(|n| n.to_str()) == Some(filename) {
            return Some(path);
        }
    }
    None
}

fn collect_records(dir: &Path, out: &mut Vec<RebuildRecord>) -> Result<(), JournalError> {
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_records(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            match fs::read_to_string(&path)
                .map_err(JournalError::from)
                .and_then(|raw| Ok(serde_json::from_str::<RebuildRecord>(&raw)?))
            {
                Ok(record) => out.push(record),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Skipping unreadable rebuild record"
                ),
            }
        }
    }
    Ok(())
}
