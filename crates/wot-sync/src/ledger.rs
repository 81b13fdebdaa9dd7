//! Ledger collaborators.
//!
//! The engine reads identities, certifications and network parameters
//! through [`LedgerSource`]. A rebuild takes them all from one
//! [`LedgerSource::snapshot`] call so it never mixes ledger versions. Two
//! implementations ship here: a JSON snapshot file, and an in-process ledger
//! for embedders and tests that can be swapped out or made to fail per
//! operation.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use tokio::sync::{RwLock, Semaphore};

use wot_core::{CertificationRecord, IdentityRecord};

use crate::error::LedgerError;

#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn list_identities(&self) -> Result<Vec<IdentityRecord>, LedgerError>;

    async fn list_certifications(&self) -> Result<Vec<CertificationRecord>, LedgerError>;

    /// Number of members. Signed so a corrupt negative value reaches validation.
    async fn current_network_size(&self) -> Result<i64, LedgerError>;

    async fn certification_step_max(&self) -> Result<i64, LedgerError>;

    /// Everything a rebuild needs, taken from a single ledger version.
    ///
    /// The default composes the four reads above and is only consistent if
    /// the source cannot change between them. Sources that can should
    /// override it.
    async fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        Ok(LedgerSnapshot {
            identities: self.list_identities().await?,
            certifications: self.list_certifications().await?,
            members_count: self.current_network_size().await?,
            step_max: self.certification_step_max().await?,
        })
    }
}

/// On-disk snapshot layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub identities: Vec<IdentityRecord>,
    #[serde(default)]
    pub certifications: Vec<CertificationRecord>,
    pub members_count: i64,
    pub step_max: i64,
}

/// Reads a JSON [`LedgerSnapshot`] from disk.
///
/// Each call reads the file afresh. Writers should replace it atomically
/// (write a temporary file, then rename).
pub struct SnapshotLedger {
    path: PathBuf,
}

impl SnapshotLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<LedgerSnapshot, LedgerError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&raw).map_err(|e| match e.classify() {
            Category::Data => LedgerError::Malformed(format!("{}: {e}", self.path.display())),
            _ => LedgerError::Serialization(e),
        })
    }
}

#[async_trait]
impl LedgerSource for SnapshotLedger {
    async fn list_identities(&self) -> Result<Vec<IdentityRecord>, LedgerError> {
        Ok(self.read().await?.identities)
    }

    async fn list_certifications(&self) -> Result<Vec<CertificationRecord>, LedgerError> {
        Ok(self.read().await?.certifications)
    }

    async fn current_network_size(&self) -> Result<i64, LedgerError> {
        Ok(self.read().await?.members_count)
    }

    async fn certification_step_max(&self) -> Result<i64, LedgerError> {
        Ok(self.read().await?.step_max)
    }

    async fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        self.read().await
    }
}

/// A ledger operation, used to inject failures into [`MemoryLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    Identities,
    Certifications,
    NetworkSize,
    StepMax,
}

/// In-process ledger.
///
/// With a gate installed, every `list_identities` or `snapshot` call
/// consumes one permit first, which lets callers hold a rebuild in flight.
#[derive(Default)]
pub struct MemoryLedger {
    snapshot: RwLock<LedgerSnapshot>,
    failing: RwLock<HashSet<LedgerOp>>,
    reads: AtomicU64,
    gate: Option<Arc<Semaphore>>,
}

impl MemoryLedger {
    pub fn new(snapshot: LedgerSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            ..Self::default()
        }
    }

    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub async fn replace(&self, snapshot: LedgerSnapshot) {
        *self.snapshot.write().await = snapshot;
    }

    /// Make `op` fail with `LedgerError::Unavailable` until [`recover`](Self::recover).
    pub async fn fail(&self, op: LedgerOp) {
        self.failing.write().await.insert(op);
    }

    pub async fn recover(&self, op: LedgerOp) {
        self.failing.write().await.remove(&op);
    }

    /// How many gated reads (`list_identities` or `snapshot`) have started.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| LedgerError::Unavailable("ledger gate closed".to_string()))?
                .forget();
        }
        Ok(())
    }

    async fn check(&self, op: LedgerOp) -> Result<(), LedgerError> {
        check_op(&*self.failing.read().await, op)
    }
}

fn check_op(failing: &HashSet<LedgerOp>, op: LedgerOp) -> Result<(), LedgerError> {
    if failing.contains(&op) {
        return Err(LedgerError::Unavailable(format!("{op:?} failure injected")));
    }
    Ok(())
}

#[async_trait]
impl LedgerSource for MemoryLedger {
    async fn list_identities(&self) -> Result<Vec<IdentityRecord>, LedgerError> {
        self.enter().await?;
        self.check(LedgerOp::Identities).await?;
        Ok(self.snapshot.read().await.identities.clone())
    }

    async fn list_certifications(&self) -> Result<Vec<CertificationRecord>, LedgerError> {
        self.check(LedgerOp::Certifications).await?;
        Ok(self.snapshot.read().await.certifications.clone())
    }

    async fn current_network_size(&self) -> Result<i64, LedgerError> {
        self.check(LedgerOp::NetworkSize).await?;
        Ok(self.snapshot.read().await.members_count)
    }

    async fn certification_step_max(&self) -> Result<i64, LedgerError> {
        self.check(LedgerOp::StepMax).await?;
        Ok(self.snapshot.read().await.step_max)
    }

    async fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        self.enter().await?;
        let failing = self.failing.read().await;
        for op in [
            LedgerOp::Identities,
            LedgerOp::Certifications,
            LedgerOp::NetworkSize,
            LedgerOp::StepMax,
        ] {
            check_op(&failing, op)?;
        }
        Ok(self.snapshot.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_ledger_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(
            &path,
            r#"{
  "identities": [
    {"pub": "k1", "uid": "alice", "member": true, "created_on": "3-AB", "written_on": "4-CD"},
    {"pub": "k2", "uid": "bob", "member": false}
  ],
  "certifications": [
    {"issuer": "k1", "receiver": "k2", "created_on": "5-EF", "written_on": "6-01"}
  ],
  "members_count": 2,
  "step_max": 5
}"#,
        )
        .unwrap();

        let ledger = SnapshotLedger::new(&path);
        let identities = ledger.list_identities().await.unwrap();
        assert_eq!(identities.len(), 2);
        assert_eq!(identities[0].uid, "alice");
        assert_eq!(identities[0].written_on.as_str(), "4");
        assert!(!identities[1].member);

        let certs = ledger.list_certifications().await.unwrap();
        assert_eq!(certs[0].created_on.as_str(), "5");
        assert_eq!(ledger.current_network_size().await.unwrap(), 2);
        assert_eq!(ledger.certification_step_max().await.unwrap(), 5);

        let snapshot = ledger.snapshot().await.unwrap();
        assert_eq!(snapshot.identities.len(), 2);
        assert_eq!(snapshot.certifications.len(), 1);
        assert_eq!((snapshot.members_count, snapshot.step_max), (2, 5));
    }

    #[tokio::test]
    async fn test_snapshot_ledger_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SnapshotLedger::new(dir.path().join("absent.json"));
        assert!(matches!(ledger.snapshot().await, Err(LedgerError::Io(_))));
    }

    #[tokio::test]
    async fn test_snapshot_ledger_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{not json").unwrap();
        let ledger = SnapshotLedger::new(&path);
        assert!(matches!(
            ledger.current_network_size().await,
            Err(LedgerError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_ledger_wrong_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, r#"{"members_count": "many", "step_max": 5}"#).unwrap();
        let ledger = SnapshotLedger::new(&path);
        match ledger.snapshot().await {
            Err(LedgerError::Malformed(msg)) => assert!(msg.contains("ledger.json")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_memory_ledger_failure_injection() {
        let ledger = MemoryLedger::new(LedgerSnapshot {
            members_count: 3,
            step_max: 2,
            ..LedgerSnapshot::default()
        });

        ledger.fail(LedgerOp::NetworkSize).await;
        assert!(ledger.current_network_size().await.is_err());
        assert_eq!(ledger.certification_step_max().await.unwrap(), 2);

        ledger.recover(LedgerOp::NetworkSize).await;
        assert_eq!(ledger.current_network_size().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_memory_ledger_snapshot_honours_failures() {
        let ledger = MemoryLedger::new(LedgerSnapshot {
            members_count: 3,
            step_max: 2,
            ..LedgerSnapshot::default()
        });

        ledger.fail(LedgerOp::StepMax).await;
        match ledger.snapshot().await {
            Err(LedgerError::Unavailable(msg)) => assert!(msg.contains("StepMax")),
            other => panic!("expected Unavailable, got {other:?}"),
        }

        ledger.recover(LedgerOp::StepMax).await;
        let snapshot = ledger.snapshot().await.unwrap();
        assert_eq!((snapshot.members_count, snapshot.step_max), (3, 2));
        assert_eq!(ledger.reads(), 2);
    }

    #[tokio::test]
    async fn test_memory_ledger_gate() {
        let gate = Arc::new(Semaphore::new(0));
        let ledger = Arc::new(MemoryLedger::default().with_gate(gate.clone()));

        let reader = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.snapshot().await })
        };

        while ledger.reads() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!reader.is_finished());

        gate.add_permits(1);
        assert!(reader.await.unwrap().unwrap().identities.is_empty());
    }
}
