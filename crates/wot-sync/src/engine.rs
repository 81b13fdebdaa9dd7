//! Rebuild engine.
//!
//! A rebuild reads one ledger snapshot, builds a fresh generation off to
//! the side, classifies sentries, and swaps it in. The published generation
//! is never touched in place, so a failure at any step leaves it as it was.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use wot_graph::GraphClient;
use wot_pathfind::{Generation, SentryThreshold};

use crate::error::{Result, SyncError};
use crate::handle::{GenerationPublisher, GenerationReader};
use crate::journal::{RebuildJournal, RebuildOutcome, RebuildRecord};
use crate::ledger::{LedgerSnapshot, LedgerSource};
use crate::persist;

/// Summary of a successful rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildReport {
    pub generation: u64,
    pub identities: usize,
    pub certifications: usize,
    pub skipped_edges: usize,
    pub sentries: usize,
    pub d_sen: u64,
    pub fingerprint: String,
    pub duration_ms: u64,
    /// Set when the Neo4j mirror could not be updated.
    pub mirror_error: Option<String>,
}

/// Counters gathered while building, reported even when the rebuild fails.
#[derive(Default)]
struct Progress {
    identities: usize,
    certifications: usize,
}

/// The single writer of graph generations.
pub struct SyncEngine {
    ledger: Arc<dyn LedgerSource>,
    publisher: GenerationPublisher,
    /// Serializes rebuilds. Held for the whole rebuild.
    writer: Mutex<()>,
    mirror: Option<GraphClient>,
    journal: Option<RebuildJournal>,
}

impl SyncEngine {
    pub fn new(ledger: Arc<dyn LedgerSource>) -> Self {
        Self {
            ledger,
            publisher: GenerationPublisher::new(),
            writer: Mutex::new(()),
            mirror: None,
            journal: None,
        }
    }

    /// Mirror every published generation into Neo4j.
    pub fn with_mirror(mut self, client: GraphClient) -> Self {
        self.mirror = Some(client);
        self
    }

    /// Record every rebuild attempt in `journal`.
    pub fn with_journal(mut self, journal: RebuildJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn reader(&self) -> GenerationReader {
        self.publisher.reader()
    }

    pub fn current(&self) -> Arc<Generation> {
        self.publisher.current()
    }

    /// Rebuild the graph from the ledger and publish it.
    ///
    /// Waits for any rebuild already in progress. On error the previously
    /// published generation stays in place.
    pub async fn rebuild(&self) -> Result<RebuildReport> {
        let _writer = self.writer.lock().await;

        let started_at = Utc::now();
        let clock = Instant::now();
        let id = self.publisher.current().id + 1;
        let mut progress = Progress::default();

        tracing::info!(generation = id, "Rebuild started");

        let generation = match self.build(id, &mut progress).await {
            Ok(generation) => generation,
            Err(e) => {
                tracing::warn!(
                    generation = id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Rebuild failed, previous generation kept"
                );
                self.record(
                    started_at,
                    &progress,
                    None,
                    RebuildOutcome::Failed {
                        error: e.to_string(),
                    },
                )
                .await;
                return Err(e);
            }
        };

        let mut report = RebuildReport {
            generation: generation.id,
            identities: progress.identities,
            certifications: progress.certifications,
            skipped_edges: generation.skipped_edges.len(),
            sentries: generation.sentry_count,
            d_sen: generation.threshold.d_sen,
            fingerprint: generation.fingerprint.clone(),
            duration_ms: 0,
            mirror_error: None,
        };

        self.publisher.publish(generation);
        let generation = self.publisher.current();

        if let Some(client) = &self.mirror {
            match persist::mirror_generation(client, &generation).await {
                Ok(summary) => tracing::info!(
                    generation = id,
                    identities = summary.identities,
                    certifications = summary.certifications,
                    "Neo4j mirror updated"
                ),
                Err(e) => {
                    tracing::error!(generation = id, error = %e, "Neo4j mirror failed");
                    report.mirror_error = Some(e.to_string());
                }
            }
        }

        report.duration_ms = clock.elapsed().as_millis() as u64;
        self.record(
            started_at,
            &progress,
            Some(&generation),
            RebuildOutcome::Published {
                generation: id,
                fingerprint: generation.fingerprint.clone(),
            },
        )
        .await;

        tracing::info!(
            generation = id,
            identities = report.identities,
            certifications = report.certifications,
            skipped_edges = report.skipped_edges,
            sentries = report.sentries,
            d_sen = report.d_sen,
            duration_ms = report.duration_ms,
            "Generation published"
        );
        Ok(report)
    }

    async fn build(&self, id: u64, progress: &mut Progress) -> Result<Generation> {
        let snapshot = self.ledger.snapshot().await.map_err(|source| {
            SyncError::CollaboratorUnavailable {
                operation: "read_snapshot",
                source,
            }
        })?;
        progress.identities = snapshot.identities.len();
        progress.certifications = snapshot.certifications.len();

        let LedgerSnapshot {
            identities,
            certifications,
            members_count,
            step_max,
        } = snapshot;

        let threshold = SentryThreshold::compute(members_count, step_max)
            .map_err(|e| SyncError::Parameter(e.to_string()))?;

        Ok(Generation::build(id, identities, &certifications, threshold))
    }

    /// Append a journal entry. Journal failures never fail the rebuild.
    ///
    /// The write runs on the blocking pool while the writer lock is held, so
    /// journal entries land in generation order.
    async fn record(
        &self,
        started_at: DateTime<Utc>,
        progress: &Progress,
        generation: Option<&Generation>,
        outcome: RebuildOutcome,
    ) {
        let Some(journal) = &self.journal else {
            return;
        };

        let mut record = RebuildRecord::new(started_at, outcome);
        record.identities = progress.identities;
        record.certifications = progress.certifications;
        if let Some(generation) = generation {
            record.skipped_edges = generation.skipped_edges.len();
            record.sentries = generation.sentry_count;
            record.d_sen = Some(generation.threshold.d_sen);
        }

        let journal = journal.clone();
        let written = tokio::task::spawn_blocking(move || {
            record.finalize().and_then(|record| journal.append(&record))
        })
        .await;
        match written {
            Ok(Ok(path)) => tracing::debug!(path = %path.display(), "Rebuild journaled"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to journal rebuild"),
            Err(e) => tracing::warn!(error = %e, "Journal task panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerOp, MemoryLedger, SnapshotLedger};
    use wot_core::{CertificationRecord, IdentityRecord};

    fn snapshot() -> LedgerSnapshot {
        LedgerSnapshot {
            identities: vec![
                IdentityRecord::new("k1", "alice", true),
                IdentityRecord::new("k2", "bob", true),
                IdentityRecord::new("k3", "carol", true),
            ],
            certifications: vec![
                CertificationRecord::new("k1", "k2"),
                CertificationRecord::new("k2", "k1"),
                CertificationRecord::new("k2", "k3"),
                CertificationRecord::new("k3", "ghost"),
            ],
            members_count: 3,
            step_max: 3,
        }
    }

    #[tokio::test]
    async fn test_rebuild_publishes_generation() {
        let ledger = Arc::new(MemoryLedger::new(snapshot()));
        let engine = SyncEngine::new(ledger);

        let report = engine.rebuild().await.unwrap();

        assert_eq!(report.generation, 1);
        assert_eq!(report.identities, 3);
        assert_eq!(report.certifications, 4);
        assert_eq!(report.skipped_edges, 1);
        assert_eq!(report.d_sen, 2);
        assert_eq!(report.sentries, 0);
        assert!(report.mirror_error.is_none());

        let current = engine.current();
        assert_eq!(current.id, 1);
        assert_eq!(current.graph.edge_count(), 3);
    }

    #[tokio::test]
    async fn test_generation_ids_increase() {
        let engine = SyncEngine::new(Arc::new(MemoryLedger::new(snapshot())));
        engine.rebuild().await.unwrap();
        let second = engine.rebuild().await.unwrap();
        assert_eq!(second.generation, 2);
    }

    #[tokio::test]
    async fn test_parameter_error_keeps_previous() {
        let ledger = Arc::new(MemoryLedger::new(snapshot()));
        let engine = SyncEngine::new(ledger.clone());
        engine.rebuild().await.unwrap();

        ledger
            .replace(LedgerSnapshot {
                step_max: 0,
                ..snapshot()
            })
            .await;
        let err = engine.rebuild().await.unwrap_err();

        assert!(matches!(err, SyncError::Parameter(_)));
        assert!(!err.is_retryable());
        assert_eq!(engine.current().id, 1);
    }

    #[tokio::test]
    async fn test_collaborator_error_names_operation() {
        let ledger = Arc::new(MemoryLedger::new(snapshot()));
        ledger.fail(LedgerOp::StepMax).await;
        let engine = SyncEngine::new(ledger);

        match engine.rebuild().await {
            Err(SyncError::CollaboratorUnavailable { operation, source }) => {
                assert_eq!(operation, "read_snapshot");
                assert!(source.to_string().contains("StepMax"));
            }
            other => panic!("expected CollaboratorUnavailable, got {other:?}"),
        }
        assert_eq!(engine.current().id, 0);
    }

    #[tokio::test]
    async fn test_rebuilds_are_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RebuildJournal::open(dir.path()).unwrap();
        let ledger = Arc::new(MemoryLedger::new(snapshot()));
        let engine = SyncEngine::new(ledger.clone()).with_journal(journal.clone());

        engine.rebuild().await.unwrap();
        ledger
            .replace(LedgerSnapshot {
                step_max: 0,
                ..snapshot()
            })
            .await;
        engine.rebuild().await.unwrap_err();

        let records = journal.list().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.verify_integrity()));

        let failed = records
            .iter()
            .find(|r| matches!(r.outcome, RebuildOutcome::Failed { .. }))
            .unwrap();
        assert_eq!(failed.identities, 3);
        assert_eq!(failed.d_sen, None);

        let published = records
            .iter()
            .find(|r| matches!(r.outcome, RebuildOutcome::Published { .. }))
            .unwrap();
        assert_eq!(published.skipped_edges, 1);
        assert_eq!(published.d_sen, Some(2));
    }

    #[tokio::test]
    async fn test_failed_read_journals_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RebuildJournal::open(dir.path()).unwrap();
        let ledger = Arc::new(MemoryLedger::new(snapshot()));
        ledger.fail(LedgerOp::Certifications).await;
        let engine = SyncEngine::new(ledger).with_journal(journal.clone());

        engine.rebuild().await.unwrap_err();

        let records = journal.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identities, 0);
        assert_eq!(records[0].certifications, 0);
    }

    /// Two disjoint ledgers. Any mix of their identities and certifications
    /// leaves certifications pointing at unknown keys.
    fn versioned(version: u32) -> String {
        let (a, b) = if version % 2 == 0 { ("ka", "kb") } else { ("kc", "kd") };
        let snapshot = LedgerSnapshot {
            identities: vec![
                IdentityRecord::new(a, &format!("{a}-uid"), true),
                IdentityRecord::new(b, &format!("{b}-uid"), true),
            ],
            certifications: vec![CertificationRecord::new(a, b)],
            members_count: 2,
            step_max: 2,
        };
        serde_json::to_string(&snapshot).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rebuild_reads_one_ledger_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, versioned(0)).unwrap();
        let engine = SyncEngine::new(Arc::new(SnapshotLedger::new(&path)));

        let writer = {
            let path = path.clone();
            let tmp = dir.path().join("ledger.json.tmp");
            tokio::spawn(async move {
                for version in 1..=200 {
                    tokio::fs::write(&tmp, versioned(version)).await.unwrap();
                    tokio::fs::rename(&tmp, &path).await.unwrap();
                }
            })
        };

        for _ in 0..100 {
            let report = engine.rebuild().await.unwrap();
            assert_eq!(report.skipped_edges, 0);
            assert_eq!(report.identities, 2);
            assert_eq!(engine.current().graph.edge_count(), 1);
        }
        writer.await.unwrap();
    }
}
