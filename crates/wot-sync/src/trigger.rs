//! Ledger-event driven resync.
//!
//! Two tasks cooperate: a listener that filters ledger events through the
//! resync policy, and a worker that runs rebuilds. They are joined by a
//! channel of capacity one. While a rebuild runs, the first request to
//! arrive waits in the channel and every further one is dropped and
//! counted as coalesced, so at most one rebuild is pending at any time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use wot_core::config::ResyncPolicy;
use wot_core::LedgerEvent;

use crate::engine::SyncEngine;

/// Counters shared between the trigger tasks and observers.
#[derive(Debug, Default)]
pub struct TriggerStats {
    events_seen: AtomicU64,
    rebuilds_requested: AtomicU64,
    rebuilds_coalesced: AtomicU64,
    rebuilds_succeeded: AtomicU64,
    rebuilds_failed: AtomicU64,
}

/// Point-in-time copy of [`TriggerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerStatsSnapshot {
    pub events_seen: u64,
    pub rebuilds_requested: u64,
    pub rebuilds_coalesced: u64,
    pub rebuilds_succeeded: u64,
    pub rebuilds_failed: u64,
}

impl TriggerStats {
    pub fn snapshot(&self) -> TriggerStatsSnapshot {
        TriggerStatsSnapshot {
            events_seen: self.events_seen.load(Ordering::SeqCst),
            rebuilds_requested: self.rebuilds_requested.load(Ordering::SeqCst),
            rebuilds_coalesced: self.rebuilds_coalesced.load(Ordering::SeqCst),
            rebuilds_succeeded: self.rebuilds_succeeded.load(Ordering::SeqCst),
            rebuilds_failed: self.rebuilds_failed.load(Ordering::SeqCst),
        }
    }

    /// Rebuilds that ran to completion, successful or not.
    pub fn rebuilds_finished(&self) -> u64 {
        self.rebuilds_succeeded.load(Ordering::SeqCst)
            + self.rebuilds_failed.load(Ordering::SeqCst)
    }
}

pub struct ResyncTrigger {
    engine: Arc<SyncEngine>,
    policy: ResyncPolicy,
    stats: Arc<TriggerStats>,
}

impl ResyncTrigger {
    pub fn new(engine: Arc<SyncEngine>, policy: ResyncPolicy) -> Self {
        Self {
            engine,
            policy,
            stats: Arc::new(TriggerStats::default()),
        }
    }

    /// Start the listener and worker tasks.
    ///
    /// Both stop once `events` is closed and the pending rebuild, if any,
    /// has run.
    pub fn spawn(self, events: mpsc::Receiver<LedgerEvent>) -> TriggerHandle {
        let (tx, rx) = mpsc::channel(1);

        let listener = tokio::spawn(listen(events, tx, self.policy, self.stats.clone()));
        let worker = tokio::spawn(work(rx, self.engine, self.stats.clone()));

        tracing::info!(policy = ?self.policy, "Resync trigger started");
        TriggerHandle {
            listener,
            worker,
            stats: self.stats,
        }
    }
}

async fn listen(
    mut events: mpsc::Receiver<LedgerEvent>,
    requests: mpsc::Sender<u64>,
    policy: ResyncPolicy,
    stats: Arc<TriggerStats>,
) {
    while let Some(event) = events.recv().await {
        stats.events_seen.fetch_add(1, Ordering::SeqCst);
        let block = event.block_number();

        if !policy.should_resync(&event) {
            tracing::debug!(block, "Ledger event ignored by resync policy");
            continue;
        }

        stats.rebuilds_requested.fetch_add(1, Ordering::SeqCst);
        match requests.try_send(block) {
            Ok(()) => tracing::debug!(block, "Rebuild requested"),
            Err(TrySendError::Full(_)) => {
                stats.rebuilds_coalesced.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(block, "Rebuild already pending, request coalesced");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!(block, "Rebuild worker gone, stopping listener");
                break;
            }
        }
    }

    tracing::info!("Ledger event stream closed");
}

async fn work(
    mut requests: mpsc::Receiver<u64>,
    engine: Arc<SyncEngine>,
    stats: Arc<TriggerStats>,
) {
    while let Some(block) = requests.recv().await {
        match engine.rebuild().await {
            Ok(report) => {
                stats.rebuilds_succeeded.fetch_add(1, Ordering::SeqCst);
                tracing::info!(block, generation = report.generation, "Resync complete");
            }
            Err(e) => {
                stats.rebuilds_failed.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(block, error = %e, "Resync failed");
            }
        }
    }
}

/// Running trigger tasks.
pub struct TriggerHandle {
    listener: JoinHandle<()>,
    worker: JoinHandle<()>,
    stats: Arc<TriggerStats>,
}

impl TriggerHandle {
    pub fn stats(&self) -> Arc<TriggerStats> {
        self.stats.clone()
    }

    /// Wait for both tasks to finish.
    pub async fn join(self) -> TriggerStatsSnapshot {
        if let Err(e) = self.listener.await {
            tracing::error!(error = %e, "Resync listener task panicked");
        }
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Resync worker task panicked");
        }
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerOp, LedgerSnapshot, MemoryLedger};
    use wot_core::{IdentityRecord, Pubkey};

    fn block(number: u64, joiners: &[&str], certifications: u32) -> LedgerEvent {
        LedgerEvent::BlockAccepted {
            number,
            hash: format!("H{number}"),
            joiners: joiners.iter().map(|j| Pubkey::from(*j)).collect(),
            leavers: vec![],
            excluded: vec![],
            certifications,
        }
    }

    fn ledger() -> Arc<MemoryLedger> {
        Arc::new(MemoryLedger::new(LedgerSnapshot {
            identities: vec![IdentityRecord::new("k1", "alice", true)],
            members_count: 1,
            step_max: 1,
            ..LedgerSnapshot::default()
        }))
    }

    #[tokio::test]
    async fn test_joiners_only_policy() {
        let engine = Arc::new(SyncEngine::new(ledger()));
        let (tx, rx) = mpsc::channel(16);
        let handle = ResyncTrigger::new(engine.clone(), ResyncPolicy::JoinersOnly).spawn(rx);

        tx.send(block(1, &[], 3)).await.unwrap();
        tx.send(block(2, &["k1"], 0)).await.unwrap();
        drop(tx);

        let stats = handle.join().await;
        assert_eq!(stats.events_seen, 2);
        assert_eq!(stats.rebuilds_requested, 1);
        assert_eq!(stats.rebuilds_succeeded, 1);
        assert_eq!(engine.current().id, 1);
    }

    #[tokio::test]
    async fn test_any_wot_change_policy() {
        let engine = Arc::new(SyncEngine::new(ledger()));
        let (tx, rx) = mpsc::channel(16);
        let handle = ResyncTrigger::new(engine, ResyncPolicy::AnyWotChange).spawn(rx);

        tx.send(block(1, &[], 3)).await.unwrap();
        tx.send(block(2, &[], 0)).await.unwrap();
        drop(tx);

        let stats = handle.join().await;
        assert_eq!(stats.events_seen, 2);
        assert_eq!(stats.rebuilds_requested, 1);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_listening() {
        let ledger = ledger();
        ledger.fail(LedgerOp::Identities).await;
        let engine = Arc::new(SyncEngine::new(ledger.clone()));
        let (tx, rx) = mpsc::channel(16);
        let handle = ResyncTrigger::new(engine.clone(), ResyncPolicy::JoinersOnly).spawn(rx);
        let stats = handle.stats();

        tx.send(block(1, &["k1"], 0)).await.unwrap();
        while stats.rebuilds_finished() < 1 {
            tokio::task::yield_now().await;
        }
        assert_eq!(stats.snapshot().rebuilds_failed, 1);

        ledger.recover(LedgerOp::Identities).await;
        tx.send(block(2, &["k1"], 0)).await.unwrap();
        drop(tx);

        let stats = handle.join().await;
        assert_eq!(stats.rebuilds_failed, 1);
        assert_eq!(stats.rebuilds_succeeded, 1);
        assert_eq!(engine.current().id, 1);
    }
}
