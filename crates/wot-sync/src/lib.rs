//! wot-sync: Keeps the web-of-trust graph in step with the ledger.
//!
//! Rebuilds the certification graph from a ledger snapshot, publishes each
//! generation atomically, resyncs on ledger events, and answers trust-path
//! queries against whatever generation is current. Every rebuild can be
//! journaled and mirrored into Neo4j.

pub mod engine;
pub mod error;
pub mod handle;
pub mod journal;
pub mod ledger;
pub mod persist;
pub mod trigger;

pub use engine::{RebuildReport, SyncEngine};
pub use error::{LedgerError, SyncError};
pub use ledger::{LedgerSource, MemoryLedger, SnapshotLedger};
pub use trigger::{ResyncTrigger, TriggerHandle};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use wot_core::config::{ResyncPolicy, WotConfig};
use wot_core::LedgerEvent;
use wot_graph::{GraphClient, GraphConfig};
use wot_pathfind::{Generation, GraphStats, PathfindEngine, SentryPath, ShorteningPath};

use crate::handle::GenerationReader;
use crate::journal::RebuildJournal;

/// Caller-facing entry point: rebuilds, resync subscription, and queries.
pub struct WotService {
    engine: Arc<SyncEngine>,
    reader: GenerationReader,
    pathfind: PathfindEngine,
    policy: ResyncPolicy,
}

impl WotService {
    pub fn new(engine: SyncEngine) -> Self {
        let reader = engine.reader();
        Self {
            engine: Arc::new(engine),
            reader,
            pathfind: PathfindEngine::new(),
            policy: ResyncPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fail path queries that run longer than `limit`.
    pub fn with_query_timeout(mut self, limit: Duration) -> Self {
        self.pathfind = PathfindEngine::new().with_timeout(limit);
        self
    }

    /// Assemble a service from configuration.
    ///
    /// Connects to Neo4j when the mirror is enabled and opens the journal
    /// when a directory is configured.
    pub async fn from_config(
        config: &WotConfig,
        ledger: Arc<dyn LedgerSource>,
    ) -> error::Result<Self> {
        let mut engine = SyncEngine::new(ledger);

        if let Some(dir) = &config.sync.journal_dir {
            engine = engine.with_journal(RebuildJournal::open(dir)?);
        }

        if config.neo4j.enabled {
            let client = GraphClient::connect(&GraphConfig::from(&config.neo4j)).await?;
            engine = engine.with_mirror(client);
        }

        let mut service = Self::new(engine).with_policy(config.sync.resync_policy);
        if let Some(ms) = config.sync.query_timeout_ms {
            service = service.with_query_timeout(Duration::from_millis(ms));
        }
        Ok(service)
    }

    /// Load `{file_prefix}.toml` and `WOT__*` env vars, then assemble a
    /// service reading the configured snapshot file, or `snapshot` if given.
    pub async fn from_config_file(
        file_prefix: &str,
        snapshot: Option<String>,
    ) -> error::Result<Self> {
        let mut config = wot_core::config::load(file_prefix)?;
        if let Some(path) = snapshot {
            config.ledger.snapshot_path = path;
        }

        let ledger = Arc::new(SnapshotLedger::new(&config.ledger.snapshot_path));
        Self::from_config(&config, ledger).await
    }

    /// Run one rebuild, then subscribe the resync trigger to `events`.
    ///
    /// A failed initial rebuild is logged and leaves the empty generation
    /// published; the trigger is started regardless so the next relevant
    /// event retries.
    pub async fn init(&self, events: mpsc::Receiver<LedgerEvent>) -> TriggerHandle {
        if let Err(e) = self.engine.rebuild().await {
            tracing::warn!(error = %e, "Initial rebuild failed");
        }
        ResyncTrigger::new(self.engine.clone(), self.policy).spawn(events)
    }

    /// Rebuild now. Queued behind any rebuild already in progress.
    pub async fn refresh_wot(&self) -> error::Result<RebuildReport> {
        self.engine.rebuild().await
    }

    /// Shortening paths toward `uid` in the current generation.
    pub fn get_shortening_path(
        &self,
        uid: &str,
    ) -> wot_pathfind::error::Result<Vec<ShorteningPath>> {
        let generation = self.reader.current();
        self.pathfind.shortening_paths(&generation.graph, uid)
    }

    /// Shortest paths from `uid` to every sentry in the current generation.
    pub fn get_sentries_paths(&self, uid: &str) -> wot_pathfind::error::Result<Vec<SentryPath>> {
        let generation = self.reader.current();
        self.pathfind.sentry_paths(&generation.graph, uid)
    }

    pub fn generation(&self) -> Arc<Generation> {
        self.reader.current()
    }

    pub fn stats(&self) -> GraphStats {
        self.reader.current().stats()
    }

    pub fn reader(&self) -> GenerationReader {
        self.reader.clone()
    }
}
