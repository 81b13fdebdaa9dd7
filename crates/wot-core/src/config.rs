//! Configuration management for wot services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`WOT__` prefix, `__` separator)
//! 2. Config file (`wot.toml` by default)
//! 3. Defaults

use serde::Deserialize;

use crate::error::WotError;
use crate::events::LedgerEvent;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WotConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub neo4j: Neo4jConfig,
}

/// Where the ledger snapshot is read from.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// JSON snapshot consumed by the file-backed ledger.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

/// Rebuild and query behaviour.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    /// Directory for the rebuild journal. Journal disabled when unset.
    #[serde(default)]
    pub journal_dir: Option<String>,

    /// Which ledger events trigger a rebuild.
    #[serde(default)]
    pub resync_policy: ResyncPolicy,

    /// Time budget for a single path query, in milliseconds.
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,
}

/// Optional Neo4j mirror of the published graph.
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_neo4j_uri")]
    pub uri: String,

    #[serde(default = "default_neo4j_user")]
    pub user: String,

    #[serde(default = "default_neo4j_password")]
    pub password: String,
}

/// Which ledger events cause the graph to be rebuilt.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResyncPolicy {
    /// Rebuild only when a block brings new members.
    #[default]
    JoinersOnly,
    /// Rebuild on any membership or certification change.
    AnyWotChange,
}

impl ResyncPolicy {
    pub fn should_resync(&self, event: &LedgerEvent) -> bool {
        match self {
            Self::JoinersOnly => event.has_joiners(),
            Self::AnyWotChange => event.touches_wot(),
        }
    }
}

fn default_snapshot_path() -> String {
    "./ledger.json".to_string()
}

fn default_neo4j_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_neo4j_user() -> String {
    "neo4j".to_string()
}

fn default_neo4j_password() -> String {
    "neo4j".to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: default_neo4j_uri(),
            user: default_neo4j_user(),
            password: default_neo4j_password(),
        }
    }
}

/// Load configuration from `{file_prefix}.toml` (optional) and `WOT__*` env vars.
pub fn load(file_prefix: &str) -> Result<WotConfig, WotError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("WOT")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let loaded: WotConfig = cfg.try_deserialize()?;
    tracing::debug!(
        snapshot = %loaded.ledger.snapshot_path,
        policy = ?loaded.sync.resync_policy,
        neo4j = loaded.neo4j.enabled,
        "Configuration loaded"
    );
    Ok(loaded)
}
