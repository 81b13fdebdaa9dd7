//! Query results and graph statistics.

use serde::{Deserialize, Serialize};

/// An identity two certification hops away from the target that does not
/// certify it directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShorteningPath {
    /// Uid of the indirect certifier.
    pub f2f: String,
    /// Uids of the intermediates, sorted.
    pub certifiers: Vec<String>,
    /// Number of 2-hop paths from `f2f` to the target.
    pub path_count: usize,
}

/// Every shortest certification path from the source to one sentry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentryPath {
    /// Uid of the sentry reached.
    pub sentry: String,
    /// Number of distinct shortest paths.
    pub count: u64,
    /// Length in edges shared by all of them.
    pub length: usize,
    /// Intermediate uids of each path, source and sentry excluded.
    pub paths: Vec<Vec<String>>,
}

/// Statistics about one graph generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphStats {
    pub generation: u64,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub member_count: usize,
    pub sentry_count: usize,
    pub d_sen: u64,
    pub skipped_edges: usize,
    pub fingerprint: String,
}
