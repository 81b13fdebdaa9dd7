//! wot-pathfind: Certification graph and trust-path queries.
//!
//! Holds the in-memory web-of-trust graph, classifies sentries from the
//! network parameters, and answers the two path queries: 2-hop shortening
//! paths toward a target and all shortest paths from a source to every
//! sentry. Everything here is synchronous and works on a borrowed graph, so
//! callers decide how generations are shared.

pub mod algorithms;
pub mod error;
pub mod generation;
pub mod graph;
pub mod sentry;
pub mod types;

pub use error::PathfindError;
pub use generation::Generation;
pub use graph::{CertEdge, EdgeInsert, IdentityNode, WotGraph};
pub use sentry::SentryThreshold;
pub use types::{GraphStats, SentryPath, ShorteningPath};

use std::time::Duration;

use crate::algorithms::Budget;

/// Runs path queries against a graph with an optional time budget.
#[derive(Debug, Clone, Default)]
pub struct PathfindEngine {
    max_duration: Option<Duration>,
}

impl PathfindEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort any query running longer than `limit`.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    /// Identities two hops upstream of `uid` that do not certify it directly.
    ///
    /// An empty graph yields an empty result; an unknown uid in a populated
    /// graph is `NodeNotFound`.
    pub fn shortening_paths(
        &self,
        graph: &WotGraph,
        uid: &str,
    ) -> error::Result<Vec<ShorteningPath>> {
        let Some(target) = self.resolve(graph, uid)? else {
            return Ok(Vec::new());
        };

        let mut budget = Budget::new(self.max_duration);
        let results = algorithms::shortening_paths(graph, target, &mut budget)?;
        tracing::debug!(
            uid,
            found = results.len(),
            duration_ms = budget.elapsed().as_millis() as u64,
            "Shortening paths computed"
        );
        Ok(results)
    }

    /// All shortest paths from `uid` to every reachable sentry.
    pub fn sentry_paths(&self, graph: &WotGraph, uid: &str) -> error::Result<Vec<SentryPath>> {
        let Some(source) = self.resolve(graph, uid)? else {
            return Ok(Vec::new());
        };

        let mut budget = Budget::new(self.max_duration);
        let results = algorithms::sentry_paths(graph, source, &mut budget)?;
        tracing::debug!(
            uid,
            sentries = results.len(),
            duration_ms = budget.elapsed().as_millis() as u64,
            "Sentry paths computed"
        );
        Ok(results)
    }

    fn resolve(&self, graph: &WotGraph, uid: &str) -> error::Result<Option<usize>> {
        if graph.is_empty() {
            tracing::debug!(uid, "Query on empty graph");
            return Ok(None);
        }
        graph
            .index_of_uid(uid)
            .map(Some)
            .ok_or_else(|| PathfindError::NodeNotFound {
                uid: uid.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wot_core::{CertificationRecord, IdentityRecord};

    fn sample() -> WotGraph {
        let identities = vec![
            IdentityRecord::new("k1", "alice", true),
            IdentityRecord::new("k2", "bob", true),
            IdentityRecord::new("k3", "carol", true),
        ];
        let certs = vec![
            CertificationRecord::new("k1", "k2"),
            CertificationRecord::new("k2", "k3"),
        ];
        WotGraph::from_records(identities, &certs).0
    }

    #[test]
    fn test_empty_graph_returns_empty() {
        let engine = PathfindEngine::new();
        let graph = WotGraph::new();
        assert!(engine.shortening_paths(&graph, "anyone").unwrap().is_empty());
        assert!(engine.sentry_paths(&graph, "anyone").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_uid() {
        let engine = PathfindEngine::new();
        let graph = sample();
        assert_eq!(
            engine.shortening_paths(&graph, "mallory").unwrap_err(),
            PathfindError::NodeNotFound {
                uid: "mallory".to_string()
            }
        );
        assert!(matches!(
            engine.sentry_paths(&graph, "mallory"),
            Err(PathfindError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_queries_by_uid() {
        let engine = PathfindEngine::new().with_timeout(Duration::from_secs(5));
        let mut graph = sample();
        let carol = graph.index_of_uid("carol").unwrap();
        graph.set_sentry(carol, true);

        let shortening = engine.shortening_paths(&graph, "carol").unwrap();
        assert_eq!(shortening.len(), 1);
        assert_eq!(shortening[0].f2f, "alice");
        assert_eq!(shortening[0].certifiers, vec!["bob"]);

        let sentries = engine.sentry_paths(&graph, "alice").unwrap();
        assert_eq!(sentries.len(), 1);
        assert_eq!(sentries[0].sentry, "carol");
        assert_eq!(sentries[0].length, 2);
    }
}
