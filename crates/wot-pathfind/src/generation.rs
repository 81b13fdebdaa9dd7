//! Immutable graph snapshots published to readers.

use chrono::{DateTime, Utc};

use wot_core::{CertificationRecord, IdentityRecord};

use crate::error::PathfindError;
use crate::graph::WotGraph;
use crate::sentry::{classify, SentryThreshold};
use crate::types::GraphStats;

/// A fully built and classified graph. Never mutated once published.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Monotonic id; 0 is the empty generation that exists before any rebuild.
    pub id: u64,
    pub built_at: DateTime<Utc>,
    pub graph: WotGraph,
    pub threshold: SentryThreshold,
    pub sentry_count: usize,
    /// Certifications dropped because an endpoint was missing.
    pub skipped_edges: Vec<PathfindError>,
    pub fingerprint: String,
}

impl Generation {
    pub fn empty() -> Self {
        let graph = WotGraph::new();
        let fingerprint = graph.fingerprint();
        Self {
            id: 0,
            built_at: Utc::now(),
            graph,
            threshold: SentryThreshold {
                members_count: 0,
                step_max: 1,
                d_sen: 0,
            },
            sentry_count: 0,
            skipped_edges: Vec::new(),
            fingerprint,
        }
    }

    /// Build the graph from ledger rows and classify sentries.
    pub fn build(
        id: u64,
        identities: Vec<IdentityRecord>,
        certifications: &[CertificationRecord],
        threshold: SentryThreshold,
    ) -> Self {
        let (mut graph, skipped_edges) = WotGraph::from_records(identities, certifications);
        for skipped in &skipped_edges {
            tracing::warn!(generation = id, error = %skipped, "Certification skipped");
        }

        let sentry_count = classify(&mut graph, &threshold);
        let fingerprint = graph.fingerprint();

        Self {
            id,
            built_at: Utc::now(),
            graph,
            threshold,
            sentry_count,
            skipped_edges,
            fingerprint,
        }
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            generation: self.id,
            total_nodes: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
            member_count: self.graph.member_count(),
            sentry_count: self.sentry_count,
            d_sen: self.threshold.d_sen,
            skipped_edges: self.skipped_edges.len(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::empty()
    }
}
