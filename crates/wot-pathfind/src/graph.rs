//! In-memory certification graph.
//!
//! Identities are stored in a dense vector and addressed by index; the
//! pubkey and uid maps give O(1) lookups into it. Edges live in two
//! adjacency lists (outgoing with metadata, incoming as bare indices) so
//! both degree directions cost O(local degree). Cycles need no special
//! handling since nothing holds a reference to another node.

use std::collections::HashMap;

use wot_core::{BlockRef, CertificationRecord, IdentityRecord, Pubkey};

use crate::error::{PathfindError, Result};

/// A ledger identity inside one graph generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityNode {
    /// Dense index (0..N-1) for O(1) lookup.
    pub index: usize,
    pub pubkey: Pubkey,
    pub uid: String,
    pub member: bool,
    pub created_on: BlockRef,
    pub written_on: BlockRef,
    /// Set by the sentry classifier only.
    pub is_sentry: bool,
}

/// Outgoing certification edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertEdge {
    /// Receiver node index.
    pub target_index: usize,
    pub created_on: BlockRef,
    pub written_on: BlockRef,
}

/// Outcome of inserting a certification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeInsert {
    Inserted,
    /// The (issuer, receiver) pair already existed; metadata was overwritten.
    Replaced,
}

/// Directed certification graph of one generation.
#[derive(Debug, Clone, Default)]
pub struct WotGraph {
    nodes: Vec<IdentityNode>,
    /// `adjacency[i]` = certifications issued by node `i`.
    adjacency: Vec<Vec<CertEdge>>,
    /// `incoming[i]` = issuers certifying node `i`.
    incoming: Vec<Vec<usize>>,
    node_index: HashMap<Pubkey, usize>,
    uid_index: HashMap<String, usize>,
}

impl WotGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            adjacency: Vec::with_capacity(nodes),
            incoming: Vec::with_capacity(nodes),
            node_index: HashMap::with_capacity(nodes),
            uid_index: HashMap::with_capacity(nodes),
        }
    }

    /// Build a graph from ledger rows.
    ///
    /// Certifications that reference an unknown identity are skipped and
    /// returned as `DanglingReference` errors alongside the graph.
    pub fn from_records(
        identities: Vec<IdentityRecord>,
        certifications: &[CertificationRecord],
    ) -> (Self, Vec<PathfindError>) {
        let mut graph = Self::with_capacity(identities.len());
        for identity in identities {
            graph.add_node(identity);
        }

        let mut skipped = Vec::new();
        for cert in certifications {
            if let Err(e) = graph.add_edge(cert) {
                skipped.push(e);
            }
        }

        (graph, skipped)
    }

    /// Drop every node and edge.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.adjacency.clear();
        self.incoming.clear();
        self.node_index.clear();
        self.uid_index.clear();
    }

    /// Insert an identity, or replace the one with the same pubkey.
    ///
    /// A replaced node keeps its index and its edges; its sentry flag is reset.
    pub fn add_node(&mut self, record: IdentityRecord) -> usize {
        if let Some(&index) = self.node_index.get(&record.pubkey) {
            let node = &mut self.nodes[index];
            if node.uid != record.uid && self.uid_index.get(&node.uid) == Some(&index) {
                self.uid_index.remove(&node.uid);
            }
            node.uid = record.uid;
            node.member = record.member;
            node.created_on = record.created_on;
            node.written_on = record.written_on;
            node.is_sentry = false;
            let uid = node.uid.clone();
            self.index_uid(uid, index);
            return index;
        }

        let index = self.nodes.len();
        let uid = record.uid.clone();
        self.node_index.insert(record.pubkey.clone(), index);
        self.nodes.push(IdentityNode {
            index,
            pubkey: record.pubkey,
            uid: record.uid,
            member: record.member,
            created_on: record.created_on,
            written_on: record.written_on,
            is_sentry: false,
        });
        self.adjacency.push(Vec::new());
        self.incoming.push(Vec::new());
        self.index_uid(uid, index);
        index
    }

    /// Point `uid` at `index`. A uid held by another identity moves to this one.
    fn index_uid(&mut self, uid: String, index: usize) {
        if let Some(previous) = self.uid_index.insert(uid, index) {
            if previous != index {
                tracing::warn!(
                    uid = %self.nodes[index].uid,
                    previous = %self.nodes[previous].pubkey,
                    current = %self.nodes[index].pubkey,
                    "Duplicate uid, lookups now resolve to the latest identity"
                );
            }
        }
    }

    /// Insert a certification, or overwrite the metadata of an existing one.
    pub fn add_edge(&mut self, cert: &CertificationRecord) -> Result<EdgeInsert> {
        let dangling = |missing: &Pubkey| PathfindError::DanglingReference {
            issuer: cert.issuer.clone(),
            receiver: cert.receiver.clone(),
            missing: missing.clone(),
        };
        let src = self.index_of(&cert.issuer).ok_or_else(|| dangling(&cert.issuer))?;
        let tgt = self
            .index_of(&cert.receiver)
            .ok_or_else(|| dangling(&cert.receiver))?;

        if let Some(edge) = self.adjacency[src].iter_mut().find(|e| e.target_index == tgt) {
            edge.created_on = cert.created_on.clone();
            edge.written_on = cert.written_on.clone();
            return Ok(EdgeInsert::Replaced);
        }

        self.adjacency[src].push(CertEdge {
            target_index: tgt,
            created_on: cert.created_on.clone(),
            written_on: cert.written_on.clone(),
        });
        self.incoming[tgt].push(src);
        Ok(EdgeInsert::Inserted)
    }

    pub fn set_sentry(&mut self, index: usize, is_sentry: bool) {
        self.nodes[index].is_sentry = is_sentry;
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub fn index_of(&self, pubkey: &Pubkey) -> Option<usize> {
        self.node_index.get(pubkey).copied()
    }

    pub fn index_of_uid(&self, uid: &str) -> Option<usize> {
        self.uid_index.get(uid).copied()
    }

    pub fn node(&self, index: usize) -> &IdentityNode {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[IdentityNode] {
        &self.nodes
    }

    pub fn out_edges(&self, index: usize) -> &[CertEdge] {
        &self.adjacency[index]
    }

    /// Receivers certified by `index`.
    pub fn neighbors_out(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[index].iter().map(|e| e.target_index)
    }

    /// Issuers certifying `index`.
    pub fn neighbors_in(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.incoming[index].iter().copied()
    }

    pub fn in_degree(&self, index: usize) -> usize {
        self.incoming[index].len()
    }

    pub fn out_degree(&self, index: usize) -> usize {
        self.adjacency[index].len()
    }

    /// Whether `from` directly certifies `to`.
    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.adjacency[from].iter().any(|e| e.target_index == to)
    }

    pub fn sentry_nodes(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.is_sentry)
            .map(|n| n.index)
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|edges| edges.len()).sum()
    }

    pub fn member_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.member).count()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// BLAKE3 digest of the node and edge set, independent of insertion order.
    pub fn fingerprint(&self) -> String {
        let mut order: Vec<usize> = (0..self.nodes.len()).collect();
        order.sort_by(|&a, &b| self.nodes[a].pubkey.cmp(&self.nodes[b].pubkey));

        let mut hasher = blake3::Hasher::new();
        for &i in &order {
            let n = &self.nodes[i];
            hasher.update(
                format!(
                    "N|{}|{}|{}|{}|{}|{}\n",
                    n.pubkey, n.uid, n.member, n.created_on, n.written_on, n.is_sentry
                )
                .as_bytes(),
            );
        }
        for &i in &order {
            let mut edges: Vec<&CertEdge> = self.adjacency[i].iter().collect();
            edges.sort_by(|a, b| {
                self.nodes[a.target_index]
                    .pubkey
                    .cmp(&self.nodes[b.target_index].pubkey)
            });
            for e in edges {
                hasher.update(
                    format!(
                        "E|{}|{}|{}|{}\n",
                        self.nodes[i].pubkey,
                        self.nodes[e.target_index].pubkey,
                        e.created_on,
                        e.written_on
                    )
                    .as_bytes(),
                );
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
