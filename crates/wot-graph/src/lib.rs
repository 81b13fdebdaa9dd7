//! wot-graph: Neo4j mirror of the web-of-trust graph.
//!
//! The in-memory generation stays authoritative for queries. This crate
//! replaces the whole `Idty`/`CERTIFY` graph in Neo4j with each published
//! generation so that external Cypher tooling sees the same data, and
//! exposes a few read helpers to check what landed there.

pub mod client;
pub mod mutations;
pub mod queries;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use mutations::{IdtyRow, MirrorSummary};
