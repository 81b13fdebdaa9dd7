//! Mirror a published generation into Neo4j.

use wot_core::CertificationRecord;
use wot_graph::{GraphClient, IdtyRow, MirrorSummary};
use wot_pathfind::Generation;

use crate::error::Result;

/// Flatten a generation into mirror rows.
pub fn mirror_rows(generation: &Generation) -> (Vec<IdtyRow>, Vec<CertificationRecord>) {
    let graph = &generation.graph;

    let identities = graph
        .nodes()
        .iter()
        .map(|node| IdtyRow {
            pubkey: node.pubkey.to_string(),
            uid: node.uid.clone(),
            member: node.member,
            created_on: node.created_on.to_string(),
            written_on: node.written_on.to_string(),
            sentry: node.is_sentry,
        })
        .collect();

    let certifications = graph
        .nodes()
        .iter()
        .flat_map(|node| {
            graph.out_edges(node.index).iter().map(|edge| CertificationRecord {
                issuer: node.pubkey.clone(),
                receiver: graph.node(edge.target_index).pubkey.clone(),
                created_on: edge.created_on.clone(),
                written_on: edge.written_on.clone(),
            })
        })
        .collect();

    (identities, certifications)
}

/// Replace the Neo4j mirror with `generation`.
pub async fn mirror_generation(
    client: &GraphClient,
    generation: &Generation,
) -> Result<MirrorSummary> {
    let (identities, certifications) = mirror_rows(generation);
    let summary = client.replace_wot(&identities, &certifications).await?;
    tracing::debug!(generation = generation.id, "Generation mirrored");
    Ok(summary)
}
