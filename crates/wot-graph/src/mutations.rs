//! Write operations: whole-graph replacement.
//!
//! The mirror is rebuilt from scratch on every generation, so there is no
//! upsert path. Deletion and re-creation run in one transaction; a failure
//! anywhere leaves the previous mirror untouched.

use neo4rs::query;
use serde::{Deserialize, Serialize};

use wot_core::CertificationRecord;

use crate::client::{GraphClient, GraphError};

/// One `Idty` node as written to Neo4j.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdtyRow {
    pub pubkey: String,
    pub uid: String,
    pub member: bool,
    pub created_on: String,
    pub written_on: String,
    pub sentry: bool,
}

/// What a mirror pass wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSummary {
    pub identities: usize,
    pub certifications: usize,
}

impl GraphClient {
    /// Replace the whole web-of-trust graph with `identities` and `certifications`.
    pub async fn replace_wot(
        &self,
        identities: &[IdtyRow],
        certifications: &[CertificationRecord],
    ) -> Result<MirrorSummary, GraphError> {
        let mut txn = self.start_txn().await?;

        txn.run(query("MATCH (n:Idty) DETACH DELETE n")).await?;

        for idty in identities {
            let q = query(
                "CREATE (n:Idty {
                   pubkey: $pubkey, uid: $uid, member: $member,
                   created_on: $created_on, written_on: $written_on,
                   sentry: $sentry
                 })",
            )
            .param("pubkey", idty.pubkey.clone())
            .param("uid", idty.uid.clone())
            .param("member", idty.member)
            .param("created_on", idty.created_on.clone())
            .param("written_on", idty.written_on.clone())
            // Integer flag keeps `WHERE n.sentry = 1` queries working.
            .param("sentry", i64::from(idty.sentry));

            txn.run(q).await?;
        }

        for cert in certifications {
            let q = query(
                "MATCH (a:Idty {pubkey: $issuer}), (b:Idty {pubkey: $receiver})
                 CREATE (a)-[:CERTIFY {created_on: $created_on, written_on: $written_on}]->(b)",
            )
            .param("issuer", cert.issuer.to_string())
            .param("receiver", cert.receiver.to_string())
            .param("created_on", cert.created_on.to_string())
            .param("written_on", cert.written_on.to_string());

            txn.run(q).await?;
        }

        txn.commit().await?;

        let summary = MirrorSummary {
            identities: identities.len(),
            certifications: certifications.len(),
        };
        tracing::info!(
            identities = summary.identities,
            certifications = summary.certifications,
            "Neo4j mirror replaced"
        );
        Ok(summary)
    }

    /// Remove every `Idty` node and its certifications.
    pub async fn clear_wot(&self) -> Result<(), GraphError> {
        self.run(query("MATCH (n:Idty) DETACH DELETE n")).await
    }
}
