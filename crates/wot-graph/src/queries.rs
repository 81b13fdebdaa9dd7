//! Read helpers over the mirrored graph.

use neo4rs::query;

use crate::client::{GraphClient, GraphError};

impl GraphClient {
    pub async fn count_identities(&self) -> Result<i64, GraphError> {
        let q = query("MATCH (n:Idty) RETURN count(n) AS cnt");
        match self.query_one(q).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0)),
            None => Ok(0),
        }
    }

    pub async fn count_certifications(&self) -> Result<i64, GraphError> {
        let q = query("MATCH (:Idty)-[r:CERTIFY]->(:Idty) RETURN count(r) AS cnt");
        match self.query_one(q).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Uids of every node flagged as a sentry, sorted.
    pub async fn sentry_uids(&self) -> Result<Vec<String>, GraphError> {
        let q = query("MATCH (n:Idty) WHERE n.sentry = 1 RETURN n.uid AS uid ORDER BY uid");
        let rows = self.query_rows(q).await?;

        rows.iter()
            .map(|row| {
                row.get::<String>("uid").map_err(|e| {
                    GraphError::Serialization(format!("Failed to read sentry uid: {e}"))
                })
            })
            .collect()
    }
}
