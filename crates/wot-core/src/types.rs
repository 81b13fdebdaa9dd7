//! Ledger record types consumed by the web-of-trust graph.
//!
//! These are the rows the ledger collaborator materializes for us: one
//! [`IdentityRecord`] per registered identity and one [`CertificationRecord`]
//! per certification. The graph never validates them beyond referential
//! integrity between the two lists.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Identity keys ─────────────────────────────────────────────────

/// Public key identifying a ledger identity. Primary key of a graph node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Pubkey(pub String);

impl Pubkey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pubkey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Block references ──────────────────────────────────────────────

/// Opaque reference to a ledger block (`created_on`, `written_on`).
///
/// The ledger writes these as `"<number>-<hash>"`; only the block-number
/// token is kept. Two tokens that both parse as numbers order numerically,
/// anything else falls back to lexical order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub struct BlockRef(String);

impl BlockRef {
    /// Build a reference from the raw ledger column, dropping the hash part.
    pub fn from_ledger(raw: &str) -> Self {
        let token = raw.split('-').next().unwrap_or_default();
        Self(token.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Block number, when the token is numeric.
    pub fn block_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl From<String> for BlockRef {
    fn from(raw: String) -> Self {
        Self::from_ledger(&raw)
    }
}

impl From<&str> for BlockRef {
    fn from(raw: &str) -> Self {
        Self::from_ledger(raw)
    }
}

impl From<BlockRef> for String {
    fn from(r: BlockRef) -> Self {
        r.0
    }
}

impl Ord for BlockRef {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.block_number(), other.block_number()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for BlockRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Ledger rows ───────────────────────────────────────────────────

/// An identity row as listed by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityRecord {
    #[serde(alias = "pub")]
    pub pubkey: Pubkey,
    pub uid: String,
    pub member: bool,
    #[serde(default)]
    pub created_on: BlockRef,
    #[serde(default)]
    pub written_on: BlockRef,
}

impl IdentityRecord {
    pub fn new(pubkey: &str, uid: &str, member: bool) -> Self {
        Self {
            pubkey: Pubkey::from(pubkey),
            uid: uid.to_string(),
            member,
            created_on: BlockRef::default(),
            written_on: BlockRef::default(),
        }
    }
}

/// A certification row: `issuer` vouches for `receiver`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertificationRecord {
    pub issuer: Pubkey,
    pub receiver: Pubkey,
    #[serde(default)]
    pub created_on: BlockRef,
    #[serde(default)]
    pub written_on: BlockRef,
}

impl CertificationRecord {
    pub fn new(issuer: &str, receiver: &str) -> Self {
        Self {
            issuer: Pubkey::from(issuer),
            receiver: Pubkey::from(receiver),
            created_on: BlockRef::default(),
            written_on: BlockRef::default(),
        }
    }

    /// Same certification with explicit block metadata.
    pub fn written(mut self, created_on: &str, written_on: &str) -> Self {
        self.created_on = BlockRef::from_ledger(created_on);
        self.written_on = BlockRef::from_ledger(written_on);
        self
    }
}
