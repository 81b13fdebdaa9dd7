//! Error types for the wot-pathfind crate.

use thiserror::Error;

use wot_core::Pubkey;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathfindError {
    #[error("Node not found: no identity with uid {uid}")]
    NodeNotFound { uid: String },

    #[error("Dangling certification {issuer} -> {receiver}: {missing} is not in the graph")]
    DanglingReference {
        issuer: Pubkey,
        receiver: Pubkey,
        missing: Pubkey,
    },

    #[error("Invalid network parameter: {0}")]
    InvalidParameter(String),

    #[error("Computation timeout: exceeded {max_ms}ms limit")]
    Timeout { max_ms: u64 },
}

pub type Result<T> = std::result::Result<T, PathfindError>;
