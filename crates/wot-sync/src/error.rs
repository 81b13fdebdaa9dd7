//! Error types for the wot-sync crate.

use thiserror::Error;

use crate::journal::JournalError;

/// Failures reported by a ledger collaborator.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed ledger data: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Collaborator unavailable during {operation}: {source}")]
    CollaboratorUnavailable {
        operation: &'static str,
        #[source]
        source: LedgerError,
    },

    #[error("Invalid network parameters: {0}")]
    Parameter(String),

    #[error("Graph mirror error: {0}")]
    Mirror(#[from] wot_graph::GraphError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Config error: {0}")]
    Config(#[from] wot_core::WotError),
}

impl SyncError {
    /// Whether retrying the same rebuild later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CollaboratorUnavailable { .. } | Self::Mirror(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
