//! Ledger events that may invalidate the published graph.
//!
//! The ledger emits one event per accepted block. Events travel over a
//! channel to the resync trigger, which decides whether a rebuild is needed.

use serde::{Deserialize, Serialize};

use crate::types::Pubkey;

/// An event emitted by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event_type")]
pub enum LedgerEvent {
    /// A block was accepted into the ledger.
    BlockAccepted {
        number: u64,
        hash: String,
        /// Identities that became members in this block.
        #[serde(default)]
        joiners: Vec<Pubkey>,
        /// Members that asked to leave.
        #[serde(default)]
        leavers: Vec<Pubkey>,
        /// Members excluded by the membership rules.
        #[serde(default)]
        excluded: Vec<Pubkey>,
        /// Number of certifications written in this block.
        #[serde(default)]
        certifications: u32,
    },
    /// The ledger switched to another branch; blocks above `fork_point` were reverted.
    ForkResolved { fork_point: u64 },
}

impl LedgerEvent {
    /// Whether new members joined in this event.
    pub fn has_joiners(&self) -> bool {
        matches!(self, Self::BlockAccepted { joiners, .. } if !joiners.is_empty())
    }

    /// Whether anything in the certification graph may have changed.
    pub fn touches_wot(&self) -> bool {
        match self {
            Self::BlockAccepted {
                joiners,
                leavers,
                excluded,
                certifications,
                ..
            } => {
                !joiners.is_empty()
                    || !leavers.is_empty()
                    || !excluded.is_empty()
                    || *certifications > 0
            }
            Self::ForkResolved { .. } => true,
        }
    }

    /// Block number the event refers to.
    pub fn block_number(&self) -> u64 {
        match self {
            Self::BlockAccepted { number, .. } => *number,
            Self::ForkResolved { fork_point } => *fork_point,
        }
    }
}
