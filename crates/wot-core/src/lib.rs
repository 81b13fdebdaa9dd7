//! wot-core: Shared types, configuration, and error handling for the web-of-trust graph.
//!
//! This crate provides the foundational types used across all wot components:
//! - Identity and certification records as materialized by the ledger
//! - Ledger events that can trigger a graph resync
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use error::WotError;
pub use events::LedgerEvent;
pub use types::{BlockRef, CertificationRecord, IdentityRecord, Pubkey};
