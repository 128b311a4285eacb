//! Vault module — envelope encryption for linked-account credentials.
//!
//! This module provides:
//! - The singleton `VaultMetadata` record and hint policy (`metadata`)
//! - `CredentialRecord` and the associated-data scheme (`secret`)
//! - Bulk re-encryption and per-secret accessors (`reencrypt`)
//! - The `Vault` state machine with lock / unlock / rotate (`manager`)

pub mod manager;
pub mod metadata;
pub mod reencrypt;
pub mod secret;

// Re-export the most commonly used items.
pub use manager::{LockReport, ReconcileReport, Vault, VaultOptions, VaultStatus};
pub use metadata::{LockedState, VaultMetadata, VaultState, METADATA_VERSION};
pub use reencrypt::{read_secret, seal_secret};
pub use secret::{associated_data, CredentialRecord, CredentialSummary, SecretForm};
