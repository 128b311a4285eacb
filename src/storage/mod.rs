//! Persistence seam for the vault.
//!
//! The vault never talks to a database directly.  It works against
//! `StorageTx` (plain reads and writes) and asks a `Storage` to run a
//! closure inside an atomic transaction: either every write the closure
//! made becomes visible, or none does.
//!
//! Two backends are provided:
//! - `SqliteStorage` (`sqlite`) for real use
//! - `MemoryStorage` (`memory`) for tests and embedding

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::errors::Result;
use crate::vault::{CredentialRecord, VaultMetadata};

/// Reads and writes available both inside and outside a transaction.
pub trait StorageTx {
    /// Load the metadata record, `None` if it was never written.
    fn load_metadata(&self) -> Result<Option<VaultMetadata>>;

    /// Insert or replace the metadata record.
    fn store_metadata(&mut self, metadata: &VaultMetadata) -> Result<()>;

    fn load_credential(&self, owner_id: &str) -> Result<Option<CredentialRecord>>;

    /// Load every credential record, ordered by owner id.
    fn load_credentials(&self) -> Result<Vec<CredentialRecord>>;

    /// Insert or replace a credential record.
    fn store_credential(&mut self, record: &CredentialRecord) -> Result<()>;

    /// Delete a credential record; returns `false` if none existed.
    fn delete_credential(&mut self, owner_id: &str) -> Result<bool>;
}

/// A storage backend that can run work atomically.
pub trait Storage: StorageTx {
    /// Run `f` in a transaction.  Commits when `f` returns `Ok`, rolls
    /// back every write when it returns `Err`.
    fn transaction<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn StorageTx) -> Result<R>;
}
