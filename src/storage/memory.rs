//! In-memory storage backend.
//!
//! A transaction works on a staged copy of the whole store and swaps it
//! in only when the closure succeeds.

use std::collections::BTreeMap;

use super::{Storage, StorageTx};
use crate::errors::Result;
use crate::vault::{CredentialRecord, VaultMetadata};

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    metadata: Option<VaultMetadata>,
    credentials: BTreeMap<String, CredentialRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageTx for MemoryStorage {
    fn load_metadata(&self) -> Result<Option<VaultMetadata>> {
        Ok(self.metadata.clone())
    }

    fn store_metadata(&mut self, metadata: &VaultMetadata) -> Result<()> {
        self.metadata = Some(metadata.clone());
        Ok(())
    }

    fn load_credential(&self, owner_id: &str) -> Result<Option<CredentialRecord>> {
        Ok(self.credentials.get(owner_id).cloned())
    }

    fn load_credentials(&self) -> Result<Vec<CredentialRecord>> {
        Ok(self.credentials.values().cloned().collect())
    }

    fn store_credential(&mut self, record: &CredentialRecord) -> Result<()> {
        self.credentials
            .insert(record.owner_id.clone(), record.clone());
        Ok(())
    }

    fn delete_credential(&mut self, owner_id: &str) -> Result<bool> {
        Ok(self.credentials.remove(owner_id).is_some())
    }
}

impl Storage for MemoryStorage {
    fn transaction<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn StorageTx) -> Result<R>,
    {
        let mut staged = self.clone();
        let out = f(&mut staged)?;
        *self = staged;
        Ok(out)
    }
}
