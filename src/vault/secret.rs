//! Credential records: one stored refresh token per linked account.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::crypto::Sealed;
use crate::errors::{Result, TokenVaultError};

/// Record kind used in the associated-data string.
pub const RECORD_KIND: &str = "credential";

/// Associated-data scheme version written for new ciphertexts.
pub const CURRENT_AAD_VERSION: u32 = 1;

/// Maximum owner id length in bytes.
const MAX_OWNER_ID_LEN: usize = 256;

/// How a refresh token is held in storage.  Exactly one form exists.
#[derive(Clone, PartialEq, Eq)]
pub enum SecretForm {
    /// Cleartext, only while the vault has never been locked.
    Plaintext(String),

    /// AES-256-GCM ciphertext under the DEK, bound to the owner by
    /// associated data of scheme `aad_version`.
    Encrypted { sealed: Sealed, aad_version: u32 },
}

impl SecretForm {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted { .. })
    }
}

impl fmt::Debug for SecretForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext(_) => f.write_str("Plaintext(<redacted>)"),
            Self::Encrypted { aad_version, .. } => f
                .debug_struct("Encrypted")
                .field("aad_version", aad_version)
                .finish_non_exhaustive(),
        }
    }
}

/// A stored credential for one linked account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    /// Id of the owning account (not managed by the vault).
    pub owner_id: String,
    pub secret: SecretForm,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata about a credential without its secret.
#[derive(Debug, Clone)]
pub struct CredentialSummary {
    pub owner_id: String,
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            owner_id: record.owner_id.clone(),
            encrypted: record.secret.is_encrypted(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Build the associated data binding a ciphertext to its owner:
/// `"credential:<owner_id>:v<n>"`.
///
/// Every scheme version ever written must stay accepted here so old
/// records keep validating.
pub fn associated_data(owner_id: &str, aad_version: u32) -> Result<Vec<u8>> {
    match aad_version {
        1 => Ok(format!("{RECORD_KIND}:{owner_id}:v1").into_bytes()),
        other => Err(TokenVaultError::ConsistencyFailure(format!(
            "credential '{owner_id}' uses unknown associated-data version {other}"
        ))),
    }
}

/// Validate that an owner id is usable as a key and inside associated data.
pub fn validate_owner_id(owner_id: &str) -> Result<()> {
    if owner_id.is_empty() {
        return Err(TokenVaultError::InvalidOwnerId(
            "owner id cannot be empty".into(),
        ));
    }
    if owner_id.len() > MAX_OWNER_ID_LEN {
        return Err(TokenVaultError::InvalidOwnerId(format!(
            "owner id cannot exceed {MAX_OWNER_ID_LEN} bytes"
        )));
    }
    if owner_id.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(TokenVaultError::InvalidOwnerId(format!(
            "owner id '{}' contains whitespace or control characters",
            owner_id.escape_debug()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn associated_data_v1_format() {
        assert_eq!(
            associated_data("acct-42", 1).unwrap(),
            b"credential:acct-42:v1".to_vec()
        );
    }

    #[test]
    fn unknown_aad_version_is_a_consistency_failure() {
        let err = associated_data("acct-42", 9).unwrap_err();
        assert!(matches!(err, TokenVaultError::ConsistencyFailure(_)));
    }

    #[test]
    fn owner_id_validation() {
        assert!(validate_owner_id("google:alice@example.com").is_ok());
        assert!(validate_owner_id("").is_err());
        assert!(validate_owner_id("has space").is_err());
        assert!(validate_owner_id("tab\there").is_err());
        assert!(validate_owner_id(&"a".repeat(257)).is_err());
    }

    #[test]
    fn debug_never_prints_plaintext() {
        let form = SecretForm::Plaintext("1//refresh-token".into());
        assert!(!format!("{form:?}").contains("refresh-token"));
    }
}
