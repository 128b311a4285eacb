use std::fmt;

use thiserror::Error;

/// Why an authentication check failed.
///
/// Every variant is an authentication failure to the caller; the variant only
/// changes the wording so that "no session" is not reported as corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// Raw AEAD failure. Wrong key, tampered bytes and wrong associated data
    /// all collapse into this one case.
    InvalidTag,

    /// The password did not unwrap the DEK (or the metadata is corrupted).
    WrongPassword,

    /// A ciphertext was read without a session key.
    NoSession,

    /// A verified DEK failed to open this owner's ciphertext.
    RecordTampered(String),
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTag => f.write_str("ciphertext failed authentication"),
            Self::WrongPassword => f.write_str("wrong password or corrupted vault metadata"),
            Self::NoSession => {
                f.write_str("vault is locked and no valid password/session was provided")
            }
            Self::RecordTampered(owner) => {
                write!(f, "stored credential for '{owner}' is corrupted or was tampered with")
            }
        }
    }
}

/// Coarse classification used by callers that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Precondition,
    Storage,
    Consistency,
    Other,
}

/// All errors that can occur in TokenVault.
#[derive(Debug, Error)]
pub enum TokenVaultError {
    // --- Vault errors ---
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(AuthFailure),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Vault is inconsistent: {0} (manual reconciliation required)")]
    ConsistencyFailure(String),

    #[error("Invalid password hint: {0}")]
    InvalidHint(String),

    #[error("Invalid owner id: {0}")]
    InvalidOwnerId(String),

    #[error("No linked account for owner '{0}'")]
    AccountNotFound(String),

    #[error("Account '{0}' is already linked")]
    AccountAlreadyLinked(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

impl TokenVaultError {
    /// Map this error onto the four failure categories of the vault.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationFailed(_) => ErrorKind::Authentication,
            Self::PreconditionFailed(_)
            | Self::InvalidHint(_)
            | Self::InvalidOwnerId(_)
            | Self::AccountNotFound(_)
            | Self::AccountAlreadyLinked(_) => ErrorKind::Precondition,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
            Self::ConsistencyFailure(_) => ErrorKind::Consistency,
            _ => ErrorKind::Other,
        }
    }

    /// Returns `true` for any authentication failure.
    pub fn is_auth_failure(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }
}

impl From<rusqlite::Error> for TokenVaultError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Convenience type alias for TokenVault results.
pub type Result<T> = std::result::Result<T, TokenVaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_vault_failures() {
        let auth = TokenVaultError::AuthenticationFailed(AuthFailure::WrongPassword);
        assert_eq!(auth.kind(), ErrorKind::Authentication);
        assert!(auth.is_auth_failure());

        let pre = TokenVaultError::PreconditionFailed("already locked".into());
        assert_eq!(pre.kind(), ErrorKind::Precondition);

        let consistency = TokenVaultError::ConsistencyFailure("missing salt".into());
        assert_eq!(consistency.kind(), ErrorKind::Consistency);

        let storage: TokenVaultError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(storage.kind(), ErrorKind::Storage);
    }

    #[test]
    fn no_session_message_is_not_corruption() {
        let msg = TokenVaultError::AuthenticationFailed(AuthFailure::NoSession).to_string();
        assert!(msg.contains("no valid password/session"));
        assert!(!msg.contains("tampered"));
    }
}
