//! The singleton vault metadata record.
//!
//! The salt, KDF parameters and wrapped DEK only exist inside
//! `VaultState::Locked`, so an in-memory value can never claim to be
//! locked without them.  Persisted rows that break this rule are caught
//! by the storage layer and reported as a consistency failure.

use chrono::{DateTime, Utc};

use crate::crypto::{KdfParams, Sealed, SALT_LEN};
use crate::errors::{Result, TokenVaultError};

/// Current metadata format version.
pub const METADATA_VERSION: u32 = 1;

/// Default maximum length of a password hint, in characters.
pub const DEFAULT_MAX_HINT_LEN: usize = 128;

/// Everything needed to re-derive the KEK and unwrap the DEK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedState {
    /// KDF algorithm and the exact parameters used when wrapping.
    pub kdf: KdfParams,

    /// Random salt fed to the KDF.
    pub salt: [u8; SALT_LEN],

    /// The DEK encrypted under the KEK, with no associated data.
    pub wrapped_dek: Sealed,

    /// Advisory hint, readable without the password.
    pub password_hint: Option<String>,

    /// When the vault was first locked.
    pub locked_at: DateTime<Utc>,

    /// When the password was last rotated.
    pub rotated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultState {
    Unlocked,
    Locked(LockedState),
}

/// The vault metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultMetadata {
    /// Format version of this record.
    pub version: u32,
    pub state: VaultState,
}

impl Default for VaultMetadata {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION,
            state: VaultState::Unlocked,
        }
    }
}

impl VaultMetadata {
    pub fn locked(state: LockedState) -> Self {
        Self {
            version: METADATA_VERSION,
            state: VaultState::Locked(state),
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.state, VaultState::Locked(_))
    }

    pub fn locked_state(&self) -> Option<&LockedState> {
        match &self.state {
            VaultState::Locked(locked) => Some(locked),
            VaultState::Unlocked => None,
        }
    }

    pub fn password_hint(&self) -> Option<&str> {
        self.locked_state()
            .and_then(|locked| locked.password_hint.as_deref())
    }

    /// Reject records written by a newer release.
    pub fn check_version(&self) -> Result<()> {
        if self.version > METADATA_VERSION {
            return Err(TokenVaultError::ConsistencyFailure(format!(
                "metadata version {} is newer than supported version {METADATA_VERSION}",
                self.version
            )));
        }
        Ok(())
    }
}

/// Normalize and validate a password hint.
///
/// The hint is stored in cleartext next to the wrapped key, so it is
/// trimmed, limited to `max_len` characters, must not contain control
/// characters and must not be the password itself.  An empty hint is
/// treated as no hint.
pub fn normalize_hint(
    hint: Option<&str>,
    password: &[u8],
    max_len: usize,
) -> Result<Option<String>> {
    let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) else {
        return Ok(None);
    };

    if hint.chars().count() > max_len {
        return Err(TokenVaultError::InvalidHint(format!(
            "hint cannot exceed {max_len} characters"
        )));
    }
    if hint.chars().any(char::is_control) {
        return Err(TokenVaultError::InvalidHint(
            "hint cannot contain control characters".into(),
        ));
    }
    if hint.as_bytes() == password {
        return Err(TokenVaultError::InvalidHint(
            "hint cannot be the password".into(),
        ));
    }

    Ok(Some(hint.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metadata_is_unlocked() {
        let meta = VaultMetadata::default();
        assert!(!meta.is_locked());
        assert_eq!(meta.version, METADATA_VERSION);
        assert!(meta.password_hint().is_none());
    }

    #[test]
    fn newer_version_is_rejected() {
        let meta = VaultMetadata {
            version: METADATA_VERSION + 1,
            state: VaultState::Unlocked,
        };
        assert!(meta.check_version().is_err());
    }

    #[test]
    fn hint_is_trimmed_and_empty_means_none() {
        assert_eq!(
            normalize_hint(Some("  first pet  "), b"pw", 128).unwrap(),
            Some("first pet".to_string())
        );
        assert_eq!(normalize_hint(Some("   "), b"pw", 128).unwrap(), None);
        assert_eq!(normalize_hint(None, b"pw", 128).unwrap(), None);
    }

    #[test]
    fn hint_length_is_limited() {
        let long = "x".repeat(129);
        assert!(normalize_hint(Some(&long), b"pw", 128).is_err());
        let exact = "é".repeat(128);
        assert!(normalize_hint(Some(&exact), b"pw", 128).is_ok());
    }

    #[test]
    fn hint_rejects_control_chars_and_password() {
        assert!(normalize_hint(Some("line\nbreak"), b"pw", 128).is_err());
        assert!(normalize_hint(Some("hunter2"), b"hunter2", 128).is_err());
    }
}
