//! Key buffers that wipe themselves.
//!
//! `Dek` is the data encryption key that protects every stored refresh
//! token; `Kek` is the password-derived key that wraps it.  Neither type
//! is `Clone`, both zero their bytes when dropped, and their `Debug`
//! output never shows key material.

use std::fmt;

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{AuthFailure, Result, TokenVaultError};

/// Length of every symmetric key in bytes (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Data encryption key.
///
/// Only produced by locking (fresh random key) or by unwrapping the
/// stored wrapped DEK, so a `Dek` held by a caller has always been
/// verified against the vault metadata.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Dek {
    bytes: [u8; KEY_LEN],
}

impl Dek {
    /// Generate a fresh random DEK.
    pub(crate) fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Rebuild a DEK from an unwrapped buffer.
    ///
    /// A wrong length means the wrap was made by something else; it is
    /// reported the same way as a wrong password.
    pub(crate) fn from_unwrapped(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(TokenVaultError::AuthenticationFailed(
                AuthFailure::WrongPassword,
            ));
        }
        let mut dek = Self {
            bytes: [0u8; KEY_LEN],
        };
        dek.bytes.copy_from_slice(bytes);
        Ok(dek)
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for Dek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dek(<redacted>)")
    }
}

/// Key-encrypting key derived from a password.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Kek {
    bytes: [u8; KEY_LEN],
}

impl Kek {
    /// Take ownership of freshly derived bytes; the source array is wiped.
    pub(crate) fn new(mut bytes: [u8; KEY_LEN]) -> Self {
        let kek = Self { bytes };
        bytes.zeroize();
        kek
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for Kek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Kek(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_deks_are_distinct() {
        let a = Dek::generate();
        let b = Dek::generate();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn unwrapped_dek_requires_exact_length() {
        assert!(Dek::from_unwrapped(&[1u8; KEY_LEN]).is_ok());
        let err = Dek::from_unwrapped(&[1u8; 16]).unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[test]
    fn debug_output_is_redacted() {
        let dek = Dek::generate();
        assert_eq!(format!("{dek:?}"), "Dek(<redacted>)");
        let kek = Kek::new([9u8; KEY_LEN]);
        assert!(!format!("{kek:?}").contains('9'));
    }
}
