//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce.  The
//! nonce and the 16-byte authentication tag are kept detached from the
//! ciphertext so they can be stored in their own columns.
//!
//! `decrypt` never says *why* it failed: a wrong key, a flipped bit and
//! mismatched associated data all return the same error.

use aes_gcm::aead::{AeadInPlace, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce, Tag};
use zeroize::Zeroizing;

use crate::errors::{AuthFailure, Result, TokenVaultError};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// An encrypted value with its nonce and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

impl Sealed {
    /// Rebuild from stored columns, checking nonce and tag lengths.
    pub fn from_parts(ciphertext: Vec<u8>, nonce: &[u8], tag: &[u8]) -> Option<Self> {
        Some(Self {
            ciphertext,
            nonce: nonce.try_into().ok()?,
            tag: tag.try_into().ok()?,
        })
    }
}

fn auth_failure() -> TokenVaultError {
    TokenVaultError::AuthenticationFailed(AuthFailure::InvalidTag)
}

/// Encrypt `plaintext` with a 32-byte `key`, authenticating `aad` alongside it.
pub fn encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| TokenVaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    // Encrypt in place so the tag comes back detached.
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(&nonce, aad, &mut buffer)
        .map_err(|e| TokenVaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut sealed = Sealed {
        ciphertext: buffer,
        nonce: [0u8; NONCE_LEN],
        tag: [0u8; TAG_LEN],
    };
    sealed.nonce.copy_from_slice(&nonce);
    sealed.tag.copy_from_slice(&tag);
    Ok(sealed)
}

/// Decrypt a `Sealed` value, verifying the tag over ciphertext and `aad`.
pub fn decrypt(key: &[u8], sealed: &Sealed, aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| auth_failure())?;

    let nonce = Nonce::from_slice(&sealed.nonce);
    let tag = Tag::from_slice(&sealed.tag);

    let mut buffer = Zeroizing::new(sealed.ciphertext.clone());
    cipher
        .decrypt_in_place_detached(nonce, aad, buffer.as_mut_slice(), tag)
        .map_err(|_| auth_failure())?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ciphertext_length_matches_plaintext() {
        let sealed = encrypt(&[1u8; 32], b"refresh-token", b"").unwrap();
        assert_eq!(sealed.ciphertext.len(), b"refresh-token".len());
    }

    #[test]
    fn short_key_is_an_encryption_error() {
        let err = encrypt(&[1u8; 16], b"x", b"").unwrap_err();
        assert!(matches!(err, TokenVaultError::EncryptionFailed(_)));
    }

    #[test]
    fn short_key_on_decrypt_is_opaque() {
        let sealed = encrypt(&[1u8; 32], b"x", b"").unwrap();
        let err = decrypt(&[1u8; 16], &sealed, b"").unwrap_err();
        assert!(matches!(
            err,
            TokenVaultError::AuthenticationFailed(AuthFailure::InvalidTag)
        ));
    }

    #[test]
    fn from_parts_checks_lengths() {
        assert!(Sealed::from_parts(vec![1, 2], &[0u8; NONCE_LEN], &[0u8; TAG_LEN]).is_some());
        assert!(Sealed::from_parts(vec![1, 2], &[0u8; 8], &[0u8; TAG_LEN]).is_none());
        assert!(Sealed::from_parts(vec![1, 2], &[0u8; NONCE_LEN], &[0u8; 15]).is_none());
    }
}
