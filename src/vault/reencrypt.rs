//! Moving refresh tokens between cleartext and ciphertext.
//!
//! `encrypt_all_plaintext` is the bulk pass run inside the lock
//! transaction.  `read_secret` and `seal_secret` are the per-record
//! accessors used for ordinary reads and for newly linked accounts.

use chrono::Utc;
use zeroize::Zeroizing;

use super::secret::{associated_data, CredentialRecord, SecretForm, CURRENT_AAD_VERSION};
use crate::crypto::{self, Dek};
use crate::errors::{AuthFailure, Result, TokenVaultError};
use crate::storage::StorageTx;

/// Encrypt `plaintext` for `owner_id` under the DEK with the current
/// associated-data scheme.
pub fn encrypt_for_owner(dek: &Dek, owner_id: &str, plaintext: &str) -> Result<SecretForm> {
    let aad = associated_data(owner_id, CURRENT_AAD_VERSION)?;
    let sealed = crypto::encrypt(dek.as_bytes(), plaintext.as_bytes(), &aad)?;
    Ok(SecretForm::Encrypted {
        sealed,
        aad_version: CURRENT_AAD_VERSION,
    })
}

/// Convert every plaintext credential to ciphertext under `dek`.
///
/// Must run inside the same transaction that writes the locked
/// metadata.  A record that is already encrypted while the vault was
/// unlocked aborts the pass.  Returns the number of records converted.
pub fn encrypt_all_plaintext(tx: &mut dyn StorageTx, dek: &Dek) -> Result<usize> {
    let records = tx.load_credentials()?;
    let mut converted = 0;

    for mut record in records {
        let form = match &record.secret {
            SecretForm::Plaintext(plaintext) => {
                encrypt_for_owner(dek, &record.owner_id, plaintext)?
            }
            SecretForm::Encrypted { .. } => {
                return Err(TokenVaultError::ConsistencyFailure(format!(
                    "credential '{}' is already encrypted but the vault was never locked",
                    record.owner_id
                )));
            }
        };

        // Replacing the form drops the old plaintext from the record.
        record.secret = form;
        record.updated_at = Utc::now();
        tx.store_credential(&record)?;
        converted += 1;
    }

    tracing::debug!(records = converted, "re-encrypted plaintext credentials");
    Ok(converted)
}

/// Return the cleartext refresh token of `record`.
///
/// Plaintext records are returned as-is.  Ciphertext records need the
/// session DEK from `Vault::unlock`; without it the failure reads as a
/// locked vault.  Because a `Dek` only comes from a successful unwrap,
/// a tag failure with one means the record itself is bad.
pub fn read_secret(record: &CredentialRecord, dek: Option<&Dek>) -> Result<Zeroizing<String>> {
    let (sealed, aad_version) = match &record.secret {
        SecretForm::Plaintext(plaintext) => return Ok(Zeroizing::new(plaintext.clone())),
        SecretForm::Encrypted {
            sealed,
            aad_version,
        } => (sealed, *aad_version),
    };

    let dek = dek.ok_or(TokenVaultError::AuthenticationFailed(AuthFailure::NoSession))?;
    let aad = associated_data(&record.owner_id, aad_version)?;

    let bytes = crypto::decrypt(dek.as_bytes(), sealed, &aad).map_err(|_| {
        tracing::warn!(owner = %record.owner_id, "credential failed authentication");
        TokenVaultError::AuthenticationFailed(AuthFailure::RecordTampered(
            record.owner_id.clone(),
        ))
    })?;

    let text = std::str::from_utf8(&bytes).map_err(|_| {
        TokenVaultError::ConsistencyFailure(format!(
            "credential '{}' decrypted to invalid UTF-8",
            record.owner_id
        ))
    })?;
    Ok(Zeroizing::new(text.to_string()))
}

/// Build the stored form for a new secret given the vault state.
pub fn seal_secret(
    owner_id: &str,
    secret: &str,
    locked: bool,
    dek: Option<&Dek>,
) -> Result<SecretForm> {
    if !locked {
        return Ok(SecretForm::Plaintext(secret.to_string()));
    }
    let dek = dek.ok_or(TokenVaultError::AuthenticationFailed(AuthFailure::NoSession))?;
    encrypt_for_owner(dek, owner_id, secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageTx};

    fn plaintext_record(owner: &str, token: &str) -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord {
            owner_id: owner.into(),
            secret: SecretForm::Plaintext(token.into()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn plaintext_reads_without_a_key() {
        let record = plaintext_record("a", "tok");
        assert_eq!(read_secret(&record, None).unwrap().as_str(), "tok");
    }

    #[test]
    fn ciphertext_without_key_reports_no_session() {
        let dek = Dek::generate();
        let record = CredentialRecord {
            secret: encrypt_for_owner(&dek, "a", "tok").unwrap(),
            ..plaintext_record("a", "")
        };
        let err = read_secret(&record, None).unwrap_err();
        assert!(matches!(
            err,
            TokenVaultError::AuthenticationFailed(AuthFailure::NoSession)
        ));
    }

    #[test]
    fn bulk_pass_converts_every_plaintext_record() {
        let mut store = MemoryStorage::new();
        store.store_credential(&plaintext_record("a", "tokA")).unwrap();
        store.store_credential(&plaintext_record("b", "tokB")).unwrap();

        let dek = Dek::generate();
        let converted = encrypt_all_plaintext(&mut store, &dek).unwrap();
        assert_eq!(converted, 2);

        for (owner, token) in [("a", "tokA"), ("b", "tokB")] {
            let record = store.load_credential(owner).unwrap().unwrap();
            assert!(record.secret.is_encrypted());
            assert_eq!(read_secret(&record, Some(&dek)).unwrap().as_str(), token);
        }
    }

    #[test]
    fn bulk_pass_rejects_stray_ciphertext() {
        let mut store = MemoryStorage::new();
        let dek = Dek::generate();
        let stray = CredentialRecord {
            secret: encrypt_for_owner(&dek, "a", "tok").unwrap(),
            ..plaintext_record("a", "")
        };
        store.store_credential(&stray).unwrap();

        let err = encrypt_all_plaintext(&mut store, &dek).unwrap_err();
        assert!(matches!(err, TokenVaultError::ConsistencyFailure(_)));
    }

    #[test]
    fn seal_secret_follows_lock_state() {
        assert!(!seal_secret("a", "tok", false, None).unwrap().is_encrypted());
        assert!(seal_secret("a", "tok", true, None).unwrap_err().is_auth_failure());

        let dek = Dek::generate();
        assert!(seal_secret("a", "tok", true, Some(&dek)).unwrap().is_encrypted());
    }
}
