//! The vault state machine: lock, unlock and rotate.
//!
//! `Vault` owns an injected `Storage` and reads the metadata from it on
//! every call; nothing about the metadata, the password or any key is
//! cached between calls.
//!
//! ```text
//!   Unlocked --lock(pw)--> Locked --rotate(old, new)--> Locked
//!                            |
//!                            +--unlock(pw)--> Dek (no state change)
//! ```

use chrono::Utc;
use zeroize::Zeroizing;

use super::metadata::{normalize_hint, LockedState, VaultMetadata, DEFAULT_MAX_HINT_LEN};
use super::reencrypt::{self, read_secret, seal_secret};
use super::secret::{validate_owner_id, CredentialRecord, CredentialSummary};
use crate::crypto::{self, derive_kek, generate_salt, Dek, KdfParams};
use crate::errors::{AuthFailure, Result, TokenVaultError};
use crate::storage::{Storage, StorageTx};

/// Tunables applied when a new wrap is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultOptions {
    /// KDF parameters for new locks and rotations.
    pub kdf: KdfParams,
    /// Maximum password hint length in characters.
    pub max_hint_len: usize,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            max_hint_len: DEFAULT_MAX_HINT_LEN,
        }
    }
}

/// Outcome of a successful lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockReport {
    pub secrets_encrypted: usize,
}

/// Result of a consistency check between metadata and credential rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub locked: bool,
    pub plaintext: usize,
    pub encrypted: usize,
}

/// Display-safe summary of the vault.
#[derive(Debug, Clone)]
pub struct VaultStatus {
    pub locked: bool,
    pub version: u32,
    pub kdf: Option<KdfParams>,
    pub password_hint: Option<String>,
    pub locked_at: Option<chrono::DateTime<Utc>>,
    pub rotated_at: Option<chrono::DateTime<Utc>>,
    pub credentials: usize,
}

/// Credential vault over a storage backend.
pub struct Vault<S: Storage> {
    storage: S,
    options: VaultOptions,
}

impl<S: Storage> Vault<S> {
    pub fn new(storage: S) -> Self {
        Self::with_options(storage, VaultOptions::default())
    }

    pub fn with_options(storage: S, options: VaultOptions) -> Self {
        Self { storage, options }
    }

    pub fn options(&self) -> &VaultOptions {
        &self.options
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Current metadata; a store that was never written is unlocked.
    pub fn metadata(&self) -> Result<VaultMetadata> {
        load_metadata(&self.storage)
    }

    pub fn is_locked(&self) -> Result<bool> {
        Ok(self.metadata()?.is_locked())
    }

    /// The advisory hint; readable without the password.
    pub fn password_hint(&self) -> Result<Option<String>> {
        Ok(self.metadata()?.password_hint().map(str::to_string))
    }

    pub fn status(&self) -> Result<VaultStatus> {
        let meta = self.metadata()?;
        let credentials = self.storage.load_credentials()?.len();
        let locked = meta.locked_state();
        Ok(VaultStatus {
            locked: meta.is_locked(),
            version: meta.version,
            kdf: locked.map(|l| l.kdf),
            password_hint: locked.and_then(|l| l.password_hint.clone()),
            locked_at: locked.map(|l| l.locked_at),
            rotated_at: locked.and_then(|l| l.rotated_at),
            credentials,
        })
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    /// Lock the vault under `password`.
    ///
    /// Generates a fresh salt and DEK, wraps the DEK under the
    /// password-derived KEK and encrypts every stored plaintext token.
    /// The metadata write and the bulk re-encryption share one
    /// transaction, so a failure leaves the vault unlocked and every
    /// record untouched.
    pub fn lock(&mut self, password: &[u8], hint: Option<&str>) -> Result<LockReport> {
        let meta = self.metadata()?;
        meta.check_version()?;
        if meta.is_locked() {
            return Err(already_locked());
        }
        require_password(password)?;

        let password_hint = normalize_hint(hint, password, self.options.max_hint_len)?;
        let kdf = self.options.kdf;
        kdf.validate_for_new_wrap()?;

        // The KDF is the slow part; run it before taking the write lock.
        let salt = generate_salt();
        let kek = derive_kek(password, &salt, &kdf)?;
        let dek = Dek::generate();
        let wrapped_dek = crypto::encrypt(kek.as_bytes(), dek.as_bytes(), &[])?;
        drop(kek);

        tracing::debug!(kdf = %kdf.algorithm(), "derived key-encrypting key for lock");

        let metadata = VaultMetadata::locked(LockedState {
            kdf,
            salt,
            wrapped_dek,
            password_hint,
            locked_at: Utc::now(),
            rotated_at: None,
        });

        let secrets_encrypted = self.storage.transaction(|tx| {
            // Re-check under the write lock.
            if load_metadata(&*tx)?.is_locked() {
                return Err(already_locked());
            }
            tx.store_metadata(&metadata)?;
            reencrypt::encrypt_all_plaintext(tx, &dek)
        })?;

        tracing::info!(secrets = secrets_encrypted, "vault locked");
        Ok(LockReport { secrets_encrypted })
    }

    /// Unwrap the DEK with `password`.
    ///
    /// Has no durable effect and may be called any number of times.  The
    /// returned key wipes itself when dropped.
    pub fn unlock(&self, password: &[u8]) -> Result<Dek> {
        let meta = self.metadata()?;
        meta.check_version()?;
        let locked = meta
            .locked_state()
            .ok_or_else(|| TokenVaultError::PreconditionFailed("vault is not locked".into()))?;

        let dek = unwrap_dek(locked, password)?;
        tracing::debug!("vault session key unwrapped");
        Ok(dek)
    }

    /// Change the password without touching any stored credential.
    ///
    /// The DEK is unwrapped with `old_password` and re-wrapped under a
    /// KEK derived from `new_password` with a fresh salt and the current
    /// default KDF parameters.  `hint` replaces the stored hint; `None`
    /// clears it.
    pub fn rotate(
        &mut self,
        old_password: &[u8],
        new_password: &[u8],
        hint: Option<&str>,
    ) -> Result<()> {
        let meta = self.metadata()?;
        meta.check_version()?;
        let current = meta.locked_state().ok_or_else(|| {
            TokenVaultError::PreconditionFailed(
                "vault is not locked; lock it before rotating the password".into(),
            )
        })?;

        require_password(new_password)?;
        let dek = unwrap_dek(current, old_password)?;
        let password_hint = normalize_hint(hint, new_password, self.options.max_hint_len)?;
        let kdf = self.options.kdf;
        kdf.validate_for_new_wrap()?;

        let salt = generate_salt();
        let kek = derive_kek(new_password, &salt, &kdf)?;
        let wrapped_dek = crypto::encrypt(kek.as_bytes(), dek.as_bytes(), &[])?;
        drop(kek);
        drop(dek);

        let rotated = VaultMetadata::locked(LockedState {
            kdf,
            salt,
            wrapped_dek,
            password_hint,
            locked_at: current.locked_at,
            rotated_at: Some(Utc::now()),
        });
        let expected = current.wrapped_dek.clone();

        self.storage.transaction(|tx| {
            let stored = load_metadata(&*tx)?;
            let unchanged = stored
                .locked_state()
                .is_some_and(|l| l.wrapped_dek == expected);
            if !unchanged {
                return Err(TokenVaultError::PreconditionFailed(
                    "vault metadata changed during rotation; retry".into(),
                ));
            }
            tx.store_metadata(&rotated)
        })?;

        tracing::info!(kdf = %kdf.algorithm(), "vault password rotated");
        Ok(())
    }

    /// Check that every credential row matches the lock state.
    ///
    /// Reports a consistency failure when a locked vault still holds
    /// plaintext (or an unlocked one holds ciphertext).  Nothing is
    /// repaired.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let meta = self.metadata()?;
        meta.check_version()?;
        if let Some(locked) = meta.locked_state() {
            check_stored_kdf(locked)?;
        }

        let records = self.storage.load_credentials()?;
        let encrypted = records.iter().filter(|r| r.secret.is_encrypted()).count();
        let plaintext = records.len() - encrypted;
        let locked = meta.is_locked();

        if locked && plaintext > 0 {
            tracing::warn!(plaintext, "locked vault still holds plaintext credentials");
            return Err(TokenVaultError::ConsistencyFailure(format!(
                "vault is locked but {plaintext} credential(s) are still stored in plaintext"
            )));
        }
        if !locked && encrypted > 0 {
            tracing::warn!(encrypted, "unlocked vault holds encrypted credentials");
            return Err(TokenVaultError::ConsistencyFailure(format!(
                "vault is unlocked but {encrypted} credential(s) are encrypted"
            )));
        }

        tracing::info!(locked, records = records.len(), "vault consistency verified");
        Ok(ReconcileReport {
            locked,
            plaintext,
            encrypted,
        })
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    /// Store the refresh token of a newly linked account.
    ///
    /// While unlocked the token is stored as-is; while locked it is
    /// encrypted under `dek`, which must come from `unlock`.
    pub fn link_account(&mut self, owner_id: &str, secret: &str, dek: Option<&Dek>) -> Result<()> {
        validate_owner_id(owner_id)?;

        self.storage.transaction(|tx| {
            if tx.load_credential(owner_id)?.is_some() {
                return Err(TokenVaultError::AccountAlreadyLinked(owner_id.to_string()));
            }
            let locked = load_metadata(&*tx)?.is_locked();
            let now = Utc::now();
            tx.store_credential(&CredentialRecord {
                owner_id: owner_id.to_string(),
                secret: seal_secret(owner_id, secret, locked, dek)?,
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Remove a linked account's credential.
    pub fn unlink_account(&mut self, owner_id: &str) -> Result<()> {
        if !self.storage.delete_credential(owner_id)? {
            return Err(TokenVaultError::AccountNotFound(owner_id.to_string()));
        }
        Ok(())
    }

    pub fn accounts(&self) -> Result<Vec<CredentialSummary>> {
        Ok(self
            .storage
            .load_credentials()?
            .iter()
            .map(CredentialSummary::from)
            .collect())
    }

    /// Read one owner's refresh token, using `dek` for ciphertext records.
    pub fn read_secret(&self, owner_id: &str, dek: Option<&Dek>) -> Result<Zeroizing<String>> {
        let record = self
            .storage
            .load_credential(owner_id)?
            .ok_or_else(|| TokenVaultError::AccountNotFound(owner_id.to_string()))?;
        read_secret(&record, dek)
    }
}

fn load_metadata(tx: &dyn StorageTx) -> Result<VaultMetadata> {
    Ok(tx.load_metadata()?.unwrap_or_default())
}

fn already_locked() -> TokenVaultError {
    TokenVaultError::PreconditionFailed(
        "vault is already locked; use rotate to change the password".into(),
    )
}

fn require_password(password: &[u8]) -> Result<()> {
    if password.is_empty() {
        return Err(TokenVaultError::PreconditionFailed(
            "password cannot be empty".into(),
        ));
    }
    Ok(())
}

/// Stored KDF parameters outside the supported range mean the metadata
/// was corrupted or edited; never run the KDF with them.
fn check_stored_kdf(locked: &LockedState) -> Result<()> {
    locked.kdf.validate().map_err(|e| {
        TokenVaultError::ConsistencyFailure(format!("stored KDF parameters are invalid: {e}"))
    })
}

/// Derive the KEK from stored parameters and open the wrapped DEK.
fn unwrap_dek(locked: &LockedState, password: &[u8]) -> Result<Dek> {
    check_stored_kdf(locked)?;
    let kek = derive_kek(password, &locked.salt, &locked.kdf)?;
    let bytes = crypto::decrypt(kek.as_bytes(), &locked.wrapped_dek, &[]).map_err(|_| {
        tracing::warn!("vault unlock failed");
        TokenVaultError::AuthenticationFailed(AuthFailure::WrongPassword)
    })?;
    Dek::from_unwrapped(&bytes)
}
