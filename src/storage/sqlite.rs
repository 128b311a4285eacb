//! SQLite storage backend.
//!
//! Two tables: `vault_metadata` (a single row with `id = 1`) and
//! `credentials` (one row per linked account).  Rows are validated on
//! the way out; a row that breaks the locked/unlocked invariants is a
//! consistency failure, never guessed into shape.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::{Storage, StorageTx};
use crate::crypto::{KdfAlgorithm, KdfParams, Sealed, SALT_LEN};
use crate::errors::{Result, TokenVaultError};
use crate::vault::{CredentialRecord, LockedState, SecretForm, VaultMetadata, VaultState};

/// Schema version recorded in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vault_metadata (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    is_locked       INTEGER NOT NULL DEFAULT 0,
    version         INTEGER NOT NULL,
    kdf             TEXT,
    kdf_salt        BLOB,
    kdf_params      TEXT,
    dek_ciphertext  BLOB,
    dek_nonce       BLOB,
    dek_tag         BLOB,
    password_hint   TEXT,
    locked_at       TEXT,
    rotated_at      TEXT
);
CREATE TABLE IF NOT EXISTS credentials (
    owner_id          TEXT PRIMARY KEY,
    plaintext_secret  TEXT,
    secret_ciphertext BLOB,
    secret_nonce      BLOB,
    secret_tag        BLOB,
    aad_version       INTEGER,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);";

/// SQLite-backed vault storage.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // The database holds wrapped keys and possibly cleartext tokens:
        // create it owner-only before SQLite touches it, and tighten the
        // mode of an existing file on every open.
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .mode(0o600)
                .open(path)?;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Self::from_connection(Connection::open(path)?)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(TokenVaultError::ConsistencyFailure(format!(
                "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(Self { conn })
    }

    /// Direct access to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Borrowed view used inside a transaction.
struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl StorageTx for SqliteTx<'_> {
    fn load_metadata(&self) -> Result<Option<VaultMetadata>> {
        load_metadata(self.conn)
    }

    fn store_metadata(&mut self, metadata: &VaultMetadata) -> Result<()> {
        store_metadata(self.conn, metadata)
    }

    fn load_credential(&self, owner_id: &str) -> Result<Option<CredentialRecord>> {
        load_credential(self.conn, owner_id)
    }

    fn load_credentials(&self) -> Result<Vec<CredentialRecord>> {
        load_credentials(self.conn)
    }

    fn store_credential(&mut self, record: &CredentialRecord) -> Result<()> {
        store_credential(self.conn, record)
    }

    fn delete_credential(&mut self, owner_id: &str) -> Result<bool> {
        delete_credential(self.conn, owner_id)
    }
}

impl StorageTx for SqliteStorage {
    fn load_metadata(&self) -> Result<Option<VaultMetadata>> {
        load_metadata(&self.conn)
    }

    fn store_metadata(&mut self, metadata: &VaultMetadata) -> Result<()> {
        store_metadata(&self.conn, metadata)
    }

    fn load_credential(&self, owner_id: &str) -> Result<Option<CredentialRecord>> {
        load_credential(&self.conn, owner_id)
    }

    fn load_credentials(&self) -> Result<Vec<CredentialRecord>> {
        load_credentials(&self.conn)
    }

    fn store_credential(&mut self, record: &CredentialRecord) -> Result<()> {
        store_credential(&self.conn, record)
    }

    fn delete_credential(&mut self, owner_id: &str) -> Result<bool> {
        delete_credential(&self.conn, owner_id)
    }
}

impl Storage for SqliteStorage {
    fn transaction<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn StorageTx) -> Result<R>,
    {
        // IMMEDIATE takes the write lock up front: one writer at a time.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // An early return drops `tx`, which rolls back.
        let out = {
            let mut view = SqliteTx { conn: &tx };
            f(&mut view)?
        };

        tx.commit()?;
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Metadata rows
// ---------------------------------------------------------------------------

/// The metadata row exactly as stored, before validation.
struct MetadataRow {
    is_locked: bool,
    version: u32,
    kdf: Option<String>,
    kdf_salt: Option<Vec<u8>>,
    kdf_params: Option<String>,
    dek_ciphertext: Option<Vec<u8>>,
    dek_nonce: Option<Vec<u8>>,
    dek_tag: Option<Vec<u8>>,
    password_hint: Option<String>,
    locked_at: Option<String>,
    rotated_at: Option<String>,
}

impl MetadataRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            is_locked: row.get(0)?,
            version: row.get(1)?,
            kdf: row.get(2)?,
            kdf_salt: row.get(3)?,
            kdf_params: row.get(4)?,
            dek_ciphertext: row.get(5)?,
            dek_nonce: row.get(6)?,
            dek_tag: row.get(7)?,
            password_hint: row.get(8)?,
            locked_at: row.get(9)?,
            rotated_at: row.get(10)?,
        })
    }

    fn into_metadata(self) -> Result<VaultMetadata> {
        if !self.is_locked {
            let leftover = self.kdf.is_some()
                || self.kdf_salt.is_some()
                || self.kdf_params.is_some()
                || self.dek_ciphertext.is_some()
                || self.dek_nonce.is_some()
                || self.dek_tag.is_some();
            if leftover {
                return Err(inconsistent("is_locked=false but key material is present"));
            }
            return Ok(VaultMetadata {
                version: self.version,
                state: VaultState::Unlocked,
            });
        }

        let kdf_id = self.kdf.ok_or_else(|| missing("kdf"))?;
        let salt = self.kdf_salt.ok_or_else(|| missing("kdf_salt"))?;
        let params_json = self.kdf_params.ok_or_else(|| missing("kdf_params"))?;
        let ciphertext = self.dek_ciphertext.ok_or_else(|| missing("dek_ciphertext"))?;
        let nonce = self.dek_nonce.ok_or_else(|| missing("dek_nonce"))?;
        let tag = self.dek_tag.ok_or_else(|| missing("dek_tag"))?;
        let locked_at = self.locked_at.ok_or_else(|| missing("locked_at"))?;

        let algorithm: KdfAlgorithm = kdf_id
            .parse()
            .map_err(|_| inconsistent(&format!("unknown kdf '{kdf_id}'")))?;
        let kdf = KdfParams::from_stored(algorithm, &params_json)
            .map_err(|e| inconsistent(&format!("unreadable kdf_params: {e}")))?;
        kdf.validate()
            .map_err(|e| inconsistent(&format!("invalid kdf_params: {e}")))?;
        let salt: [u8; SALT_LEN] = salt
            .as_slice()
            .try_into()
            .map_err(|_| inconsistent(&format!("kdf_salt must be {SALT_LEN} bytes")))?;
        let wrapped_dek = Sealed::from_parts(ciphertext, &nonce, &tag)
            .ok_or_else(|| inconsistent("wrapped DEK has a malformed nonce or tag"))?;

        Ok(VaultMetadata {
            version: self.version,
            state: VaultState::Locked(LockedState {
                kdf,
                salt,
                wrapped_dek,
                password_hint: self.password_hint,
                locked_at: parse_time(&locked_at)?,
                rotated_at: self.rotated_at.as_deref().map(parse_time).transpose()?,
            }),
        })
    }
}

fn load_metadata(conn: &Connection) -> Result<Option<VaultMetadata>> {
    let row = conn
        .query_row(
            "SELECT is_locked, version, kdf, kdf_salt, kdf_params,
                    dek_ciphertext, dek_nonce, dek_tag, password_hint,
                    locked_at, rotated_at
             FROM vault_metadata WHERE id = 1",
            [],
            MetadataRow::from_row,
        )
        .optional()?;

    row.map(MetadataRow::into_metadata).transpose()
}

fn store_metadata(conn: &Connection, metadata: &VaultMetadata) -> Result<()> {
    match &metadata.state {
        VaultState::Unlocked => {
            conn.execute(
                "INSERT OR REPLACE INTO vault_metadata (id, is_locked, version)
                 VALUES (1, 0, ?1)",
                params![metadata.version],
            )?;
        }
        VaultState::Locked(locked) => {
            conn.execute(
                "INSERT OR REPLACE INTO vault_metadata
                    (id, is_locked, version, kdf, kdf_salt, kdf_params,
                     dek_ciphertext, dek_nonce, dek_tag, password_hint,
                     locked_at, rotated_at)
                 VALUES (1, 1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    metadata.version,
                    locked.kdf.algorithm().as_str(),
                    &locked.salt[..],
                    locked.kdf.params_json()?,
                    locked.wrapped_dek.ciphertext,
                    &locked.wrapped_dek.nonce[..],
                    &locked.wrapped_dek.tag[..],
                    locked.password_hint,
                    locked.locked_at.to_rfc3339(),
                    locked.rotated_at.map(|t| t.to_rfc3339()),
                ],
            )?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Credential rows
// ---------------------------------------------------------------------------

const CREDENTIAL_COLUMNS: &str = "owner_id, plaintext_secret, secret_ciphertext, secret_nonce,
     secret_tag, aad_version, created_at, updated_at";

struct CredentialRow {
    owner_id: String,
    plaintext_secret: Option<String>,
    secret_ciphertext: Option<Vec<u8>>,
    secret_nonce: Option<Vec<u8>>,
    secret_tag: Option<Vec<u8>>,
    aad_version: Option<u32>,
    created_at: String,
    updated_at: String,
}

impl CredentialRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            owner_id: row.get(0)?,
            plaintext_secret: row.get(1)?,
            secret_ciphertext: row.get(2)?,
            secret_nonce: row.get(3)?,
            secret_tag: row.get(4)?,
            aad_version: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<CredentialRecord> {
        let owner = self.owner_id;
        let secret = match (
            self.plaintext_secret,
            self.secret_ciphertext,
            self.secret_nonce,
            self.secret_tag,
            self.aad_version,
        ) {
            (Some(plaintext), None, None, None, None) => SecretForm::Plaintext(plaintext),
            (None, Some(ciphertext), Some(nonce), Some(tag), Some(aad_version)) => {
                let sealed = Sealed::from_parts(ciphertext, &nonce, &tag).ok_or_else(|| {
                    inconsistent(&format!(
                        "credential '{owner}' has a malformed nonce or tag"
                    ))
                })?;
                SecretForm::Encrypted {
                    sealed,
                    aad_version,
                }
            }
            _ => {
                return Err(inconsistent(&format!(
                    "credential '{owner}' must hold exactly one of plaintext or ciphertext"
                )))
            }
        };

        Ok(CredentialRecord {
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
            owner_id: owner,
            secret,
        })
    }
}

fn load_credential(conn: &Connection, owner_id: &str) -> Result<Option<CredentialRecord>> {
    let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE owner_id = ?1");
    let row = conn
        .query_row(&sql, params![owner_id], CredentialRow::from_row)
        .optional()?;
    row.map(CredentialRow::into_record).transpose()
}

fn load_credentials(conn: &Connection) -> Result<Vec<CredentialRecord>> {
    let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM credentials ORDER BY owner_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], CredentialRow::from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

fn store_credential(conn: &Connection, record: &CredentialRecord) -> Result<()> {
    let (plaintext, ciphertext, nonce, tag, aad_version) = match &record.secret {
        SecretForm::Plaintext(plaintext) => (Some(plaintext.as_str()), None, None, None, None),
        SecretForm::Encrypted {
            sealed,
            aad_version,
        } => (
            None,
            Some(sealed.ciphertext.as_slice()),
            Some(&sealed.nonce[..]),
            Some(&sealed.tag[..]),
            Some(*aad_version),
        ),
    };

    conn.execute(
        "INSERT OR REPLACE INTO credentials
            (owner_id, plaintext_secret, secret_ciphertext, secret_nonce,
             secret_tag, aad_version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.owner_id,
            plaintext,
            ciphertext,
            nonce,
            tag,
            aad_version,
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn delete_credential(conn: &Connection, owner_id: &str) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM credentials WHERE owner_id = ?1",
        params![owner_id],
    )?;
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn inconsistent(msg: &str) -> TokenVaultError {
    TokenVaultError::ConsistencyFailure(msg.to_string())
}

fn missing(column: &str) -> TokenVaultError {
    inconsistent(&format!("is_locked=true but {column} is missing"))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| inconsistent(&format!("invalid timestamp '{value}': {e}")))
}
