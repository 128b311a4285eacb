//! Password-based key derivation.
//!
//! Scrypt is the default KDF; Argon2id is available as an alternative.
//! Both are memory-hard.  The parameters are persisted next to the salt
//! in the vault metadata, so a store locked today still opens after the
//! defaults below are raised.

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::keys::{Kek, KEY_LEN};
use crate::errors::{Result, TokenVaultError};

/// Length of the KDF salt in bytes.
pub const SALT_LEN: usize = 16;

/// Minimum scrypt `log2(N)` accepted for a new lock or rotation.
const MIN_SCRYPT_LOG_N: u32 = 10;

/// Minimum Argon2 memory cost in KiB accepted for a new lock or rotation (8 MB).
const MIN_ARGON2_MEMORY_KIB: u32 = 8_192;

/// Largest scrypt `log2(N)` we will ever run.
const MAX_SCRYPT_LOG_N: u32 = 20;

/// Upper bound on scrypt `r` and `p`.
const MAX_SCRYPT_R: u32 = 32;
const MAX_SCRYPT_P: u32 = 16;

/// Upper bound on scrypt working memory (`128 * r * N` bytes), 1 GiB.
const MAX_SCRYPT_MEMORY_BYTES: u64 = 1 << 30;

/// Upper bounds on Argon2 costs (memory: 1 GiB).
const MAX_ARGON2_MEMORY_KIB: u32 = 1 << 20;
const MAX_ARGON2_ITERATIONS: u32 = 64;
const MAX_ARGON2_PARALLELISM: u32 = 64;

/// Identifier of the password KDF, stored as a string in the metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    Scrypt,
    Argon2id,
}

impl KdfAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scrypt => "scrypt",
            Self::Argon2id => "argon2id",
        }
    }
}

impl fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KdfAlgorithm {
    type Err = TokenVaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scrypt" => Ok(Self::Scrypt),
            "argon2id" => Ok(Self::Argon2id),
            other => Err(TokenVaultError::KeyDerivationFailed(format!(
                "unknown KDF algorithm '{other}'"
            ))),
        }
    }
}

/// Scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    /// CPU/memory cost `N` (power of two).
    pub n: u64,
    /// Block size `r`.
    pub r: u32,
    /// Parallelism `p`.
    pub p: u32,
    /// Output length in bytes.
    pub dk_len: usize,
}

impl Default for ScryptParams {
    fn default() -> Self {
        Self {
            n: 32_768,
            r: 8,
            p: 1,
            dk_len: KEY_LEN,
        }
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
    /// Output length in bytes.
    pub dk_len: usize,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
            dk_len: KEY_LEN,
        }
    }
}

/// KDF algorithm together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfParams {
    Scrypt(ScryptParams),
    Argon2id(Argon2Params),
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::Scrypt(ScryptParams::default())
    }
}

impl KdfParams {
    pub fn algorithm(&self) -> KdfAlgorithm {
        match self {
            Self::Scrypt(_) => KdfAlgorithm::Scrypt,
            Self::Argon2id(_) => KdfAlgorithm::Argon2id,
        }
    }

    /// Serialize the parameters (without the algorithm id) as JSON.
    pub fn params_json(&self) -> Result<String> {
        let json = match self {
            Self::Scrypt(p) => serde_json::to_string(p),
            Self::Argon2id(p) => serde_json::to_string(p),
        };
        json.map_err(|e| TokenVaultError::SerializationError(format!("kdf params: {e}")))
    }

    /// Rebuild parameters from a stored algorithm id and JSON blob.
    pub fn from_stored(algorithm: KdfAlgorithm, json: &str) -> Result<Self> {
        let parsed = match algorithm {
            KdfAlgorithm::Scrypt => serde_json::from_str(json).map(Self::Scrypt),
            KdfAlgorithm::Argon2id => serde_json::from_str(json).map(Self::Argon2id),
        };
        parsed.map_err(|e| TokenVaultError::SerializationError(format!("kdf params: {e}")))
    }

    /// Check that the parameters describe a derivation we can run.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Scrypt(p) => {
                if p.n < 2 || !p.n.is_power_of_two() {
                    return Err(TokenVaultError::KeyDerivationFailed(format!(
                        "scrypt N must be a power of two greater than 1 (got {})",
                        p.n
                    )));
                }
                if p.r < 1 || p.p < 1 {
                    return Err(TokenVaultError::KeyDerivationFailed(
                        "scrypt r and p must be at least 1".into(),
                    ));
                }
                // Stored parameters are untrusted input; an unbounded N
                // would make scrypt allocate without limit.
                if p.n.trailing_zeros() > MAX_SCRYPT_LOG_N
                    || p.r > MAX_SCRYPT_R
                    || p.p > MAX_SCRYPT_P
                    || 128 * u64::from(p.r) * p.n > MAX_SCRYPT_MEMORY_BYTES
                {
                    return Err(TokenVaultError::KeyDerivationFailed(format!(
                        "scrypt parameters exceed the supported maximum \
                         (N <= 2^{MAX_SCRYPT_LOG_N}, r <= {MAX_SCRYPT_R}, p <= {MAX_SCRYPT_P}, \
                         128*r*N <= {MAX_SCRYPT_MEMORY_BYTES} bytes)"
                    )));
                }
                check_dk_len(p.dk_len)
            }
            Self::Argon2id(p) => {
                if p.iterations < 1 {
                    return Err(TokenVaultError::KeyDerivationFailed(
                        "Argon2 iterations must be at least 1".into(),
                    ));
                }
                if p.parallelism < 1 {
                    return Err(TokenVaultError::KeyDerivationFailed(
                        "Argon2 parallelism must be at least 1".into(),
                    ));
                }
                if p.memory_kib > MAX_ARGON2_MEMORY_KIB
                    || p.iterations > MAX_ARGON2_ITERATIONS
                    || p.parallelism > MAX_ARGON2_PARALLELISM
                {
                    return Err(TokenVaultError::KeyDerivationFailed(format!(
                        "Argon2 parameters exceed the supported maximum \
                         (memory_kib <= {MAX_ARGON2_MEMORY_KIB}, iterations <= {MAX_ARGON2_ITERATIONS}, \
                         parallelism <= {MAX_ARGON2_PARALLELISM})"
                    )));
                }
                check_dk_len(p.dk_len)
            }
        }
    }

    /// Enforce the cost floor for parameters about to protect a new wrap.
    ///
    /// Not applied when re-deriving from stored parameters.
    pub fn validate_for_new_wrap(&self) -> Result<()> {
        self.validate()?;
        match self {
            Self::Scrypt(p) if p.n.trailing_zeros() < MIN_SCRYPT_LOG_N => {
                Err(TokenVaultError::KeyDerivationFailed(format!(
                    "scrypt N must be at least {} (got {})",
                    1u64 << MIN_SCRYPT_LOG_N,
                    p.n
                )))
            }
            Self::Argon2id(p) if p.memory_kib < MIN_ARGON2_MEMORY_KIB => {
                Err(TokenVaultError::KeyDerivationFailed(format!(
                    "Argon2 memory_kib must be at least {MIN_ARGON2_MEMORY_KIB} (got {})",
                    p.memory_kib
                )))
            }
            _ => Ok(()),
        }
    }
}

fn check_dk_len(dk_len: usize) -> Result<()> {
    if dk_len != KEY_LEN {
        return Err(TokenVaultError::KeyDerivationFailed(format!(
            "derived key length must be {KEY_LEN} bytes (got {dk_len})"
        )));
    }
    Ok(())
}

/// Derive the 32-byte key-encrypting key from a password.
///
/// The same password + salt + params always produce the same key.
pub fn derive_kek(password: &[u8], salt: &[u8; SALT_LEN], params: &KdfParams) -> Result<Kek> {
    params.validate()?;

    let mut key = [0u8; KEY_LEN];
    match params {
        KdfParams::Scrypt(p) => {
            // validate() guarantees n is a power of two, so log2 fits in u8.
            let log_n = p.n.trailing_zeros() as u8;
            let scrypt_params = scrypt::Params::new(log_n, p.r, p.p, p.dk_len).map_err(|e| {
                TokenVaultError::KeyDerivationFailed(format!("invalid scrypt params: {e}"))
            })?;
            scrypt::scrypt(password, salt, &scrypt_params, &mut key).map_err(|e| {
                TokenVaultError::KeyDerivationFailed(format!("scrypt failed: {e}"))
            })?;
        }
        KdfParams::Argon2id(p) => {
            let argon2_params =
                argon2::Params::new(p.memory_kib, p.iterations, p.parallelism, Some(p.dk_len))
                    .map_err(|e| {
                        TokenVaultError::KeyDerivationFailed(format!("invalid Argon2 params: {e}"))
                    })?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params)
                .hash_password_into(password, salt, &mut key)
                .map_err(|e| {
                    TokenVaultError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}"))
                })?;
        }
    }

    Ok(Kek::new(key))
}

/// Generate a cryptographically random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_scrypt() -> KdfParams {
        KdfParams::Scrypt(ScryptParams {
            n: 1 << 10,
            ..ScryptParams::default()
        })
    }

    #[test]
    fn defaults_match_recommended_costs() {
        let p = ScryptParams::default();
        assert_eq!((p.n, p.r, p.p, p.dk_len), (32_768, 8, 1, 32));
        assert_eq!(KdfParams::default().algorithm(), KdfAlgorithm::Scrypt);
    }

    #[test]
    fn algorithm_ids_roundtrip() {
        for alg in [KdfAlgorithm::Scrypt, KdfAlgorithm::Argon2id] {
            assert_eq!(alg.as_str().parse::<KdfAlgorithm>().unwrap(), alg);
        }
        assert!("pbkdf2".parse::<KdfAlgorithm>().is_err());
    }

    #[test]
    fn params_json_restores_same_params() {
        let params = fast_scrypt();
        let json = params.params_json().unwrap();
        let restored = KdfParams::from_stored(KdfAlgorithm::Scrypt, &json).unwrap();
        assert_eq!(restored, params);
    }

    #[test]
    fn rejects_non_power_of_two_n() {
        let params = KdfParams::Scrypt(ScryptParams {
            n: 1000,
            ..ScryptParams::default()
        });
        assert!(params.validate().is_err());
    }

    #[test]
    fn rejects_wrong_output_length() {
        let params = KdfParams::Scrypt(ScryptParams {
            n: 1 << 10,
            dk_len: 16,
            ..ScryptParams::default()
        });
        assert!(derive_kek(b"pw", &[0u8; SALT_LEN], &params).is_err());
    }

    #[test]
    fn cost_floor_only_applies_to_new_wraps() {
        let weak = KdfParams::Scrypt(ScryptParams {
            n: 1 << 4,
            ..ScryptParams::default()
        });
        assert!(weak.validate().is_ok());
        assert!(weak.validate_for_new_wrap().is_err());
        assert!(fast_scrypt().validate_for_new_wrap().is_ok());
    }

    #[test]
    fn oversized_costs_are_rejected() {
        let huge_n = KdfParams::Scrypt(ScryptParams {
            n: 1 << 40,
            ..ScryptParams::default()
        });
        assert!(huge_n.validate().is_err());
        assert!(derive_kek(b"pw", &[0u8; SALT_LEN], &huge_n).is_err());

        let huge_r = KdfParams::Scrypt(ScryptParams {
            r: 1 << 20,
            ..ScryptParams::default()
        });
        assert!(huge_r.validate().is_err());

        let huge_memory = KdfParams::Argon2id(Argon2Params {
            memory_kib: u32::MAX,
            ..Argon2Params::default()
        });
        assert!(huge_memory.validate().is_err());

        // Defaults and the largest accepted scrypt N stay valid.
        assert!(KdfParams::default().validate().is_ok());
        assert!(KdfParams::Argon2id(Argon2Params::default()).validate().is_ok());
        let max_n = KdfParams::Scrypt(ScryptParams {
            n: 1 << 20,
            ..ScryptParams::default()
        });
        assert!(max_n.validate().is_ok());
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = [7u8; SALT_LEN];
        let a = derive_kek(b"hunter2", &salt, &fast_scrypt()).unwrap();
        let b = derive_kek(b"hunter2", &salt, &fast_scrypt()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn salt_changes_the_key() {
        let a = derive_kek(b"hunter2", &[1u8; SALT_LEN], &fast_scrypt()).unwrap();
        let b = derive_kek(b"hunter2", &[2u8; SALT_LEN], &fast_scrypt()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn generated_salts_differ() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
