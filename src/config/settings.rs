use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::{Argon2Params, KdfAlgorithm, KdfParams, ScryptParams, KEY_LEN};
use crate::errors::{Result, TokenVaultError};
use crate::vault::metadata::DEFAULT_MAX_HINT_LEN;
use crate::vault::VaultOptions;

/// Project-level configuration, loaded from `.tokenvault.toml`.
///
/// Every field has a sensible default so TokenVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path of the SQLite database (relative paths resolve against the project dir).
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// KDF used for new locks and rotations.
    #[serde(default = "default_kdf")]
    pub kdf: KdfAlgorithm,

    /// Scrypt CPU/memory cost N (default: 32 768).
    #[serde(default = "default_scrypt_n")]
    pub scrypt_n: u64,

    /// Scrypt block size r (default: 8).
    #[serde(default = "default_scrypt_r")]
    pub scrypt_r: u32,

    /// Scrypt parallelism p (default: 1).
    #[serde(default = "default_scrypt_p")]
    pub scrypt_p: u32,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Maximum password hint length in characters (default: 128).
    #[serde(default = "default_max_hint_len")]
    pub max_hint_len: usize,

    /// Log filter used when `TOKENVAULT_LOG` is not set (default: "warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_database_path() -> String {
    ".tokenvault/credentials.db".to_string()
}

fn default_kdf() -> KdfAlgorithm {
    KdfAlgorithm::Scrypt
}

fn default_scrypt_n() -> u64 {
    32_768
}

fn default_scrypt_r() -> u32 {
    8
}

fn default_scrypt_p() -> u32 {
    1
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

fn default_max_hint_len() -> usize {
    DEFAULT_MAX_HINT_LEN
}

fn default_log_level() -> String {
    "warn".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            kdf: default_kdf(),
            scrypt_n: default_scrypt_n(),
            scrypt_r: default_scrypt_r(),
            scrypt_p: default_scrypt_p(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            max_hint_len: default_max_hint_len(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".tokenvault.toml";

    /// Load settings from `<project_dir>/.tokenvault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            TokenVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Resolve the database path against `project_dir`.
    pub fn database_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.database_path)
    }

    /// KDF parameters for new locks and rotations.
    ///
    /// Rejects values below the cost floor so a typo in the config
    /// cannot silently weaken a new wrap.
    pub fn kdf_params(&self) -> Result<KdfParams> {
        let params = match self.kdf {
            KdfAlgorithm::Scrypt => KdfParams::Scrypt(ScryptParams {
                n: self.scrypt_n,
                r: self.scrypt_r,
                p: self.scrypt_p,
                dk_len: KEY_LEN,
            }),
            KdfAlgorithm::Argon2id => KdfParams::Argon2id(Argon2Params {
                memory_kib: self.argon2_memory_kib,
                iterations: self.argon2_iterations,
                parallelism: self.argon2_parallelism,
                dk_len: KEY_LEN,
            }),
        };
        params
            .validate_for_new_wrap()
            .map_err(|e| TokenVaultError::ConfigError(e.to_string()))?;
        Ok(params)
    }

    /// Options handed to `Vault::with_options`.
    pub fn vault_options(&self) -> Result<VaultOptions> {
        Ok(VaultOptions {
            kdf: self.kdf_params()?,
            max_hint_len: self.max_hint_len,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.database_path, ".tokenvault/credentials.db");
        assert_eq!(s.kdf, KdfAlgorithm::Scrypt);
        assert_eq!((s.scrypt_n, s.scrypt_r, s.scrypt_p), (32_768, 8, 1));
        assert_eq!(s.max_hint_len, 128);
        assert_eq!(s.kdf_params().unwrap(), KdfParams::default());
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.kdf, KdfAlgorithm::Scrypt);
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
database_path = "data/vault.db"
kdf = "argon2id"
argon2_memory_kib = 131072
argon2_iterations = 5
argon2_parallelism = 2
max_hint_len = 40
log_level = "debug"
"#;
        fs::write(tmp.path().join(".tokenvault.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.database_path, "data/vault.db");
        assert_eq!(settings.max_hint_len, 40);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(
            settings.kdf_params().unwrap(),
            KdfParams::Argon2id(Argon2Params {
                memory_kib: 131_072,
                iterations: 5,
                parallelism: 2,
                dk_len: 32,
            })
        );
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".tokenvault.toml"), "scrypt_n = 65536\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.scrypt_n, 65_536);
        assert_eq!(settings.scrypt_r, 8);
        assert_eq!(settings.database_path, ".tokenvault/credentials.db");
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".tokenvault.toml"), "not valid {{toml").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn weak_kdf_settings_are_rejected() {
        let s = Settings {
            scrypt_n: 256,
            ..Settings::default()
        };
        assert!(s.kdf_params().is_err());
    }

    #[test]
    fn database_path_resolves_against_project() {
        let s = Settings::default();
        assert_eq!(
            s.database_path(Path::new("/srv/app")),
            PathBuf::from("/srv/app/.tokenvault/credentials.db")
        );
    }
}
