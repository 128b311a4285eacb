//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::Settings;
use crate::crypto::Dek;
use crate::errors::{Result, TokenVaultError};
use crate::storage::SqliteStorage;
use crate::vault::Vault;

/// Minimum password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable holding the current vault password.
pub const PASSWORD_ENV: &str = "TOKENVAULT_PASSWORD";

/// Environment variable holding the new password during `rotate`.
pub const NEW_PASSWORD_ENV: &str = "TOKENVAULT_NEW_PASSWORD";

/// Environment variable holding a refresh token for `account link`.
pub const TOKEN_ENV: &str = "TOKENVAULT_TOKEN";

/// TokenVault CLI: password-protected storage for linked-account tokens.
#[derive(Parser)]
#[command(
    name = "tokenvault",
    about = "Password-protected storage for linked-account refresh tokens",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the credential database (overrides .tokenvault.toml)
    #[arg(long, global = true)]
    pub db: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Show whether the vault is locked and how it is protected
    Status,

    /// Encrypt every stored token under a new vault password
    Lock {
        /// Advisory password hint (stored unencrypted)
        #[arg(long)]
        hint: Option<String>,
    },

    /// Check the vault password without changing anything
    Unlock,

    /// Change the vault password (stored tokens are not re-encrypted)
    Rotate {
        /// New password hint (omit to clear the hint)
        #[arg(long)]
        hint: Option<String>,
    },

    /// Check that stored tokens match the vault's lock state
    Verify {
        /// Also decrypt every token to detect tampering (needs the password)
        #[arg(long)]
        deep: bool,
    },

    /// Manage linked accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },

    /// Print the refresh token of a linked account
    Token {
        /// Owner id of the linked account
        owner_id: String,
    },
}

/// Subcommands of `account`.
#[derive(clap::Subcommand)]
pub enum AccountAction {
    /// Store the refresh token of a newly linked account
    Link {
        /// Owner id of the account (e.g. google:alice@example.com)
        owner_id: String,
    },

    /// List linked accounts
    List,

    /// Remove a linked account and its token
    Unlink {
        /// Owner id of the account
        owner_id: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Resolve the database path from `--db` or the settings.
pub fn database_path(cli: &Cli, settings: &Settings) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match &cli.db {
        Some(db) => cwd.join(db),
        None => settings.database_path(&cwd),
    })
}

/// Open the vault database with the configured options.
pub fn open_vault(cli: &Cli, settings: &Settings) -> Result<Vault<SqliteStorage>> {
    let path = database_path(cli, settings)?;
    let storage = SqliteStorage::open(&path)?;
    Ok(Vault::with_options(storage, settings.vault_options()?))
}

/// Unwrap a session key if the vault is locked.
///
/// Shows the stored hint before prompting.  Returns `None` for an
/// unlocked vault, where tokens are stored in cleartext.
pub fn session_key(vault: &Vault<SqliteStorage>) -> Result<Option<Dek>> {
    if !vault.is_locked()? {
        return Ok(None);
    }
    if let Some(hint) = vault.password_hint()? {
        output::tip(&format!("Password hint: {hint}"));
    }
    let password = prompt_password("Enter vault password")?;
    Ok(Some(vault.unlock(password.as_bytes())?))
}

/// Get the current vault password.
///
/// Checks `TOKENVAULT_PASSWORD` first (CI/CD friendly), then prompts.
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| TokenVaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation.
///
/// Respects `env_var` for scripted usage.  Enforces a minimum password
/// length.
pub fn prompt_new_password(env_var: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(env_var) {
        if !pw.is_empty() {
            if pw.chars().count() < MIN_PASSWORD_LEN {
                return Err(TokenVaultError::CommandFailed(format!(
                    "password must be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let password = dialoguer::Password::new()
            .with_prompt("Choose vault password")
            .with_confirmation(
                "Confirm vault password",
                "Passwords do not match, try again",
            )
            .interact()
            .map_err(|e| TokenVaultError::CommandFailed(format!("password prompt: {e}")))?;

        if password.chars().count() < MIN_PASSWORD_LEN {
            output::warning(&format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters. Try again."
            ));
            continue;
        }

        return Ok(Zeroizing::new(password));
    }
}

/// Read a refresh token from `TOKENVAULT_TOKEN` or a hidden prompt.
pub fn prompt_token() -> Result<Zeroizing<String>> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.is_empty() {
            return Ok(Zeroizing::new(token));
        }
    }

    let token = dialoguer::Password::new()
        .with_prompt("Refresh token")
        .interact()
        .map_err(|e| TokenVaultError::CommandFailed(format!("token prompt: {e}")))?;
    if token.trim().is_empty() {
        return Err(TokenVaultError::CommandFailed(
            "refresh token cannot be empty".into(),
        ));
    }
    Ok(Zeroizing::new(token))
}
