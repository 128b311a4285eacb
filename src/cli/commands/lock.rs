//! `tokenvault lock` — encrypt every stored token under a new password.
//!
//! Checks the store is consistent, asks for a new password (with
//! confirmation) and runs the lock in one transaction.

use crate::cli::{open_vault, output, prompt_new_password, Cli, PASSWORD_ENV};
use crate::config::Settings;
use crate::errors::{Result, TokenVaultError};

/// Execute the `lock` command.
pub fn execute(cli: &Cli, settings: &Settings, hint: Option<&str>) -> Result<()> {
    let mut vault = open_vault(cli, settings)?;
    vault.reconcile()?;

    if vault.is_locked()? {
        output::tip("Use `tokenvault rotate` to change the password of a locked vault.");
        return Err(TokenVaultError::PreconditionFailed(
            "vault is already locked".into(),
        ));
    }

    output::info("Choose the vault password. It cannot be recovered if lost.");
    let password = prompt_new_password(PASSWORD_ENV)?;

    let report = vault.lock(password.as_bytes(), hint)?;

    output::success(&format!(
        "Vault locked ({} token(s) encrypted)",
        report.secrets_encrypted
    ));
    output::tip("Every read now requires the vault password.");
    Ok(())
}
