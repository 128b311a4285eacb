//! `tokenvault unlock` — check the password against the wrapped key.
//!
//! Unlocking has no durable effect; the session key is dropped (and
//! wiped) as soon as the check succeeds.

use crate::cli::{open_vault, output, prompt_password, Cli};
use crate::config::Settings;
use crate::errors::{Result, TokenVaultError};

/// Execute the `unlock` command.
pub fn execute(cli: &Cli, settings: &Settings) -> Result<()> {
    let vault = open_vault(cli, settings)?;

    if !vault.is_locked()? {
        output::info("Vault is not locked; tokens are readable without a password.");
        return Ok(());
    }

    if let Some(hint) = vault.password_hint()? {
        output::tip(&format!("Password hint: {hint}"));
    }
    let password = prompt_password("Enter vault password")?;

    match vault.unlock(password.as_bytes()) {
        Ok(_dek) => {
            output::success("Password accepted");
            Ok(())
        }
        Err(e @ TokenVaultError::AuthenticationFailed(_)) => {
            output::tip("Passwords cannot be recovered; check the hint with `tokenvault status`.");
            Err(e)
        }
        Err(e) => Err(e),
    }
}
