//! `tokenvault rotate` — change the vault password.
//!
//! Only the wrapped DEK is rewritten: the DEK is unwrapped with the old
//! password and re-wrapped under a key derived from the new one.  Stored
//! tokens are not touched, so this takes the same time for one linked
//! account as for a thousand.

use crate::cli::{open_vault, output, prompt_new_password, prompt_password, Cli, NEW_PASSWORD_ENV};
use crate::config::Settings;
use crate::errors::Result;

/// Execute the `rotate` command.
pub fn execute(cli: &Cli, settings: &Settings, hint: Option<&str>) -> Result<()> {
    let mut vault = open_vault(cli, settings)?;
    vault.reconcile()?;

    // 1. Current password.
    output::info("Enter your current vault password.");
    let old_password = prompt_password("Current vault password")?;

    // 2. New password (with confirmation).
    output::info("Choose your new vault password.");
    let new_password = prompt_new_password(NEW_PASSWORD_ENV)?;

    // 3. Re-wrap the DEK.
    vault.rotate(old_password.as_bytes(), new_password.as_bytes(), hint)?;

    let accounts = vault.accounts()?.len();
    output::success(&format!(
        "Password rotated ({accounts} stored token(s) unchanged)"
    ));
    if hint.is_none() {
        output::tip("The password hint was cleared. Pass --hint to set one.");
    }
    Ok(())
}
