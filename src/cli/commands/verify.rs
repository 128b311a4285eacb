//! `tokenvault verify` — check stored tokens against the lock state.
//!
//! Without `--deep` this only compares storage forms with the metadata
//! (no password needed).  With `--deep` every token is decrypted with
//! the session key so tampered rows are found up front.

use crate::cli::{open_vault, output, session_key, Cli};
use crate::config::Settings;
use crate::errors::{Result, TokenVaultError};

/// Execute the `verify` command.
pub fn execute(cli: &Cli, settings: &Settings, deep: bool) -> Result<()> {
    let vault = open_vault(cli, settings)?;
    let report = vault.reconcile()?;

    let state = if report.locked { "locked" } else { "unlocked" };
    output::success(&format!(
        "Vault is {state} and consistent ({} encrypted, {} plaintext)",
        report.encrypted, report.plaintext
    ));

    if !deep {
        return Ok(());
    }

    let dek = session_key(&vault)?;
    let mut failed = Vec::new();
    for account in vault.accounts()? {
        if let Err(e) = vault.read_secret(&account.owner_id, dek.as_ref()) {
            output::error(&format!("{}: {e}", account.owner_id));
            failed.push(account.owner_id);
        }
    }

    if !failed.is_empty() {
        return Err(TokenVaultError::CommandFailed(format!(
            "{} token(s) failed verification",
            failed.len()
        )));
    }

    output::success("Every stored token decrypted and authenticated");
    Ok(())
}
