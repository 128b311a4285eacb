//! `tokenvault token <OWNER_ID>` — print one decrypted refresh token.

use crate::cli::{open_vault, session_key, Cli};
use crate::config::Settings;
use crate::errors::Result;

/// Execute the `token` command.
pub fn execute(cli: &Cli, settings: &Settings, owner_id: &str) -> Result<()> {
    let vault = open_vault(cli, settings)?;
    vault.reconcile()?;

    let dek = session_key(&vault)?;
    let token = vault.read_secret(owner_id, dek.as_ref())?;

    // Raw value to stdout so it can be piped.
    println!("{}", token.as_str());
    Ok(())
}
