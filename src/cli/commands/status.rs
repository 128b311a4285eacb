//! `tokenvault status` — show lock state and protection parameters.

use crate::cli::{open_vault, output, Cli};
use crate::config::Settings;
use crate::errors::Result;

/// Execute the `status` command.
pub fn execute(cli: &Cli, settings: &Settings) -> Result<()> {
    let vault = open_vault(cli, settings)?;
    let status = vault.status()?;

    output::print_status(&status);

    // Report an inconsistent store without failing the status display.
    if let Err(e) = vault.reconcile() {
        output::warning(&e.to_string());
        output::tip("Run `tokenvault verify` for details.");
    } else if !status.locked && status.credentials > 0 {
        output::tip("Tokens are stored in cleartext. Run `tokenvault lock` to encrypt them.");
    }

    Ok(())
}
