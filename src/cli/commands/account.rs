//! `tokenvault account` — link, list and unlink accounts.

use dialoguer::Confirm;

use crate::cli::{open_vault, output, prompt_token, session_key, AccountAction, Cli};
use crate::config::Settings;
use crate::errors::{Result, TokenVaultError};

/// Execute an `account` subcommand.
pub fn execute(cli: &Cli, settings: &Settings, action: &AccountAction) -> Result<()> {
    match action {
        AccountAction::Link { owner_id } => link(cli, settings, owner_id),
        AccountAction::List => list(cli, settings),
        AccountAction::Unlink { owner_id, force } => unlink(cli, settings, owner_id, *force),
    }
}

fn link(cli: &Cli, settings: &Settings, owner_id: &str) -> Result<()> {
    let mut vault = open_vault(cli, settings)?;
    vault.reconcile()?;

    // A locked vault needs the session key to encrypt the new token.
    let dek = session_key(&vault)?;
    let token = prompt_token()?;

    vault.link_account(owner_id, token.as_str(), dek.as_ref())?;

    let form = if dek.is_some() { "encrypted" } else { "plaintext" };
    output::success(&format!("Linked '{owner_id}' ({form})"));
    Ok(())
}

fn list(cli: &Cli, settings: &Settings) -> Result<()> {
    let vault = open_vault(cli, settings)?;
    output::print_accounts_table(&vault.accounts()?);
    Ok(())
}

fn unlink(cli: &Cli, settings: &Settings, owner_id: &str, force: bool) -> Result<()> {
    let mut vault = open_vault(cli, settings)?;
    vault.reconcile()?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Unlink '{owner_id}' and delete its token?"))
            .default(false)
            .interact()
            .map_err(|e| TokenVaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            return Err(TokenVaultError::UserCancelled);
        }
    }

    vault.unlink_account(owner_id)?;
    output::success(&format!("Unlinked '{owner_id}'"));
    Ok(())
}
