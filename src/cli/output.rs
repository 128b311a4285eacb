//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::crypto::KdfParams;
use crate::vault::{CredentialSummary, VaultStatus};

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// One-line description of KDF parameters.
pub fn describe_kdf(kdf: &KdfParams) -> String {
    match kdf {
        KdfParams::Scrypt(p) => format!("scrypt (N={}, r={}, p={})", p.n, p.r, p.p),
        KdfParams::Argon2id(p) => format!(
            "argon2id (m={} KiB, t={}, p={})",
            p.memory_kib, p.iterations, p.parallelism
        ),
    }
}

/// Print the vault status as a two-column table.
pub fn print_status(status: &VaultStatus) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let state = if status.locked { "locked" } else { "unlocked" };
    table.add_row(vec!["State".to_string(), state.to_string()]);
    table.add_row(vec!["Format version".to_string(), status.version.to_string()]);
    if let Some(kdf) = &status.kdf {
        table.add_row(vec!["KDF".to_string(), describe_kdf(kdf)]);
    }
    if let Some(hint) = &status.password_hint {
        table.add_row(vec!["Password hint".to_string(), hint.clone()]);
    }
    if let Some(at) = status.locked_at {
        table.add_row(vec![
            "Locked at".to_string(),
            at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    if let Some(at) = status.rotated_at {
        table.add_row(vec![
            "Last rotation".to_string(),
            at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    table.add_row(vec![
        "Linked accounts".to_string(),
        status.credentials.to_string(),
    ]);

    println!("{table}");
}

/// Print a table of linked accounts (Owner, Storage, Linked, Updated).
pub fn print_accounts_table(accounts: &[CredentialSummary]) {
    if accounts.is_empty() {
        info("No linked accounts yet.");
        tip("Run `tokenvault account link <OWNER_ID>` to store a refresh token.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Owner", "Storage", "Linked", "Updated"]);

    for a in accounts {
        let storage = if a.encrypted { "encrypted" } else { "plaintext" };
        table.add_row(vec![
            a.owner_id.clone(),
            storage.to_string(),
            a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            a.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }

    println!("{table}");
}
