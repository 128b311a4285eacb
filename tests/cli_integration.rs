//! Integration tests for the TokenVault CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Passwords and tokens are supplied through environment variables so
//! nothing blocks on an interactive prompt.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Helper: get a Command pointing at the tokenvault binary.
fn tokenvault() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("tokenvault").expect("binary should exist")
}

/// Helper: a project dir whose config keeps scrypt cheap.
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    tmp.child(".tokenvault.toml")
        .write_str("scrypt_n = 1024\n")
        .unwrap();
    tmp
}

/// Helper: a command running inside `dir` with no credentials in the env.
fn in_project(dir: &TempDir) -> Command {
    let mut cmd = tokenvault();
    cmd.current_dir(dir.path())
        .env_remove("TOKENVAULT_PASSWORD")
        .env_remove("TOKENVAULT_NEW_PASSWORD")
        .env_remove("TOKENVAULT_TOKEN")
        .env_remove("TOKENVAULT_LOG");
    cmd
}

fn link(dir: &TempDir, owner: &str, token: &str) {
    in_project(dir)
        .args(["account", "link", owner])
        .env("TOKENVAULT_TOKEN", token)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Linked '{owner}'")));
}

#[test]
fn help_flag_shows_usage() {
    tokenvault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Password-protected storage"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("lock"))
        .stdout(predicate::str::contains("unlock"))
        .stdout(predicate::str::contains("rotate"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("account"))
        .stdout(predicate::str::contains("token"));
}

#[test]
fn version_flag_shows_version() {
    tokenvault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tokenvault"));
}

#[test]
fn no_args_shows_help() {
    tokenvault()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn status_on_fresh_project_is_unlocked() {
    let tmp = project();
    in_project(&tmp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("unlocked"));

    tmp.child(".tokenvault/credentials.db")
        .assert(predicate::path::exists());
}

#[test]
fn db_flag_overrides_config() {
    let tmp = project();
    in_project(&tmp)
        .args(["status", "--db", "custom/vault.db"])
        .assert()
        .success();

    tmp.child("custom/vault.db").assert(predicate::path::exists());
    tmp.child(".tokenvault/credentials.db")
        .assert(predicate::path::missing());
}

#[test]
fn link_and_list_accounts() {
    let tmp = project();
    link(&tmp, "acct-a", "tokA");
    link(&tmp, "acct-b", "tokB");

    in_project(&tmp)
        .args(["account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acct-a"))
        .stdout(predicate::str::contains("acct-b"))
        .stdout(predicate::str::contains("plaintext"));

    in_project(&tmp)
        .args(["token", "acct-b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tokB"));
}

#[test]
fn linking_same_owner_twice_fails() {
    let tmp = project();
    link(&tmp, "acct-a", "tokA");

    in_project(&tmp)
        .args(["account", "link", "acct-a"])
        .env("TOKENVAULT_TOKEN", "other")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already linked"));
}

#[test]
fn lock_rotate_and_read_tokens() {
    let tmp = project();
    link(&tmp, "acct-a", "tokA");
    link(&tmp, "acct-b", "tokB");
    link(&tmp, "acct-c", "tokC");

    in_project(&tmp)
        .args(["lock", "--hint", "the usual"])
        .env("TOKENVAULT_PASSWORD", "hunter2hunter2")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 token(s) encrypted"));

    in_project(&tmp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("locked"))
        .stdout(predicate::str::contains("the usual"))
        .stdout(predicate::str::contains("scrypt (N=1024"));

    in_project(&tmp)
        .args(["account", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("encrypted"));

    in_project(&tmp)
        .args(["token", "acct-a"])
        .env("TOKENVAULT_PASSWORD", "hunter2hunter2")
        .assert()
        .success()
        .stdout(predicate::str::contains("tokA"));

    in_project(&tmp)
        .arg("rotate")
        .env("TOKENVAULT_PASSWORD", "hunter2hunter2")
        .env("TOKENVAULT_NEW_PASSWORD", "p@ssw0rd2-long")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 stored token(s) unchanged"));

    in_project(&tmp)
        .args(["token", "acct-c"])
        .env("TOKENVAULT_PASSWORD", "p@ssw0rd2-long")
        .assert()
        .success()
        .stdout(predicate::str::contains("tokC"));

    in_project(&tmp)
        .args(["verify", "--deep"])
        .env("TOKENVAULT_PASSWORD", "p@ssw0rd2-long")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 encrypted, 0 plaintext"));

    // The old password no longer opens the vault.
    in_project(&tmp)
        .arg("unlock")
        .env("TOKENVAULT_PASSWORD", "hunter2hunter2")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed"));
}

#[test]
fn wrong_password_cannot_read_token() {
    let tmp = project();
    link(&tmp, "acct-a", "tokA");

    in_project(&tmp)
        .arg("lock")
        .env("TOKENVAULT_PASSWORD", "correct-horse")
        .assert()
        .success();

    in_project(&tmp)
        .args(["token", "acct-a"])
        .env("TOKENVAULT_PASSWORD", "wrong-horse")
        .assert()
        .failure()
        .stdout(predicate::str::contains("tokA").not())
        .stderr(predicate::str::contains("Authentication failed"));
}

#[test]
fn locking_twice_fails() {
    let tmp = project();
    in_project(&tmp)
        .arg("lock")
        .env("TOKENVAULT_PASSWORD", "correct-horse")
        .assert()
        .success();

    in_project(&tmp)
        .arg("lock")
        .env("TOKENVAULT_PASSWORD", "correct-horse")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already locked"));
}

#[test]
fn short_password_is_rejected() {
    let tmp = project();
    link(&tmp, "acct-a", "tokA");

    in_project(&tmp)
        .arg("lock")
        .env("TOKENVAULT_PASSWORD", "short")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 8 characters"));

    in_project(&tmp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("unlocked"));
}

#[test]
fn rotate_on_unlocked_vault_fails() {
    let tmp = project();
    in_project(&tmp)
        .arg("rotate")
        .env("TOKENVAULT_PASSWORD", "correct-horse")
        .env("TOKENVAULT_NEW_PASSWORD", "battery-staple")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not locked"));
}

#[test]
fn unlink_with_force_removes_account() {
    let tmp = project();
    link(&tmp, "acct-a", "tokA");

    in_project(&tmp)
        .args(["account", "unlink", "acct-a", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unlinked 'acct-a'"));

    in_project(&tmp)
        .args(["token", "acct-a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No linked account"));
}

#[test]
fn weak_kdf_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    tmp.child(".tokenvault.toml")
        .write_str("scrypt_n = 16\n")
        .unwrap();

    tokenvault()
        .current_dir(tmp.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file error"));
}
