//! Integration tests for the HCJWK CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`, with
//! the master secret and database passed through the environment.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const ZERO_SECRET: &str = "AAAAAAAAAAAAAAAAAAAAAA";

/// Helper: get a Command pointing at the hcjwk binary.
fn hcjwk() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("hcjwk").expect("binary should exist");
    for var in [
        "HCJWK_SECRET",
        "HCJWK_VALIDITY",
        "HCJWK_RENEWAL_THRESHOLD",
        "HCJWK_APP_NAME",
        "HCJWK_DATABASE",
        "HCJWK_REFRESH_LOCKING",
        "HCJWK_BUSY_TIMEOUT_MS",
        "HCJWK_LOG_LEVEL",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Helper: a command running inside `tmp` with the zero secret and a
/// database in the temp directory.
fn hcjwk_in(tmp: &TempDir) -> Command {
    let mut cmd = hcjwk();
    cmd.current_dir(tmp.path())
        .env("HCJWK_SECRET", ZERO_SECRET)
        .env("HCJWK_DATABASE", tmp.path().join("keys.db"));
    cmd
}

#[test]
fn help_flag_shows_usage() {
    hcjwk()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Host-configuration signing-key manager"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("revoke"))
        .stdout(predicate::str::contains("purge"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("jwks"))
        .stdout(predicate::str::contains("secret-generate"));
}

#[test]
fn version_flag_shows_version() {
    hcjwk()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hcjwk"));
}

#[test]
fn no_args_exits_with_two() {
    hcjwk()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn revoke_requires_a_kid() {
    hcjwk().arg("revoke").assert().code(2);
}

#[test]
fn missing_secret_fails() {
    let tmp = TempDir::new().unwrap();
    hcjwk()
        .current_dir(tmp.path())
        .arg("refresh")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("secret"));
}

#[test]
fn refresh_then_list() {
    let tmp = TempDir::new().unwrap();

    hcjwk_in(&tmp)
        .arg("refresh")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created new signing key"))
        .stderr(predicate::str::contains("Created new hostconf JWK"));

    tmp.child("keys.db").assert(predicate::path::exists());

    hcjwk_in(&tmp)
        .arg("refresh")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to do"));

    hcjwk_in(&tmp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 key(s), 1 valid"));
}

#[test]
fn revoke_unknown_kid_exits_with_two() {
    let tmp = TempDir::new().unwrap();
    hcjwk_in(&tmp)
        .args(["revoke", "nosuchid"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn threshold_longer_than_validity_exits_with_two() {
    let tmp = TempDir::new().unwrap();
    hcjwk_in(&tmp)
        .env("HCJWK_VALIDITY", "2h")
        .env("HCJWK_RENEWAL_THRESHOLD", "3h")
        .arg("refresh")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("renewal_threshold"));

    tmp.child("keys.db").assert(predicate::path::missing());
}

#[test]
fn config_file_is_read() {
    let tmp = TempDir::new().unwrap();
    tmp.child("custom.toml")
        .write_str("validity = \"2h\"\nrenewal_threshold = \"5h\"\n")
        .unwrap();

    hcjwk_in(&tmp)
        .args(["--config", "custom.toml", "refresh"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("renewal_threshold"));
}

#[test]
fn jwks_prints_public_set() {
    let tmp = TempDir::new().unwrap();
    hcjwk_in(&tmp)
        .arg("jwks")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"keys":[]}"#));

    hcjwk_in(&tmp).arg("refresh").assert().success();

    hcjwk_in(&tmp)
        .arg("jwks")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""kty":"EC""#))
        .stdout(predicate::str::contains(r#""d":"#).not());
}

#[test]
fn purge_with_nothing_expired() {
    let tmp = TempDir::new().unwrap();
    hcjwk_in(&tmp)
        .arg("purge")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to purge"));
}

#[test]
fn secret_generate_prints_usable_secret() {
    let assert = hcjwk().arg("secret-generate").assert().success();
    let secret = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let secret = secret.trim();
    assert!(hcjwk::crypto::decode_master_secret(secret).is_ok());
}

#[test]
fn completions_for_known_shell() {
    hcjwk()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hcjwk"));
}

#[test]
fn completions_for_unknown_shell_fail() {
    hcjwk()
        .args(["completions", "csh"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("possible values"));
}
