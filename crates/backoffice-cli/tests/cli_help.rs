use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("backoffice")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("logout"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("headers"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_headers_help_shows_flags() {
    cargo_bin_cmd!("backoffice")
        .args(["headers", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--api-key"))
        .stdout(predicate::str::contains("--use-refresh-token"))
        .stdout(predicate::str::contains("--client-keys"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("backoffice")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("backoffice"));
}
