//! End-to-end CLI tests for the bookmirror binary.

use assert_cmd::Command;
use predicates::prelude::*;

/// --help displays usage and exits 0 with no side effects.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("bookmirror").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mirror a paginated document-viewer site"));
}

/// --version displays the version and exits 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("bookmirror").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bookmirror"));
}

/// A missing source URL is a usage error.
#[test]
fn test_binary_requires_source_url() {
    let mut cmd = Command::cargo_bin("bookmirror").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

/// Unknown flags cause a non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("bookmirror").unwrap();
    cmd.arg("--invalid-flag")
        .arg("https://viewer.example/a/b/")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// A malformed source URL is fatal with exit code 1 and a diagnostic on
/// stderr.
#[test]
fn test_binary_malformed_url_exits_one() {
    let mut cmd = Command::cargo_bin("bookmirror").unwrap();
    cmd.arg("not-a-url")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid source URL"));
}

/// A URL without the two book identifiers is rejected before any network
/// activity.
#[test]
fn test_binary_url_without_identifiers_exits_one() {
    let mut cmd = Command::cargo_bin("bookmirror").unwrap();
    cmd.arg("https://viewer.example/")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("two path segments"));
}
