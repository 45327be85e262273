//! Process-level CLI tests. These never bind sockets: every case fails (or
//! prints help) before the transport comes up.

use assert_cmd::Command;
use predicates::prelude::*;

fn filterctl() -> Command {
    Command::cargo_bin("filterctl").expect("binary built")
}

#[test]
fn help_prints_usage_and_exits_zero() {
    filterctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("CONTROL_PORT"))
        .stdout(predicate::str::contains("SUBSCRIBE_ENDPOINTS"));
}

#[test]
fn missing_arguments_exit_one() {
    filterctl().assert().failure().code(1);
    filterctl().args(["9000"]).assert().failure().code(1);
    filterctl().args(["9000", "9001"]).assert().failure().code(1);
}

#[test]
fn non_numeric_ports_exit_one() {
    filterctl()
        .args(["nine-thousand", "9001", "127.0.0.1:10009"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn malformed_endpoint_list_exits_one_with_a_diagnostic() {
    filterctl()
        .args(["9000", "9001", "not-an-endpoint"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("invalid endpoint"));
}

#[test]
fn unreadable_config_file_exits_one() {
    filterctl()
        .args([
            "9000",
            "9001",
            "127.0.0.1:10009",
            "--config",
            "/nonexistent/filterctl.toml",
        ])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn invalid_config_file_exits_one() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("filterctl.toml");
    std::fs::write(&path, "mode = 9").expect("write config");

    filterctl()
        .args(["9000", "9001", "127.0.0.1:10009"])
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("mode"));
}
