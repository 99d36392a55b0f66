use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn restscript() -> Command {
    let mut cmd = Command::cargo_bin("restscript-auto").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("RESTSCRIPT_ENV")
        .arg("--config")
        .arg(fixture_path("config.yaml"));
    cmd
}

#[test]
fn test_help_exits_zero() {
    Command::cargo_bin("restscript-auto")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("restscript-auto"));
}

#[test]
fn test_run_pure_script_passes() {
    restscript()
        .args(["run", fixture_path("hello.req").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello world"))
        .stdout(predicate::str::contains("PASS"));
}

#[test]
fn test_run_finds_script_without_extension() {
    restscript()
        .args(["run", fixture_path("hello").to_str().unwrap()])
        .assert()
        .success();
}

#[test]
fn test_run_with_params() {
    restscript()
        .args(["run", fixture_path("params.req").to_str().unwrap(), "user_id=7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user=7"));
}

#[test]
fn test_run_failed_assertion_exits_one() {
    restscript()
        .args(["run", fixture_path("failing.req").to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL"))
        .stdout(predicate::str::contains("unreached").not())
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_run_parse_error_exits_two() {
    restscript()
        .args(["run", fixture_path("bad_syntax.req").to_str().unwrap()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Parse error at line 2"));
}

#[test]
fn test_run_resolution_error_exits_three() {
    restscript()
        .args(["run", fixture_path("unknown_service.req").to_str().unwrap()])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("ERROR"))
        .stderr(predicate::str::contains("billing"));
}

#[test]
fn test_run_missing_script_exits_four() {
    restscript()
        .args(["run", "definitely-not-a-script-anywhere"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("script not found"));
}

#[test]
fn test_run_json_output() {
    let assert = restscript()
        .args(["--format", "json", "run", fixture_path("hello.req").to_str().unwrap()])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["status"], "PASS");
    assert_eq!(json["output"][0], "Hello world");
}

#[test]
fn test_check_lists_statements() {
    restscript()
        .args(["check", fixture_path("hello.req").to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("assignment"))
        .stdout(predicate::str::contains("OK: 3 statements"));
}

#[test]
fn test_suite_passes() {
    let assert = restscript()
        .args(["--format", "json", "suite", fixture_path("suite_pass.yaml").to_str().unwrap()])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["suite"], "smoke");
    assert_eq!(report["passed"], 3);
    assert_eq!(report["units_run"], 2);
    assert_eq!(report["results"][2]["output"][0], "user=42");
}

#[test]
fn test_suite_stops_on_failure() {
    restscript()
        .args(["suite", fixture_path("suite_fail.yaml").to_str().unwrap()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("stopped early"))
        .stdout(predicate::str::contains("PASS hello.req").not());
}

#[test]
fn test_suite_continue_on_error() {
    restscript()
        .args([
            "suite",
            fixture_path("suite_fail.yaml").to_str().unwrap(),
            "--continue-on-error",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("PASS hello.req"))
        .stdout(predicate::str::contains("1 passed, 1 failed"));
}

#[test]
fn test_suite_missing_script_fails_before_running() {
    restscript()
        .args(["suite", fixture_path("suite_missing.yaml").to_str().unwrap()])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("does-not-exist.req"));
}

#[test]
fn test_invalid_param_exits_two() {
    restscript()
        .args(["run", fixture_path("hello.req").to_str().unwrap(), "=oops"])
        .assert()
        .code(2);
}

#[test]
fn test_run_several_scripts_in_parallel() {
    let assert = restscript()
        .args([
            "--format",
            "json",
            "run",
            fixture_path("hello.req").to_str().unwrap(),
            fixture_path("params.req").to_str().unwrap(),
            "user_id=5",
            "--parallel",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["units_run"], 1);
    assert_eq!(report["passed"], 2);
    assert_eq!(report["results"][1]["output"][0], "user=5");
}

#[test]
fn test_run_several_scripts_keeps_going_by_default() {
    restscript()
        .args([
            "run",
            fixture_path("failing.req").to_str().unwrap(),
            fixture_path("hello.req").to_str().unwrap(),
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1 passed, 1 failed"));
}

#[test]
fn test_run_several_scripts_stop_on_error() {
    restscript()
        .args([
            "run",
            fixture_path("failing.req").to_str().unwrap(),
            fixture_path("hello.req").to_str().unwrap(),
            "--stop-on-error",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("stopped early"))
        .stdout(predicate::str::contains("Hello world").not());
}

#[test]
fn test_run_several_scripts_reports_missing_before_running() {
    restscript()
        .args(["run", fixture_path("hello.req").to_str().unwrap(), "nope-1", "nope-2"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("nope-1, nope-2"));
}

#[test]
fn test_unknown_subcommand() {
    Command::cargo_bin("restscript-auto")
        .unwrap()
        .arg("totally-fake-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
