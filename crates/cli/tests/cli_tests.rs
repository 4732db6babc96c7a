// Integration tests for the `txrecon` binary and the job runner.
// Run with: cargo test -p txrecon-cli --test cli_tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use httpmock::prelude::*;
use txrecon::{CancelToken, ReconError, ResultLabel};
use txrecon_cli::{job, JobConfig};

fn txrecon() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_txrecon"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn run(args: &[&str]) -> Output {
    txrecon().args(args).output().expect("failed to run txrecon")
}

fn assert_exit(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "expected exit {code}, got {:?}\nstderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr),
    );
}

// ===========================================================================
// txrecon run
// ===========================================================================

#[test]
fn differences_exit_1_with_summary() {
    let output = run(&["run", "tests/fixtures/payouts.toml"]);
    assert_exit(&output, 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Daily payouts: 6 transactions, 1 matched, 3 mismatched, 1 only in party 1, 1 only in party 2"),
        "stderr: {stderr}"
    );
    assert!(output.stdout.is_empty());
}

#[test]
fn fully_matched_window_exits_0() {
    let output = run(&["run", "tests/fixtures/matched.toml"]);
    assert_exit(&output, 0);
}

#[test]
fn json_stdout_is_single_result_set() {
    let output = run(&["run", "tests/fixtures/payouts.toml", "--json"]);
    assert_exit(&output, 1);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let val: serde_json::Value = serde_json::from_str(stdout.trim()).expect("stdout must be valid JSON");

    let amount = &val["both_parties"]["tr-002"];
    assert_eq!(amount["result_type"], "amount");
    assert_eq!(amount["party_transaction_id2"], "P-002");
    assert_eq!(amount["items"][2]["difference"], "-20.00");
    assert_eq!(val["both_parties"]["tr-006"]["result_type"], "mismatched");
    assert_eq!(val["party1_only"]["tr-004"]["result_type"], "party1_only");
    assert_eq!(val["party2_only"]["P-999"]["party_transaction_id1"], "tr-999");
}

#[test]
fn output_files_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("result.json");
    let csv_path = dir.path().join("items.csv");

    let output = run(&[
        "run",
        "tests/fixtures/payouts.toml",
        "--output",
        json_path.to_str().unwrap(),
        "--csv",
        csv_path.to_str().unwrap(),
    ]);
    assert_exit(&output, 1);

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["both_parties"]["tr-001"]["result_type"], "matched");

    // 6 entries, 3 items each
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 1 + 6 * 3);
    assert!(csv.lines().any(|l| l.starts_with("tr-002,amount,tr-002,P-002,amount,amount,120.50,100.50,false,-20.00")));
}

#[test]
fn missing_source_exits_3() {
    let output = run(&["run", "tests/fixtures/missing_source.toml"]);
    assert_exit(&output, 3);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unable to open"), "stderr: {stderr}");
    assert!(stderr.contains("hint:"), "stderr: {stderr}");
}

#[test]
fn invalid_config_exits_2() {
    let output = run(&["run", "tests/fixtures/invalid.toml"]);
    assert_exit(&output, 2);
    assert!(String::from_utf8_lossy(&output.stderr).contains("duplicate party id"));
}

#[test]
fn unreadable_config_exits_2() {
    let output = run(&["run", "tests/fixtures/nope.toml"]);
    assert_exit(&output, 2);
}

#[test]
fn huge_timeout_runs_without_deadline() {
    let output = run(&["run", "tests/fixtures/matched.toml", "--timeout-secs", "18446744073709551615"]);
    assert_exit(&output, 0);
}

#[test]
fn zero_timeout_is_usage_error() {
    let output = run(&["run", "tests/fixtures/payouts.toml", "--timeout-secs", "0"]);
    assert_exit(&output, 2);
}

// ===========================================================================
// txrecon validate
// ===========================================================================

#[test]
fn validate_accepts_good_config() {
    let output = run(&["validate", "tests/fixtures/payouts.toml"]);
    assert_exit(&output, 0);
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("valid: 'Daily payouts'"));
}

#[test]
fn validate_rejects_bad_config() {
    let output = run(&["validate", "tests/fixtures/invalid.toml"]);
    assert_exit(&output, 2);
}

// ===========================================================================
// Job runner
// ===========================================================================

#[test]
fn ledger_over_http_with_envelope() {
    let server = MockServer::start();
    let ledger = std::fs::read_to_string(fixture("ledger.json")).unwrap();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/transfers").header("x-api-key", "k-1");
        then.status(200)
            .header("content-type", "application/json")
            .body(format!(r#"{{"data": {ledger}}}"#));
    });

    let config = JobConfig::from_toml(&format!(
        r#"
[party1]
id = "ledger"
format = "json"
url = "{}"
records_at = "/data"

[party1.headers]
x-api-key = "k-1"

[party2]
id = "provider"
format = "csv"
path = "provider.csv"

[[party2.time_fields]]
column = "CREATION_DATE"
input = "%Y-%m-%d %H:%M:%S"
"#,
        server.url("/v1/transfers")
    ))
    .unwrap();

    let result = job::run(&config, &fixture(""), &CancelToken::new()).unwrap();
    mock.assert();
    assert_eq!(result.both_parties["tr-001"].label, ResultLabel::Matched);
    // no status filter: pending transfers and payouts are one-sided
    assert!(result.party1_only.contains_key("tr-005"));
    assert!(result.party2_only.contains_key("P-007"));
}

#[test]
fn http_error_status_aborts_run() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/transfers");
        then.status(503);
    });

    let config = JobConfig::from_toml(&format!(
        "[party1]\nid = \"ledger\"\nformat = \"json\"\nurl = \"{}\"\n\n\
         [party2]\nid = \"provider\"\nformat = \"csv\"\npath = \"provider.csv\"\n",
        server.url("/v1/transfers")
    ))
    .unwrap();

    match job::run(&config, &fixture(""), &CancelToken::new()) {
        Err(ReconError::HttpStatus { status, .. }) => assert_eq!(status, 503),
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[test]
fn cancelled_token_stops_run() {
    let config = JobConfig::from_toml(&std::fs::read_to_string(fixture("payouts.toml")).unwrap()).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = job::run(&config, &fixture(""), &cancel).unwrap_err();
    assert!(err.is_cancelled());
}
