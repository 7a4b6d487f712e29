//! Integration tests for `payval iban`, `payval bic` and `payval payment`.
#![allow(clippy::expect_used)]

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Path to the compiled `payval` binary.
fn payval_bin() -> PathBuf {
    let mut path = std::env::current_exe().expect("current exe");
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("payval");
    path
}

fn payval(args: &[&str]) -> Output {
    Command::new(payval_bin())
        .args(args)
        .env_remove("PAYVAL_CONFIG")
        .output()
        .expect("run payval")
}

fn stdout_json(out: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&out.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout is JSON")
}

// ── iban ─────────────────────────────────────────────────────────────────────

#[test]
fn valid_iban_exits_0() {
    let out = payval(&["iban", "ES5702170302862100282783"]);
    assert_eq!(out.status.code(), Some(0));
    let json = stdout_json(&out);
    assert_eq!(json["isValid"], true);
    assert_eq!(json["annotations"], serde_json::json!([]));
}

#[test]
fn rejected_iban_exits_1_with_result() {
    let out = payval(&["iban", "ES050 217009945"]);
    assert_eq!(out.status.code(), Some(1));
    let json = stdout_json(&out);
    assert_eq!(json["subject"], "ES050 217009945");
    assert_eq!(json["isValid"], false);
    assert_eq!(json["mostSevere"], "REJECT");
}

#[test]
fn simple_validator_gives_same_verdict() {
    let out = payval(&["iban", "--validator", "simple", "GB29NWBK60161331926820"]);
    assert_eq!(out.status.code(), Some(1));
    let out = payval(&["iban", "--validator", "simple", "GB29NWBK60161331926819"]);
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn compact_output_is_one_line() {
    let out = payval(&["--compact", "iban", "GB29NWBK60161331926819"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim_end().lines().count(), 1, "{stdout}");
}

// ── bic ──────────────────────────────────────────────────────────────────────

#[test]
fn bic_length_decides_exit_code() {
    assert_eq!(payval(&["bic", "HLFXESMM"]).status.code(), Some(0));
    assert_eq!(payval(&["bic", "HLFXESMM123"]).status.code(), Some(0));
    assert_eq!(payval(&["bic", "HLFXESMM1"]).status.code(), Some(1));
}

// ── payment ──────────────────────────────────────────────────────────────────

#[test]
fn inline_payment_is_validated() {
    let out = payval(&[
        "payment",
        r#"{"sellCurrency":"EUR","buyCurrency":"GBP","sellAmount":"100","buyAmount":"85",
            "fixedLeg":"SELL","rate":"0.85","iban":"GB29 NWBK 6016 1331 9268 19"}"#,
    ]);
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_json(&out)["isValid"], true);
}

#[test]
fn payment_from_stdin() {
    let mut child = Command::new(payval_bin())
        .args(["payment", "-"])
        .env_remove("PAYVAL_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn payval");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(br#"{"iban":"ES95 0217 0100 17"}"#)
        .expect("write stdin");
    let out = child.wait_with_output().expect("wait");
    assert_eq!(out.status.code(), Some(1));
    let json = stdout_json(&out);
    assert!(
        json["annotations"]
            .as_array()
            .expect("annotations")
            .iter()
            .all(|a| a["attribute"] == "iban"),
        "{json}"
    );
}

#[test]
fn unparseable_payment_exits_2() {
    let out = payval(&["payment", "{ nope"]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid payment"), "{stderr}");
}

#[test]
fn missing_payment_file_exits_2() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.json");
    let out = payval(&["payment", path.to_str().expect("utf-8 path")]);
    assert_eq!(out.status.code(), Some(2));
}

// ── configuration ────────────────────────────────────────────────────────────

#[test]
fn broken_config_exits_2() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(b"{ \"engine\": 5 }").expect("write");
    let out = payval(&[
        "--config",
        file.path().to_str().expect("utf-8 path"),
        "iban",
        "GB29NWBK60161331926819",
    ]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn config_from_environment() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(br#"{ "iban_resources": [ { "locationKind": "CLASSPATH", "path": "rules/missing.json" } ] }"#)
        .expect("write");
    let out = Command::new(payval_bin())
        .args(["iban", "GB29NWBK60161331926819"])
        .env("PAYVAL_CONFIG", file.path())
        .output()
        .expect("run payval");
    assert_eq!(out.status.code(), Some(2));
}
