//! CLI test cases.
//!
//! These run against `tests/fixtures/fake_worker.sh`, which speaks the OCR
//! worker protocol without needing PaddleOCR installed. It chooses its answer
//! based on the image's file name.

use std::{fs, path::PathBuf, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

/// Our fake OCR worker.
static FAKE_WORKER: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fake_worker.sh");

/// Create a new `Command` with our binary, wired up to the fake worker.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("paddle-ocr-bridge").unwrap();
    cmd.env("OCR_WORKER_PROGRAM", "sh")
        .env("OCR_WORKER_SCRIPT", FAKE_WORKER)
        .env_remove("OCR_DEVICE")
        .env_remove("OCR_LANG")
        .env("RUST_LOG", "warn");
    cmd
}

/// Create a placeholder image file. The fake worker never reads it.
fn image_file(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, b"not really a png").unwrap();
    path
}

/// Run `cmd`, check it printed exactly one line, and parse it.
fn json_output(cmd: &mut Command, expected_code: i32) -> Value {
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(expected_code), "{:?}", output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 1, "expected one line of output: {:?}", stdout);
    serde_json::from_str(lines[0]).unwrap()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_arguments_is_usage_error() {
    let result = json_output(&mut cmd(), 1);
    assert_eq!(result["success"], json!(false));
    assert_eq!(result["elements"], json!([]));
    assert!(
        result["error"]
            .as_str()
            .unwrap()
            .starts_with("Usage: paddle-ocr-bridge")
    );
}

#[test]
fn test_unknown_flag_is_usage_error() {
    let result = json_output(cmd().arg("--frobnicate"), 1);
    assert_eq!(result["success"], json!(false));
    assert!(result["error"].as_str().unwrap().starts_with("Usage:"));
}

#[test]
fn test_detects_text() {
    let dir = TempDir::new().unwrap();
    let image = image_file(&dir, "hello.png");
    let result = json_output(cmd().arg(&image), 0);
    assert_eq!(
        result,
        json!({
            "success": true,
            "elements": [{
                "type": "text",
                "text": "HELLO",
                "x": 5,
                "y": 5,
                "width": 10,
                "height": 10,
                "confidence": 98,
            }],
        })
    );
}

#[test]
fn test_structured_output_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    let image = image_file(&dir, "structured.png");
    let result = json_output(cmd().arg(&image), 0);
    assert_eq!(result["success"], json!(true));
    let elements = result["elements"].as_array().unwrap();
    assert_eq!(elements.len(), 2);
    assert_eq!(elements[0]["text"], json!("Total"));
    assert_eq!(elements[0]["x"], json!(30));
    assert_eq!(elements[0]["y"], json!(30));
    assert_eq!(elements[0]["width"], json!(40));
    assert_eq!(elements[0]["height"], json!(20));
    assert_eq!(elements[0]["confidence"], json!(99));
    assert_eq!(elements[1]["text"], json!("42"));
    assert_eq!(elements[1]["confidence"], json!(90));
    assert_eq!(elements[1]["width"], json!(0));
}

#[test]
fn test_blank_image_succeeds_with_no_elements() {
    let dir = TempDir::new().unwrap();
    let image = image_file(&dir, "blank.png");
    let result = json_output(cmd().arg(&image), 0);
    assert_eq!(result, json!({"success": true, "elements": []}));
}

#[test]
fn test_engine_error_is_reported_as_json() {
    let dir = TempDir::new().unwrap();
    let image = image_file(&dir, "fail.png");
    let result = json_output(cmd().arg(&image), 0);
    assert_eq!(result["success"], json!(false));
    assert_eq!(result["error"], json!("cannot read image"));
    assert!(result["traceback"].as_str().unwrap().contains("fake frame"));
    assert_eq!(result["elements"], json!([]));
}

#[test]
fn test_missing_image_is_reported_as_json() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.png");
    let result = json_output(cmd().arg(&missing), 0);
    assert_eq!(result["success"], json!(false));
    assert!(
        result["error"]
            .as_str()
            .unwrap()
            .contains("image file not found")
    );
}

#[test]
fn test_engine_load_failure_is_reported_as_json() {
    let dir = TempDir::new().unwrap();
    let image = image_file(&dir, "hello.png");
    let result = json_output(cmd().env("OCR_LANG", "broken").arg(&image), 0);
    assert_eq!(result["success"], json!(false));
    assert_eq!(result["error"], json!("cannot initialize OCR engine"));
    assert!(
        result["traceback"]
            .as_str()
            .unwrap()
            .contains("model download failed")
    );
}

#[test]
fn test_logs_stay_off_stdout() {
    let dir = TempDir::new().unwrap();
    let image = image_file(&dir, "hello.png");
    let mut cmd = cmd();
    cmd.env("RUST_LOG", "debug").arg(&image);
    let result = json_output(&mut cmd, 0);
    assert_eq!(result["success"], json!(true));
}

#[test]
fn test_schema() {
    let output = cmd().arg("schema").arg("OcrResult").output().unwrap();
    assert!(output.status.success());
    let schema: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(schema["properties"]["elements"].is_object());
}

#[test]
fn test_schema_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("response.json");
    cmd()
        .arg("schema")
        .arg("OcrResponse")
        .arg("-o")
        .arg(&path)
        .assert()
        .success();
    let schema: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(schema["properties"]["processing_time_ms"].is_object());
}
