use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CAFE_RECEIPT: &str = "Blue Bottle Coffee\n\
123 Main St\n\
03/15/24\n\
Latte 5.50\n\
Subtotal: $42.50\n\
Tax: $3.30\n\
Total: $45.80\n";

fn expensa() -> Command {
    Command::cargo_bin("expensa").unwrap()
}

#[test]
fn test_extract_json_from_file() {
    let dir = TempDir::new().unwrap();
    let receipt = dir.path().join("receipt.txt");
    fs::write(&receipt, CAFE_RECEIPT).unwrap();

    let output = expensa().arg("extract").arg(&receipt).output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["merchant_name"], "Blue Bottle Coffee");
    assert_eq!(json["subtotal"], "42.50");
    assert_eq!(json["tax"], "3.30");
    assert_eq!(json["total"], "45.80");
    assert_eq!(json["date"], "2024-03-15");
}

#[test]
fn test_extract_text_from_stdin() {
    expensa()
        .args(["extract", "-", "--format", "text"])
        .write_stdin(CAFE_RECEIPT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Blue Bottle Coffee"))
        .stdout(predicate::str::contains("45.80"))
        .stdout(predicate::str::contains("Subtotal + tax matches total"));
}

#[test]
fn test_extract_with_draft() {
    let output = expensa()
        .args(["extract", "-", "--draft"])
        .write_stdin(CAFE_RECEIPT)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["fields"]["total"], "45.80");
    assert_eq!(json["draft"]["amount"]["amount"], "45.80");
    assert_eq!(json["draft"]["merchant_name"], "Blue Bottle Coffee");
}

#[test]
fn test_extract_unreadable_text_reports_missing_fields() {
    expensa()
        .args(["extract", "-", "--format", "text"])
        .write_stdin("~~ ## ~~\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total:"))
        .stdout(predicate::str::contains("not found"));
}

#[test]
fn test_extract_missing_file_fails() {
    expensa()
        .args(["extract", "/nonexistent/receipt.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_config_init_get_set() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");
    let config_arg = config.to_str().unwrap();

    expensa()
        .args(["config", "init", "--config", config_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(config.exists());

    expensa()
        .args(["config", "init", "--config", config_arg])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    expensa()
        .args(["config", "get", "lifecycle.allow_self_approval", "--config", config_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("false"));

    expensa()
        .args(["config", "set", "lifecycle.allow_self_approval", "true", "--config", config_arg])
        .assert()
        .success();

    expensa()
        .args(["config", "get", "lifecycle.allow_self_approval", "--config", config_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));
}

#[test]
fn test_config_set_refuses_unknown_key_and_bad_value() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");
    let config_arg = config.to_str().unwrap();

    expensa()
        .args(["config", "set", "lifecycle.no_such_key", "1", "--config", config_arg])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));

    expensa()
        .args(["config", "set", "lifecycle.allow_self_approval", "sometimes", "--config", config_arg])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid value"));

    assert!(!config.exists());
}

#[test]
fn test_config_path_reports_status() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.json");

    expensa()
        .args(["config", "path", "--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created"));
}

const SCRIPT: &str = r#"{
  "owner": { "id": "alice", "role": "employee" },
  "created_at": "2024-03-18T09:00:00Z",
  "expense": {
    "amount": { "amount": "45.80", "currency": "USD" },
    "merchant_name": "Blue Bottle Coffee",
    "expense_date": "2024-03-15",
    "category": "meals",
    "receipt_attachments": [
      { "id": "r1", "url": "s3://receipts/r1.jpg", "kind": "image" }
    ]
  },
  "steps": [
    { "actor": { "id": "alice", "role": "employee" }, "at": "2024-03-18T09:10:00Z", "event": "submit" },
    { "actor": { "id": "alice", "role": "employee" }, "at": "2024-03-18T09:20:00Z", "event": "approve" },
    { "actor": { "id": "bob", "role": "manager" }, "at": "2024-03-18T09:30:00Z", "event": "reject", "reason": "Please itemize" },
    { "actor": { "id": "alice", "role": "employee" }, "at": "2024-03-18T09:40:00Z", "event": "submit" },
    { "actor": { "id": "bob", "role": "manager" }, "at": "2024-03-18T09:50:00Z", "event": "approve" },
    { "actor": { "id": "fran", "role": "finance" }, "at": "2024-03-18T10:00:00Z", "event": "mark_paid" }
  ]
}"#;

#[test]
fn test_lifecycle_replay_text() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("script.json");
    fs::write(&script, SCRIPT).unwrap();

    expensa()
        .arg("lifecycle")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("step 1: submit by alice"))
        .stdout(predicate::str::contains("step 2: approve by alice refused"))
        .stdout(predicate::str::contains("step 6: mark_paid by fran"))
        .stdout(predicate::str::contains("final status: paid"));
}

#[test]
fn test_lifecycle_replay_json() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("script.json");
    fs::write(&script, SCRIPT).unwrap();

    let output = expensa()
        .arg("lifecycle")
        .arg(&script)
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let steps = json["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 6);
    assert!(steps[0].get("error").is_none());
    assert_eq!(steps[1]["status"], "submitted");
    assert!(steps[1]["error"].is_string());
    assert_eq!(steps[2]["status"], "rejected");
    assert_eq!(json["record"]["status"], "paid");
    assert_eq!(json["record"]["approver_id"], "bob");
}

#[test]
fn test_lifecycle_strict_stops_at_refusal() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("script.json");
    fs::write(&script, SCRIPT).unwrap();

    expensa()
        .arg("lifecycle")
        .arg(&script)
        .arg("--strict")
        .assert()
        .failure()
        .stdout(predicate::str::contains("step 2: approve by alice refused"))
        .stdout(predicate::str::contains("step 3").not());
}

#[test]
fn test_lifecycle_invalid_script_fails() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("script.json");
    fs::write(&script, r#"{ "steps": [] }"#).unwrap();

    expensa()
        .arg("lifecycle")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid script"));
}
