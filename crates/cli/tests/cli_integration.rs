//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `batchloc` binary against a snapshot
//! directory of Parquet files written into a temp dir, and checks exit
//! codes, stdout and stderr.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use parquet::arrow::ArrowWriter;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper: a `batchloc` command isolated from the caller's Azure settings.
fn batchloc() -> Command {
    let mut cmd = cargo_bin_cmd!("batchloc");
    for var in [
        "AZURE_STORAGE_ACCOUNT",
        "AZURE_STORAGE_ENDPOINT",
        "AZURE_STORAGE_CONTAINER",
        "AZURE_SAS_TOKEN",
        "AZURE_STORAGE_PREFIX",
        "BATCHLOC_NO_LISTING",
        "BATCHLOC_SNAPSHOT_DIR",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn ints(values: &[Option<i64>]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

fn strs(values: &[Option<&str>]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

fn write_parquet(path: &Path, columns: Vec<(&str, ArrayRef)>) {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, a)| a).collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

/// A complete snapshot: run 101 finished a step, run 202 has only ordinals.
fn snapshot_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write_parquet(
        &root.join("run.parquet"),
        vec![
            ("Id", ints(&[Some(101), Some(202)])),
            ("Label", strs(&[Some("B-101"), Some("B-202")])),
            ("Name", strs(&[Some("First"), Some("Second")])),
            ("Motivation", strs(&[Some("<p>Rush <b>order</b></p>"), None])),
            ("Status", strs(&[Some("Open"), Some("Hold")])),
        ],
    );
    write_parquet(
        &root.join("delta/run_step.parquet"),
        vec![
            ("RunId", ints(&[Some(101), Some(101), Some(202), Some(202)])),
            ("ProcessModuleId", ints(&[Some(50), Some(60), Some(60), Some(50)])),
            ("Sequence", ints(&[Some(1), Some(2), Some(1), Some(2)])),
            ("StartDate", strs(&[None, None, None, None])),
            ("FinishDate", strs(&[Some("2024-01-05"), None, None, None])),
            ("FinishTime", strs(&[Some("10:00:00"), None, None, None])),
            ("__batch_index", ints(&[None, None, Some(7), Some(3)])),
        ],
    );
    write_parquet(
        &root.join("parquet/process_module.parquet"),
        vec![
            ("Id", ints(&[Some(50), Some(50), Some(60)])),
            ("ProcessId", ints(&[None, Some(9), Some(10)])),
            ("ModuleId", ints(&[Some(5), Some(5), Some(6)])),
        ],
    );
    write_parquet(
        &root.join("tables/process.parquet"),
        vec![
            ("Id", ints(&[Some(9), Some(10)])),
            ("Name", strs(&[Some("Etch"), Some("Anneal")])),
            ("CategoryId", ints(&[Some(3), Some(4)])),
        ],
    );
    write_parquet(
        &root.join("process_category.parquet"),
        vec![
            ("Id", ints(&[Some(3), Some(4)])),
            ("Name", strs(&[Some("Wet"), Some("Thermal")])),
        ],
    );
    write_parquet(
        &root.join("process_type_category.parquet"),
        vec![
            ("TypeId", ints(&[Some(7), Some(8)])),
            ("CategoryId", ints(&[Some(3), Some(4)])),
        ],
    );
    write_parquet(
        &root.join("process_type.parquet"),
        vec![
            ("Id", ints(&[Some(7), Some(8)])),
            ("Name", strs(&[Some("Front end"), Some("Back end")])),
        ],
    );
    dir
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ──────────────────────────────────────────────
// 1. Help and health
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    batchloc()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("location of every manufacturing batch"));
}

#[test]
fn health_json() {
    let output = batchloc()
        .args(["--output", "json", "health"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        serde_json::json!({"success": true, "service": "Batch Location", "status": "operational"})
    );
}

#[test]
fn health_text() {
    batchloc()
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch Location: operational"));
}

// ──────────────────────────────────────────────
// 2. locate
// ──────────────────────────────────────────────

#[test]
fn locate_json_envelope() {
    let dir = snapshot_dir();
    let output = batchloc()
        .args(["--output", "json", "locate", "--snapshot-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let json = stdout_json(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 2);

    let data = json["data"].as_array().unwrap();
    assert_eq!(data[0]["batch_id"], 202);
    assert_eq!(data[0]["process_name"], "Anneal", "ordinal 7 is module 60");
    assert_eq!(data[0]["process_type_name"], "Back end");
    assert_eq!(data[0]["process_status"], "Not Started");
    assert_eq!(data[0]["batch_status"], "Hold");

    assert_eq!(data[1]["batch_id"], 101);
    assert_eq!(data[1]["batch_number"], "B-101");
    assert_eq!(data[1]["batch_name"], "First");
    assert_eq!(data[1]["motivation"], "Rush order");
    assert_eq!(data[1]["process_name"], "Etch");
    assert_eq!(data[1]["category_name"], "Wet");
    assert_eq!(data[1]["process_status"], "Completed");
    assert_eq!(data[1]["started_at"], "");
    assert_eq!(data[1]["finished_at"], "2024-01-05 10:00:00");
}

#[test]
fn locate_text_lists_batches() {
    let dir = snapshot_dir();
    batchloc()
        .args(["locate", "--snapshot-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch locations (2)"))
        .stdout(predicate::str::contains("B-101"))
        .stdout(predicate::str::contains("[Completed]"));
}

#[test]
fn locate_without_listing_probes_candidates() {
    let dir = snapshot_dir();
    let output = batchloc()
        .args(["--output", "json", "locate", "--no-listing", "--snapshot-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["count"], 2);
}

#[test]
fn snapshot_dir_from_env() {
    let dir = snapshot_dir();
    let output = batchloc()
        .env("BATCHLOC_SNAPSHOT_DIR", dir.path())
        .args(["--output", "json", "locate"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["count"], 2);
}

#[test]
fn missing_table_fails_with_error_envelope() {
    let dir = snapshot_dir();
    fs::remove_file(dir.path().join("process_type.parquet")).unwrap();

    let output = batchloc()
        .args(["--output", "json", "locate", "--snapshot-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["success"], false);
    let error = json["error"].as_str().unwrap();
    assert!(
        error.starts_with("Missing remote parquet for table: process_type"),
        "{}",
        error
    );
}

#[test]
fn missing_table_text_goes_to_stderr() {
    let dir = snapshot_dir();
    fs::remove_file(dir.path().join("run.parquet")).unwrap();

    batchloc()
        .args(["locate", "--snapshot-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing remote parquet for table: run"));
}

#[test]
fn unreadable_table_still_succeeds() {
    let dir = snapshot_dir();
    fs::write(dir.path().join("process_category.parquet"), b"garbage").unwrap();

    let output = batchloc()
        .args(["--output", "json", "locate", "--snapshot-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["count"], 2);
    assert_eq!(json["data"][1]["category_name"], "");
    assert_eq!(json["data"][1]["process_name"], "Etch");
}

#[test]
fn bad_snapshot_dir_fails() {
    batchloc()
        .args(["locate", "--snapshot-dir", "/no/such/snapshot/dir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot open snapshot store"));
}

// ──────────────────────────────────────────────
// 3. steps and tables
// ──────────────────────────────────────────────

#[test]
fn steps_json_has_every_pairing() {
    let dir = snapshot_dir();
    let output = batchloc()
        .args(["--output", "json", "steps", "--snapshot-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["count"], 4);
    assert_eq!(json["data"][0]["run_id"], 101);
    assert_eq!(json["data"][0]["process_module_id"], 50);
    assert_eq!(json["data"][0]["process_id"], 9);
}

#[test]
fn tables_reports_resolved_paths() {
    let dir = snapshot_dir();
    let output = batchloc()
        .args(["--output", "json", "tables", "--snapshot-dir"])
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["count"], 7);
    let data = json["data"].as_array().unwrap();
    let run_step = data.iter().find(|t| t["table"] == "run_step").unwrap();
    assert_eq!(run_step["path"], "delta/run_step.parquet");
    assert_eq!(run_step["discovery"], "listing");
}

#[test]
fn tables_text() {
    let dir = snapshot_dir();
    batchloc()
        .args(["tables", "--snapshot-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("tables/process.parquet"));
}
