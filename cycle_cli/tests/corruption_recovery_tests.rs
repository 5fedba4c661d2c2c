//! Corruption recovery tests for the cycle binary.
//!
//! These tests verify the CLI keeps working when:
//! - The history file is corrupted or empty
//! - Stored records carry values this version doesn't know
//! - The pending reminder file is corrupted

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("cycle"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn cycle(data_dir: &Path) -> Command {
    let config_path = data_dir.join("config.toml");
    if !config_path.exists() {
        fs::write(&config_path, "").unwrap();
    }
    let mut cmd = cli();
    cmd.arg("--data-dir")
        .arg(data_dir)
        .arg("--config")
        .arg(config_path);
    cmd
}

fn stored_records(data_dir: &Path) -> Vec<serde_json::Value> {
    let contents = fs::read_to_string(data_dir.join("periods.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
    json["records"].as_array().unwrap().clone()
}

/// Copies of damaged history files kept next to the live one
fn backups(data_dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(data_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("periods.json.corrupt-")
        })
        .collect()
}

#[test]
fn test_corrupted_history_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(data_dir.join("periods.json"), "{ invalid json }}}}")
        .expect("Failed to write corrupted history");

    cycle(data_dir)
        .arg("predict")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not enough data to predict"));

    // Logging over a corrupted file keeps a copy of it
    cycle(data_dir)
        .args(["log", "--start", "2024-01-01"])
        .assert()
        .success();

    assert_eq!(stored_records(data_dir).len(), 1);
    let saved = backups(data_dir);
    assert_eq!(saved.len(), 1);
    assert_eq!(fs::read_to_string(&saved[0]).unwrap(), "{ invalid json }}}}");
}

#[test]
fn test_partly_damaged_history_survives_a_write() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    let stored = r#"{
  "records": [
    {"id": "5f0c7a4e-3b7d-4c1e-9a55-1d2f3e4a5b6c", "start_date": "2024-01-01T00:00:00"},
    {"id": "8a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d", "start_date": "2024-01-29T00:00:00"},
    {"id": "9d8e7f6a-1b2c-4d3e-8f4a-5b6c7d8e9f0a", "start_date": "2024-02-26T00:00:00",
     "flow": null, "symptoms": ["Cramps", 7]},
    {"id": "0a0b0c0d-1e2f-4a3b-8c4d-5e6f7a8b9c0d", "start_date": "not a date"}
  ]
}"#;
    fs::write(data_dir.join("periods.json"), stored).unwrap();

    cycle(data_dir)
        .args(["log", "--start", "2024-03-25"])
        .assert()
        .success();

    let records = stored_records(data_dir);
    assert_eq!(records.len(), 4);
    for id in ["5f0c7a4e", "8a1b2c3d", "9d8e7f6a"] {
        assert!(
            records.iter().any(|r| r["id"].as_str().unwrap().starts_with(id)),
            "record {} lost",
            id
        );
    }

    let saved = backups(data_dir);
    assert_eq!(saved.len(), 1);
    assert_eq!(fs::read_to_string(&saved[0]).unwrap(), stored);
}

#[test]
fn test_empty_history_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(data_dir.join("periods.json"), "").unwrap();

    cycle(data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No periods logged yet."));
}

#[test]
fn test_unknown_stored_values_fall_back() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    let stored = r#"{
  "records": [
    {
      "id": "5f0c7a4e-3b7d-4c1e-9a55-1d2f3e4a5b6c",
      "start_date": "2024-01-01T00:00:00",
      "end_date": "2024-01-05T00:00:00",
      "flow": "Spotting",
      "symptoms": ["Cramps", "Insomnia", "mood"],
      "notes": ""
    },
    {
      "id": "8a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d",
      "start_date": "2024-01-29T00:00:00"
    }
  ]
}"#;
    fs::write(data_dir.join("periods.json"), stored).unwrap();

    cycle(data_dir)
        .args(["day", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5f0c7a4e"))
        .stdout(predicate::str::contains("• Medium"))
        .stdout(predicate::str::contains("Symptoms: Cramps, Mood Changes"))
        .stdout(predicate::str::contains("Insomnia").not());

    cycle(data_dir)
        .args(["predict", "--today", "2024-02-20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Next period:   Feb 26, 2024"));
}

#[test]
fn test_corrupted_reminder_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cycle(data_dir)
        .args(["log", "--start", "2024-01-01", "--end", "2024-01-05"])
        .assert()
        .success();
    fs::write(data_dir.join("reminders.json"), "[{ not json").unwrap();

    cycle(data_dir)
        .args(["reminders", "--now", "2024-01-10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("period-prediction-2day"));

    let contents = fs::read_to_string(data_dir.join("reminders.json")).unwrap();
    let pending: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(pending.as_array().unwrap().len(), 2);
}

#[test]
fn test_missing_data_dir_is_created() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("nested/data");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "").unwrap();

    cli()
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--config")
        .arg(&config_path)
        .args(["log", "--start", "2024-01-01"])
        .assert()
        .success();

    assert!(data_dir.join("periods.json").exists());
}

#[test]
fn test_no_temp_files_left_behind() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    for start in ["2024-01-01", "2024-01-29", "2024-02-26"] {
        cycle(data_dir)
            .args(["log", "--start", start])
            .assert()
            .success();
    }
    cycle(data_dir)
        .args(["reminders", "--now", "2024-03-01"])
        .assert()
        .success();

    let mut names: Vec<String> = fs::read_dir(data_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["config.toml", "periods.json", "reminders.json"]);
}
